//! Profile switching engine.
//!
//! [`Switcher`] owns the loaded [`Registry`] and implements the operations the
//! CLI and wizard call into:
//! - adding a profile by snapshotting the live artifact,
//! - switching the live artifact to a stored snapshot,
//! - cycling to the next profile in name order,
//! - working out which profile is active by comparing content.
//!
//! The live artifact carries no profile tag, so "current" is always derived from
//! content. The registry's `current` field is only a cache of the last switch.

use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::compare::{DirectoryCompare, content_equal};
use crate::error::{Result, SwitchError};
use crate::fs_utils::{artifact_size, mirror_path, remove_path};
use crate::paths::{Artifact, ArtifactKind, Paths};
use crate::registry::{ApplicationProfile, Registry};
use crate::templates::{AppTemplate, find_template};

/// Result of a completed add
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    pub app: String,
    pub profile: String,
    pub snapshot_path: PathBuf,
    /// The profile already existed and its snapshot was replaced
    pub overwritten: bool,
}

/// Result of a completed switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchOutcome {
    pub app: String,
    /// Profile detected as active before the switch
    pub previous: Option<String>,
    pub current: String,
    /// `false` if the outgoing profile's snapshot could not be refreshed
    pub backup_refreshed: bool,
    /// `false` if the registry could not be saved after the swap
    pub registry_saved: bool,
}

impl SwitchOutcome {
    /// Whether a different profile was active before
    pub fn changed_from(&self) -> Option<&str> {
        self.previous.as_deref().filter(|prev| *prev != self.current)
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    pub kind: ArtifactKind,
    pub size: Option<u64>,
    pub modified: Option<DateTime<Local>>,
}

#[derive(Debug, Clone)]
pub struct ProfileEntry {
    pub name: String,
    pub is_current: bool,
    pub snapshot_path: PathBuf,
    /// `None` when the snapshot is missing on disk
    pub snapshot: Option<SnapshotInfo>,
}

#[derive(Debug, Clone)]
pub struct ProfileListing {
    pub app: String,
    pub artifact_path: PathBuf,
    pub current: Option<String>,
    pub profiles: Vec<ProfileEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationSummary {
    pub name: String,
    pub profile_count: usize,
    pub is_default: bool,
    pub current: Option<String>,
}

/// Validate a profile name
///
/// Names end up inside file paths, so separators and dot-only names are rejected.
pub fn validate_profile_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("name cannot be empty")
    } else if name == "." || name == ".." {
        Some("name cannot be '.' or '..'")
    } else if name.contains(['/', '\\', '\0']) {
        Some("name cannot contain path separators")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(SwitchError::InvalidProfileName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// The switching engine
#[derive(Debug)]
pub struct Switcher {
    paths: Paths,
    templates: Vec<AppTemplate>,
    directory_compare: DirectoryCompare,
    registry: Registry,
}

impl Switcher {
    /// Load the registry at `paths.config_file` (creating it if missing)
    pub fn open(paths: Paths, templates: Vec<AppTemplate>) -> Result<Self> {
        let registry = Registry::load(&paths.config_file)?;
        Ok(Self {
            paths,
            templates,
            directory_compare: DirectoryCompare::default(),
            registry,
        })
    }

    pub fn with_directory_compare(mut self, mode: DirectoryCompare) -> Self {
        self.directory_compare = mode;
        self
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn templates(&self) -> &[AppTemplate] {
        &self.templates
    }

    /// Persist the in-memory registry
    pub fn save(&self) -> Result<()> {
        self.registry.save(&self.paths.config_file)
    }

    fn app_key(&self, app: &str) -> Result<String> {
        self.registry
            .app_key(app)
            .map(str::to_string)
            .ok_or_else(|| SwitchError::UnknownApplication {
                app: app.to_string(),
            })
    }

    fn snapshot_path(&self, entry: &ApplicationProfile, artifact_path: &str, name: &str) -> PathBuf {
        PathBuf::from(
            self.paths
                .resolve_template(&entry.snapshot_template, artifact_path, name),
        )
    }

    /// Concrete snapshot location for a registered application's profile
    pub fn snapshot_location(&self, app: &str, profile: &str) -> Result<PathBuf> {
        let key = self.app_key(app)?;
        let entry = &self.registry.apps[&key];
        let artifact_path = self.paths.expand(&entry.artifact_path);
        Ok(self.snapshot_path(entry, &artifact_path, profile))
    }

    /// Insert or replace an application entry with an empty profile set.
    ///
    /// In memory only; the next successful [`Switcher::add_profile`] persists it.
    pub fn register_application(&mut self, app: &str, artifact_path: &str, snapshot_template: &str) {
        let key = self
            .registry
            .app_key(app)
            .map_or_else(|| app.to_string(), str::to_string);
        debug!(app = %key, artifact_path, snapshot_template, "registering application");
        self.registry.apps.insert(
            key,
            ApplicationProfile::new(artifact_path, snapshot_template),
        );
    }

    /// Snapshot the live artifact as profile `profile` of `app`.
    ///
    /// Applications missing from the registry are created from the built-in
    /// templates. If the profile already exists, `confirm_overwrite(app, profile)`
    /// decides whether to replace its snapshot. When the registry cannot be saved
    /// afterwards, a snapshot created by this call is deleted again and the
    /// in-memory registry is restored.
    pub fn add_profile<F>(&mut self, app: &str, profile: &str, confirm_overwrite: F) -> Result<AddOutcome>
    where
        F: FnOnce(&str, &str) -> bool,
    {
        validate_profile_name(profile)?;

        let (key, mut entry) = match self.registry.app_key(app) {
            Some(key) => (key.to_string(), self.registry.apps[key].clone()),
            None => {
                let template = find_template(&self.templates, app).ok_or_else(|| {
                    SwitchError::UnknownApplication {
                        app: app.to_string(),
                    }
                })?;
                let artifact = self.paths.expand_path(&template.artifact_path);
                if Artifact::probe(&artifact).is_none() {
                    return Err(SwitchError::ArtifactNotFound { path: artifact });
                }
                debug!(app = %template.name, "creating application from built-in template");
                (
                    template.name.clone(),
                    ApplicationProfile::new(&template.artifact_path, &template.snapshot_template),
                )
            }
        };

        let artifact_path = self.paths.expand(&entry.artifact_path);
        let artifact = Artifact::probe(&artifact_path).ok_or_else(|| SwitchError::ArtifactNotFound {
            path: PathBuf::from(&artifact_path),
        })?;
        let snapshot_path = self.snapshot_path(&entry, &artifact_path, profile);

        let overwritten = entry.has_profile(profile);
        if overwritten && !confirm_overwrite(&key, profile) {
            debug!(app = %key, profile, "overwrite declined");
            return Err(SwitchError::Cancelled);
        }

        mirror_path(artifact.path(), &snapshot_path).map_err(|source| {
            SwitchError::SnapshotFailure {
                profile: profile.to_string(),
                source,
            }
        })?;

        entry.insert_profile(profile);
        if entry.current_profile.is_empty() {
            entry.current_profile = profile.to_string();
        }
        let previous = self.registry.apps.insert(key.clone(), entry);

        if let Err(err) = self.save() {
            match previous {
                Some(previous) => self.registry.apps.insert(key.clone(), previous),
                None => self.registry.apps.remove(&key),
            };
            if !overwritten {
                if let Err(e) = remove_path(&snapshot_path) {
                    warn!(path = %snapshot_path.display(), error = %e, "failed to remove snapshot after save error");
                }
            }
            return Err(err);
        }

        info!(app = %key, profile, snapshot = %snapshot_path.display(), "added profile");
        Ok(AddOutcome {
            app: key,
            profile: profile.to_string(),
            snapshot_path,
            overwritten,
        })
    }

    /// Make `profile` the live configuration of `app`.
    ///
    /// An empty `profile` cycles to the next one instead. The live content is
    /// first written back to the outgoing profile's snapshot (best effort), then
    /// the target snapshot is installed. The registry is only updated once the
    /// install succeeded.
    pub fn switch_to_profile(&mut self, app: &str, profile: &str) -> Result<SwitchOutcome> {
        let key = self.app_key(app)?;
        if profile.is_empty() {
            return self.cycle_profiles(&key);
        }

        let mut entry = self.registry.apps[&key].clone();
        if !entry.has_profile(profile) {
            return Err(SwitchError::ProfileNotFound {
                app: key,
                profile: profile.to_string(),
            });
        }

        let artifact_path = self.paths.expand(&entry.artifact_path);
        let target = self.snapshot_path(&entry, &artifact_path, profile);
        if Artifact::probe(&target).is_none() {
            return Err(SwitchError::SnapshotMissing {
                profile: profile.to_string(),
                path: target,
            });
        }

        let previous = self.find_current(&key);

        let mut backup_refreshed = true;
        if let Some(outgoing) = previous.as_deref().filter(|p| *p != profile) {
            let outgoing_snapshot = self.snapshot_path(&entry, &artifact_path, outgoing);
            if let Err(e) = mirror_path(Path::new(&artifact_path), &outgoing_snapshot) {
                warn!(app = %key, profile = outgoing, error = %e, "failed to refresh outgoing snapshot");
                backup_refreshed = false;
            }
        }

        mirror_path(&target, Path::new(&artifact_path)).map_err(|source| {
            SwitchError::SwitchFailure {
                profile: profile.to_string(),
                source,
            }
        })?;

        entry.current_profile = profile.to_string();
        self.registry.apps.insert(key.clone(), entry);

        let registry_saved = match self.save() {
            Ok(()) => true,
            Err(e) => {
                warn!(app = %key, error = %e, "switched, but failed to save config");
                false
            }
        };

        info!(app = %key, from = ?previous, to = profile, "switched profile");
        Ok(SwitchOutcome {
            app: key,
            previous,
            current: profile.to_string(),
            backup_refreshed,
            registry_saved,
        })
    }

    /// Switch to the profile after the current one, in name order, wrapping around.
    ///
    /// Goes to the first profile when none is detected as current.
    pub fn cycle_profiles(&mut self, app: &str) -> Result<SwitchOutcome> {
        let key = self.app_key(app)?;

        let next = {
            let names = &self.registry.apps[&key].profile_names;
            if names.is_empty() {
                return Err(SwitchError::NoAccountsConfigured { app: key });
            }

            let current = self.find_current(&key);
            let position = current.and_then(|current| names.iter().position(|n| *n == current));
            match position {
                Some(idx) => names[(idx + 1) % names.len()].clone(),
                None => names[0].clone(),
            }
        };

        debug!(app = %key, next = %next, "cycling profile");
        self.switch_to_profile(&key, &next)
    }

    /// The profile whose snapshot matches the live artifact, if any.
    ///
    /// Profiles are checked in name order and the first match wins. Returns
    /// `None` for unknown applications and when the live artifact is missing.
    pub fn find_current(&self, app: &str) -> Option<String> {
        let entry = self.registry.app(app)?;
        let artifact_path = self.paths.expand(&entry.artifact_path);
        let live = Artifact::probe(&artifact_path)?;

        entry
            .profile_names
            .iter()
            .find(|name| {
                let snapshot = self.snapshot_path(entry, &artifact_path, name);
                snapshot.exists() && content_equal(live.path(), &snapshot, self.directory_compare)
            })
            .cloned()
    }

    /// Profiles of one application with their snapshot state
    pub fn list_profiles(&self, app: &str) -> Result<ProfileListing> {
        let key = self.app_key(app)?;
        let entry = &self.registry.apps[&key];
        let artifact_path = self.paths.expand(&entry.artifact_path);
        let current = self.find_current(&key);

        let profiles = entry
            .profile_names
            .iter()
            .map(|name| {
                let snapshot_path = self.snapshot_path(entry, &artifact_path, name);
                let snapshot = Artifact::probe(&snapshot_path).map(|artifact| SnapshotInfo {
                    kind: artifact.kind(),
                    size: artifact_size(artifact.path()).ok(),
                    modified: fs::metadata(artifact.path())
                        .and_then(|m| m.modified())
                        .ok()
                        .map(DateTime::<Local>::from),
                });
                ProfileEntry {
                    name: name.clone(),
                    is_current: current.as_deref() == Some(name.as_str()),
                    snapshot_path,
                    snapshot,
                }
            })
            .collect();

        Ok(ProfileListing {
            app: key,
            artifact_path: PathBuf::from(artifact_path),
            current,
            profiles,
        })
    }

    /// Every registered application, in name order
    pub fn list_applications(&self) -> Vec<ApplicationSummary> {
        let default = self.registry.default_application();
        self.registry
            .apps
            .iter()
            .map(|(name, entry)| ApplicationSummary {
                name: name.clone(),
                profile_count: entry.profile_names.len(),
                is_default: default == Some(name.as_str()),
                current: self.find_current(name),
            })
            .collect()
    }

    /// Make `app` the default application. Returns the previous default.
    pub fn set_default_application(&mut self, app: &str) -> Result<Option<String>> {
        let key = self.app_key(app)?;
        let previous = std::mem::replace(&mut self.registry.default.config, key);

        if let Err(err) = self.save() {
            self.registry.default.config = previous;
            return Err(err);
        }

        Ok(Some(previous).filter(|p| !p.is_empty()))
    }
}
