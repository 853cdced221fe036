use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use tracing::debug;

use crate::error::{Result, SwitchError};

/// Application cycled by a bare `switch` when the registry is first created
pub const DEFAULT_APPLICATION: &str = "codex";

/// Registry stored in ~/.switch.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub default: DefaultSection,

    #[serde(default)]
    pub apps: BTreeMap<String, ApplicationProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultSection {
    /// Name of the application cycled when no target is given
    #[serde(default)]
    pub config: String,
}

/// Profiles tracked for one application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationProfile {
    /// Last known active profile. Advisory only, detection goes by content.
    #[serde(default, rename = "current")]
    pub current_profile: String,

    /// Known profile names, kept sorted and unique
    #[serde(default, rename = "accounts")]
    pub profile_names: Vec<String>,

    /// Live config file or folder the application reads
    #[serde(rename = "auth_path")]
    pub artifact_path: String,

    /// Where snapshots live, with `{artifact_path}` and `{name}` placeholders
    #[serde(rename = "switch_pattern")]
    pub snapshot_template: String,
}

impl ApplicationProfile {
    pub fn new(artifact_path: impl Into<String>, snapshot_template: impl Into<String>) -> Self {
        Self {
            current_profile: String::new(),
            profile_names: Vec::new(),
            artifact_path: artifact_path.into(),
            snapshot_template: snapshot_template.into(),
        }
    }

    pub fn has_profile(&self, name: &str) -> bool {
        self.profile_names.binary_search_by(|p| p.as_str().cmp(name)).is_ok()
    }

    /// Insert a profile name keeping the list sorted. Returns `false` if it was already there.
    pub fn insert_profile(&mut self, name: &str) -> bool {
        match self.profile_names.binary_search_by(|p| p.as_str().cmp(name)) {
            Ok(_) => false,
            Err(idx) => {
                self.profile_names.insert(idx, name.to_string());
                true
            }
        }
    }

    /// Sort and de-duplicate names, e.g. after a hand edit of the file
    fn normalize(&mut self) {
        self.profile_names.sort();
        self.profile_names.dedup();
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            default: DefaultSection {
                config: DEFAULT_APPLICATION.to_string(),
            },
            apps: BTreeMap::new(),
        }
    }
}

impl Registry {
    /// Read the registry, creating and saving the default one if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "config file missing, writing defaults");
                let registry = Self::default();
                registry.save(path)?;
                return Ok(registry);
            }
            Err(source) => {
                return Err(SwitchError::ConfigRead {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let mut registry: Self = toml::from_str(&content).map_err(|source| SwitchError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        for app in registry.apps.values_mut() {
            app.normalize();
        }
        Ok(registry)
    }

    /// Write the registry, replacing the whole file.
    ///
    /// Content goes to a temp file first and is renamed over `path`. There is no
    /// locking: concurrent writers race and the last rename wins.
    pub fn save(&self, path: &Path) -> Result<()> {
        let write_err = |source: io::Error| SwitchError::ConfigWrite {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| write_err(io::Error::other(e)))?;

        let temp_path = path.with_extension("toml.tmp");
        std::fs::write(&temp_path, &content).map_err(write_err)?;

        if let Err(e) = std::fs::rename(&temp_path, path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(write_err(e));
        }

        debug!(path = %path.display(), "saved config");
        Ok(())
    }

    /// Registry key for `name`: the exact key if present, else a case-insensitive match
    pub fn app_key(&self, name: &str) -> Option<&str> {
        if let Some((key, _)) = self.apps.get_key_value(name) {
            return Some(key);
        }
        self.apps
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    pub fn app(&self, name: &str) -> Option<&ApplicationProfile> {
        let key = self.app_key(name)?;
        self.apps.get(key)
    }

    /// The default application, or `None` when unset
    pub fn default_application(&self) -> Option<&str> {
        Some(self.default.config.as_str()).filter(|name| !name.is_empty())
    }
}
