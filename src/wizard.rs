//! Interactive setup wizard behind a bare `switch add`.
//!
//! On first run it offers the detected applications plus a manual setup. Once
//! applications exist it offers those, auto-detection of new ones, and manual
//! setup. Every path ends in a summary and a confirmation before anything is
//! written.

use anyhow::{Context, Result};
use inquire::validator::Validation;
use inquire::{Confirm, Select, Text};
use std::fmt;

use crate::paths::Artifact;
use crate::switch::{Switcher, validate_profile_name};
use crate::templates::{DetectedApp, default_snapshot_template, detect_applications};
use crate::ui::Ui;

/// One entry of the wizard's target menu
#[derive(Debug, Clone)]
enum Target {
    Existing(String),
    Detected { app: DetectedApp, location: String },
    AutoDetect,
    Manual,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Existing(name) => write!(f, "{name}"),
            Self::Detected { app, location } => {
                write!(f, "{:<8} {}  [{}]", app.template.name, location, app.kind)
            }
            Self::AutoDetect => f.write_str("Auto-detect new application"),
            Self::Manual => f.write_str("Other (manual setup)"),
        }
    }
}

/// Everything needed to register an application and snapshot its first profile
#[derive(Debug, Clone, PartialEq, Eq)]
struct Draft {
    app: String,
    artifact_path: String,
    snapshot_template: String,
    profile: String,
    /// The application is new and must be registered first
    register: bool,
}

impl Draft {
    fn summary(&self, switcher: &Switcher) -> Vec<(&'static str, String)> {
        let paths = switcher.paths();
        let artifact = paths.expand(&self.artifact_path);
        let snapshot = paths.resolve_template(&self.snapshot_template, &artifact, &self.profile);
        vec![
            ("App:", self.app.clone()),
            ("Profile:", self.profile.clone()),
            ("Config path:", artifact),
            ("Backup path:", snapshot),
        ]
    }
}

fn detected_targets(switcher: &Switcher, skip_registered: bool) -> Vec<Target> {
    detect_applications(switcher.paths(), switcher.templates())
        .into_iter()
        .filter(|d| !(skip_registered && switcher.registry().app(&d.template.name).is_some()))
        .map(|app| Target::Detected {
            location: switcher.paths().expand(&app.artifact_path),
            app,
        })
        .collect()
}

fn first_run_targets(switcher: &Switcher) -> Vec<Target> {
    let mut targets = detected_targets(switcher, false);
    targets.push(Target::Manual);
    targets
}

fn existing_targets(switcher: &Switcher) -> Vec<Target> {
    let mut targets: Vec<Target> = switcher
        .registry()
        .apps
        .keys()
        .cloned()
        .map(Target::Existing)
        .collect();
    targets.push(Target::AutoDetect);
    targets.push(Target::Manual);
    targets
}

fn profile_name_validator(input: &str) -> Result<Validation, inquire::CustomUserError> {
    Ok(match validate_profile_name(input.trim()) {
        Ok(()) => Validation::Valid,
        Err(e) => Validation::Invalid(e.to_string().into()),
    })
}

fn required(input: &str) -> Result<Validation, inquire::CustomUserError> {
    if input.trim().is_empty() {
        Ok(Validation::Invalid("A value is required".into()))
    } else {
        Ok(Validation::Valid)
    }
}

fn prompt_text(label: &str, default: Option<&str>) -> Result<String> {
    let mut prompt = Text::new(label).with_validator(required);
    if let Some(default) = default {
        prompt = prompt.with_default(default);
    }
    let value = prompt.prompt().context("Setup cancelled")?;
    Ok(value.trim().to_string())
}

/// Prompt for a profile name, validated as it is typed
pub fn prompt_profile(label: &str) -> Result<String> {
    let value = Text::new(label)
        .with_validator(profile_name_validator)
        .prompt()
        .context("Setup cancelled")?;
    Ok(value.trim().to_string())
}

/// Ask whether to replace an existing profile's snapshot
pub fn confirm_overwrite(app: &str, profile: &str) -> bool {
    Confirm::new(&format!("Profile '{profile}' already exists for {app}. Overwrite it?"))
        .with_default(false)
        .with_help_message("The stored snapshot will be replaced with the current config")
        .prompt()
        .unwrap_or(false)
}

fn draft_from_detected(app: &DetectedApp) -> Result<Draft> {
    let name = prompt_text("Application name", Some(&app.template.name))?;
    let artifact_path = prompt_text("Config path", Some(&app.artifact_path))?;
    let snapshot_template = prompt_text("Switch pattern", Some(&app.template.snapshot_template))?;
    let profile = prompt_profile("Current profile name")?;

    Ok(Draft {
        app: name.to_lowercase(),
        artifact_path,
        snapshot_template,
        profile,
        register: true,
    })
}

fn draft_manual(switcher: &Switcher) -> Result<Draft> {
    let name = prompt_text("Application name", None)?;
    let artifact_path = prompt_text("Config file/folder path", None)?;
    let kind = Artifact::probe(switcher.paths().expand_path(&artifact_path)).map(|a| a.kind());
    let suggested = default_snapshot_template(&artifact_path, kind);
    let snapshot_template = prompt_text("Switch pattern", Some(&suggested))?;
    let profile = prompt_profile("Current profile name")?;

    Ok(Draft {
        app: name.to_lowercase(),
        artifact_path,
        snapshot_template,
        profile,
        register: true,
    })
}

fn draft_existing(switcher: &Switcher, app: &str) -> Result<Option<Draft>> {
    let Some(entry) = switcher.registry().app(app) else {
        return Ok(None);
    };
    let profile = prompt_profile("New profile name")?;

    Ok(Some(Draft {
        app: app.to_string(),
        artifact_path: entry.artifact_path.clone(),
        snapshot_template: entry.snapshot_template.clone(),
        profile,
        register: false,
    }))
}

/// Point a draft naming a registered application at that application's
/// entry, so registering never drops its existing profiles
fn reuse_registered(switcher: &Switcher, draft: Draft) -> Draft {
    let registry = switcher.registry();
    let Some(key) = registry.app_key(&draft.app) else {
        return draft;
    };
    let entry = &registry.apps[key];
    Draft {
        app: key.to_string(),
        artifact_path: entry.artifact_path.clone(),
        snapshot_template: entry.snapshot_template.clone(),
        register: false,
        ..draft
    }
}

fn banner(ui: &Ui, subtitle: &str) {
    ui.newline();
    ui.section("Switch Setup Wizard");
    ui.println(ui.dim(subtitle));
    ui.newline();
}

fn choose(title: &str, targets: Vec<Target>) -> Result<Target> {
    Select::new(title, targets)
        .with_page_size(10)
        .prompt()
        .context("Setup cancelled")
}

/// Run the wizard against `switcher`
pub fn run_wizard(switcher: &mut Switcher, ui: &Ui) -> Result<()> {
    let draft = if switcher.registry().apps.is_empty() {
        banner(ui, "Welcome to Switch! Let's set up your first profile.");
        match choose("Available applications:", first_run_targets(switcher))? {
            Target::Detected { app, .. } => Some(draft_from_detected(&app)?),
            _ => Some(draft_manual(switcher)?),
        }
    } else {
        banner(ui, "Add new profile");
        match choose("Choose target:", existing_targets(switcher))? {
            Target::Existing(app) => draft_existing(switcher, &app)?,
            Target::AutoDetect => {
                let detected = detected_targets(switcher, true);
                if detected.is_empty() {
                    ui.info("No new applications detected.");
                    return Ok(());
                }
                match choose("Detected applications:", detected)? {
                    Target::Detected { app, .. } => Some(draft_from_detected(&app)?),
                    _ => None,
                }
            }
            Target::Manual | Target::Detected { .. } => Some(draft_manual(switcher)?),
        }
    };

    let Some(mut draft) = draft else {
        return Ok(());
    };
    if draft.register && switcher.registry().app(&draft.app).is_some() {
        ui.warn(format!(
            "{} is already configured; the profile is added with its existing paths",
            draft.app
        ));
        draft = reuse_registered(switcher, draft);
    }

    ui.newline();
    ui.section("Summary");
    let mut table = ui.simple_table();
    for (label, value) in draft.summary(switcher) {
        table.add_row(vec![ui.cell(label), ui.cell(value)]);
    }
    ui.println(table.to_string());

    let save = Confirm::new("Save this configuration?")
        .with_default(true)
        .prompt()
        .context("Setup cancelled")?;
    if !save {
        ui.warn("Setup cancelled.");
        return Ok(());
    }

    apply(switcher, &draft, confirm_overwrite)?;

    ui.ok(format!("Added profile '{}' for {}", draft.profile, draft.app));
    if switcher.registry().default_application() == Some(draft.app.as_str()) {
        ui.println(format!("  Run {} to cycle its profiles", ui.bold("switch")));
    } else {
        ui.println(format!("  Run {} to cycle its profiles", ui.bold(format!("switch use {}", draft.app))));
    }
    Ok(())
}

/// Register (if new), add the profile and claim the default when it is unusable
fn apply<F>(switcher: &mut Switcher, draft: &Draft, confirm: F) -> Result<()>
where
    F: FnOnce(&str, &str) -> bool,
{
    if draft.register {
        switcher.register_application(&draft.app, &draft.artifact_path, &draft.snapshot_template);
    }

    switcher.add_profile(&draft.app, &draft.profile, confirm)?;

    let registry = switcher.registry();
    let default_unusable = registry
        .default_application()
        .is_none_or(|name| registry.app(name).is_none());
    if default_unusable {
        switcher
            .set_default_application(&draft.app)
            .context("Failed to set default application")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{read, setup_switcher, write};
    use tempfile::TempDir;

    fn draft(app: &str, artifact_path: &str, snapshot_template: &str, profile: &str) -> Draft {
        Draft {
            app: app.to_string(),
            artifact_path: artifact_path.to_string(),
            snapshot_template: snapshot_template.to_string(),
            profile: profile.to_string(),
            register: true,
        }
    }

    #[test]
    fn test_first_run_targets_list_detected_then_manual() {
        let temp_dir = TempDir::new().unwrap();
        write(&temp_dir.path().join(".gitconfig"), "[user]");
        let switcher = setup_switcher(&temp_dir);

        let labels: Vec<String> = first_run_targets(&switcher).iter().map(|t| t.to_string()).collect();
        assert_eq!(labels.len(), 2);
        assert!(labels[0].starts_with("git"));
        assert!(labels[0].ends_with("[File]"));
        assert_eq!(labels[1], "Other (manual setup)");
    }

    #[test]
    fn test_existing_targets_and_auto_detect_skips_registered() {
        let temp_dir = TempDir::new().unwrap();
        write(&temp_dir.path().join(".gitconfig"), "[user]");
        write(&temp_dir.path().join(".ssh/config"), "Host *");
        let mut switcher = setup_switcher(&temp_dir);
        switcher.add_profile("git", "work", |_, _| true).unwrap();

        let labels: Vec<String> = existing_targets(&switcher).iter().map(|t| t.to_string()).collect();
        assert_eq!(labels, vec!["git", "Auto-detect new application", "Other (manual setup)"]);

        let detected = detected_targets(&switcher, true);
        assert_eq!(detected.len(), 1);
        assert!(detected[0].to_string().starts_with("ssh"));
    }

    #[test]
    fn test_draft_summary_resolves_paths() {
        let temp_dir = TempDir::new().unwrap();
        let switcher = setup_switcher(&temp_dir);
        let draft = draft("codex", "~/.codex/auth.json", "{auth_path}.{name}.switch", "work");

        let home = temp_dir.path().display().to_string();
        assert_eq!(
            draft.summary(&switcher),
            vec![
                ("App:", "codex".to_string()),
                ("Profile:", "work".to_string()),
                ("Config path:", format!("{home}/.codex/auth.json")),
                ("Backup path:", format!("{home}/.codex/auth.json.work.switch")),
            ]
        );
    }

    #[test]
    fn test_apply_registers_and_claims_default() {
        let temp_dir = TempDir::new().unwrap();
        let mut switcher = setup_switcher(&temp_dir);
        let live = temp_dir.path().join(".tool/settings");
        write(&live, "mode=a");

        let draft = draft("tool", "~/.tool/settings", "~/.tool/{name}.switch", "a");
        apply(&mut switcher, &draft, |_, _| true).unwrap();

        assert_eq!(read(&temp_dir.path().join(".tool/a.switch")), "mode=a");
        assert_eq!(switcher.registry().default_application(), Some("tool"));
        assert_eq!(switcher.find_current("tool"), Some("a".to_string()));
    }

    #[test]
    fn test_apply_keeps_usable_default() {
        let temp_dir = TempDir::new().unwrap();
        write(&temp_dir.path().join(".codex/auth.json"), "{}");
        write(&temp_dir.path().join(".tool"), "x");
        let mut switcher = setup_switcher(&temp_dir);
        switcher.add_profile("codex", "main", |_, _| true).unwrap();

        apply(&mut switcher, &draft("tool", "~/.tool", "{artifact_path}.{name}", "x"), |_, _| true)
            .unwrap();
        assert_eq!(switcher.registry().default_application(), Some("codex"));
    }

    #[test]
    fn test_draft_for_registered_app_keeps_its_profiles() {
        let temp_dir = TempDir::new().unwrap();
        write(&temp_dir.path().join(".gitconfig"), "[user] a");
        let mut switcher = setup_switcher(&temp_dir);
        switcher.add_profile("git", "a", |_, _| true).unwrap();

        let typed = draft("GIT", "~/elsewhere", "~/elsewhere.{name}", "b");
        let reused = reuse_registered(&switcher, typed);
        assert_eq!(reused.app, "git");
        assert_eq!(reused.artifact_path, "~/.gitconfig");
        assert_eq!(reused.profile, "b");
        assert!(!reused.register);

        write(&temp_dir.path().join(".gitconfig"), "[user] b");
        apply(&mut switcher, &reused, |_, _| true).unwrap();
        assert_eq!(switcher.registry().app("git").unwrap().profile_names, vec!["a", "b"]);
        assert_eq!(read(&temp_dir.path().join(".gitconfig.a.switch")), "[user] a");

        // Unregistered names pass through untouched
        let fresh = draft("tool", "~/.tool", "{artifact_path}.{name}", "x");
        assert_eq!(reuse_registered(&switcher, fresh.clone()), fresh);
    }

    #[test]
    fn test_profile_name_validator() {
        assert!(matches!(profile_name_validator("work"), Ok(Validation::Valid)));
        assert!(matches!(profile_name_validator("a/b"), Ok(Validation::Invalid(_))));
        assert!(matches!(required("  "), Ok(Validation::Invalid(_))));
    }
}
