//! Diagnostics for `switch doctor`.
//!
//! Checks the registry file, the default application, and for every
//! application whether its live artifact and profile snapshots still exist on
//! disk. The registry and the disk can drift apart when files are moved or
//! deleted by hand; this is where that shows up.

use anstyle::AnsiColor;
use std::env;
use std::path::PathBuf;

use crate::paths::{Artifact, ArtifactKind, Paths};
use crate::switch::Switcher;
use crate::templates::AppTemplate;
use crate::ui::Ui;

/// Registry/disk state of one application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDiagnosis {
    pub name: String,
    pub artifact_path: PathBuf,
    /// `None` when the live artifact is missing
    pub artifact_kind: Option<ArtifactKind>,
    pub profile_count: usize,
    /// Registered profiles whose snapshot is gone
    pub missing_snapshots: Vec<String>,
    /// Profile matching the live content
    pub detected: Option<String>,
    /// Profile the registry last recorded as current
    pub recorded: Option<String>,
}

impl AppDiagnosis {
    pub fn is_healthy(&self) -> bool {
        self.artifact_kind.is_some() && self.missing_snapshots.is_empty()
    }
}

/// Inspect every registered application
pub fn diagnose(switcher: &Switcher) -> Vec<AppDiagnosis> {
    switcher
        .registry()
        .apps
        .iter()
        .filter_map(|(name, entry)| {
            let listing = switcher.list_profiles(name).ok()?;
            Some(AppDiagnosis {
                name: name.clone(),
                artifact_kind: Artifact::probe(&listing.artifact_path).map(|a| a.kind()),
                artifact_path: listing.artifact_path,
                profile_count: listing.profiles.len(),
                missing_snapshots: listing
                    .profiles
                    .iter()
                    .filter(|p| p.snapshot.is_none())
                    .map(|p| p.name.clone())
                    .collect(),
                detected: listing.current,
                recorded: Some(entry.current_profile.clone()).filter(|c| !c.is_empty()),
            })
        })
        .collect()
}

/// Run the doctor diagnostics. Returns `true` when no problems were found.
pub fn run_doctor(paths: &Paths, templates: Vec<AppTemplate>, ui: &Ui) -> bool {
    ui.section("switch doctor");
    ui.newline();

    let mut healthy = true;

    // 1. Registry file
    let mut switcher = None;
    healthy &= check_step(ui, "Config File", || {
        if !paths.config_file.exists() {
            ui.println(format!(
                "  {} {} missing (it will be created on first use)",
                ui.icon_warn(),
                paths.config_file.display()
            ));
            return true;
        }

        match Switcher::open(paths.clone(), templates) {
            Ok(s) => {
                ui.println(format!(
                    "  {} {} readable",
                    ui.icon_ok(),
                    paths.config_file.display()
                ));
                switcher = Some(s);
                true
            }
            Err(e) => {
                ui.println(format!("  {} {}", ui.icon_err(), e));
                if let Some(source) = std::error::Error::source(&e) {
                    ui.println(format!("    {}", ui.dim(source.to_string())));
                }
                false
            }
        }
    });

    let Some(switcher) = switcher else {
        return healthy;
    };

    // 2. Default application
    healthy &= check_step(ui, "Default Application", || {
        let registry = switcher.registry();
        match registry.default_application() {
            None => {
                ui.println(format!("  {} No default application set", ui.icon_info()));
                true
            }
            Some(name) if registry.app(name).is_some() => {
                ui.println(format!("  {} Default application: {}", ui.icon_ok(), name));
                true
            }
            Some(name) if registry.apps.is_empty() => {
                ui.println(format!(
                    "  {} Default is '{}' but nothing is configured yet",
                    ui.icon_info(),
                    name
                ));
                true
            }
            Some(name) => {
                ui.println(format!(
                    "  {} Default application '{}' is not configured",
                    ui.icon_err(),
                    name
                ));
                ui.println("    Fix with: switch default <app>");
                false
            }
        }
    });

    // 3. Applications
    healthy &= check_step(ui, "Applications", || {
        let report = diagnose(&switcher);
        if report.is_empty() {
            ui.println(format!("  {} No applications configured", ui.icon_warn()));
            return true;
        }

        for app in &report {
            print_app(ui, app);
        }
        report.iter().all(AppDiagnosis::is_healthy)
    });

    // 4. Environment
    check_step(ui, "Environment", || {
        match env::var("EDITOR") {
            Ok(e) => ui.println(format!("  {} EDITOR set to: {}", ui.icon_ok(), e)),
            Err(_) => ui.println(format!(
                "  {} EDITOR not set ('switch config' will look for nano, vi, vim, code, gedit)",
                ui.icon_info()
            )),
        }
        true
    });

    healthy
}

fn print_app(ui: &Ui, app: &AppDiagnosis) {
    let icon = if app.is_healthy() { ui.icon_ok() } else { ui.icon_err() };
    ui.println(format!(
        "  {} {} ({} profiles)",
        icon,
        ui.bold(&app.name),
        app.profile_count
    ));

    match app.artifact_kind {
        Some(kind) => ui.println(format!(
            "      {} {}: {}",
            ui.icon_info(),
            kind,
            app.artifact_path.display()
        )),
        None => ui.println(format!(
            "      {} Config path missing: {}",
            ui.icon_err(),
            app.artifact_path.display()
        )),
    }

    for name in &app.missing_snapshots {
        ui.println(format!(
            "      {} Snapshot missing for profile '{}'",
            ui.icon_err(),
            name
        ));
    }

    match (&app.detected, &app.recorded) {
        (Some(detected), _) => ui.println(format!(
            "      {} Active profile: {}",
            ui.icon_ok(),
            ui.colored(detected, AnsiColor::Green)
        )),
        (None, Some(recorded)) if app.artifact_kind.is_some() => ui.println(format!(
            "      {} Live config matches no profile (last switched to '{}')",
            ui.icon_warn(),
            recorded
        )),
        _ => {}
    }
}

fn check_step<F>(ui: &Ui, name: &str, check_fn: F) -> bool
where
    F: FnOnce() -> bool,
{
    ui.println(ui.bold(format!("Checking {}...", name)));
    let success = check_fn();
    if !success {
        ui.println(ui.colored("  Issues detected!", AnsiColor::Red));
    }
    ui.newline();
    success
}
