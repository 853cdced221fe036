//! High-level command orchestration for the CLI.
//!
//! One handler per subcommand in `main.rs`. Handlers open a [`Switcher`] over
//! the registry, call into it, and render the result through [`Ui`]. Engine
//! errors are turned into `anyhow` errors carrying a `Hint:` line where one
//! helps.

use anstyle::AnsiColor;
use anyhow::{Context, Result, anyhow, bail};
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

use crate::doctor::run_doctor;
use crate::error::SwitchError;
use crate::paths::Paths;
use crate::switch::{SwitchOutcome, Switcher};
use crate::templates::{AppTemplate, detect_applications};
use crate::ui::{Ui, format_bytes, format_time};
use crate::wizard;

/// Editors tried in order when `$EDITOR` is unset
const FALLBACK_EDITORS: [&str; 5] = ["nano", "vi", "vim", "code", "gedit"];

/// Convert an engine error, appending its hint
fn cli_error(err: SwitchError) -> anyhow::Error {
    match err.hint() {
        Some(hint) => anyhow!("{err}\nHint: {hint}"),
        None => anyhow::Error::new(err),
    }
}

fn open_switcher(paths: &Paths) -> Result<Switcher> {
    Switcher::open(paths.clone(), AppTemplate::builtin()).map_err(cli_error)
}

/// Cycle the default application's profiles
pub fn cycle_default(paths: &Paths, ui: &Ui) -> Result<()> {
    let mut switcher = open_switcher(paths)?;

    let app = match switcher.registry().default_application() {
        Some(app) if switcher.registry().app(app).is_some() => app.to_string(),
        Some(app) => bail!(
            "Default application '{}' is not configured.\nHint: Run 'switch add' to set it up, or 'switch default <app>' to pick another.",
            app
        ),
        None => bail!("No default application configured.\nHint: Run 'switch add' to set up an application."),
    };

    run_switch(&mut switcher, &app, "", ui)
}

/// Switch an application to `profile`, or cycle when it is `None`
pub fn use_profile(paths: &Paths, app: &str, profile: Option<&str>, ui: &Ui) -> Result<()> {
    let mut switcher = open_switcher(paths)?;
    run_switch(&mut switcher, app, profile.unwrap_or_default(), ui)
}

fn run_switch(switcher: &mut Switcher, app: &str, profile: &str, ui: &Ui) -> Result<()> {
    let spinner = ui.spinner(format!("Switching {app}..."));

    match switcher.switch_to_profile(app, profile) {
        Ok(outcome) => {
            ui.spinner_finish_ok(&spinner, switched_message(&outcome));
            if !outcome.backup_refreshed {
                if let Some(previous) = outcome.changed_from() {
                    ui.warn(format!(
                        "Could not save the live config back to profile '{previous}'"
                    ));
                }
            }
            if !outcome.registry_saved {
                ui.warn("Switched, but the config file could not be updated");
            }
            Ok(())
        }
        Err(e) => {
            ui.spinner_abandon(&spinner);
            Err(cli_error(e))
        }
    }
}

fn switched_message(outcome: &SwitchOutcome) -> String {
    match outcome.changed_from() {
        Some(previous) => format!(
            "Switched {} from '{}' to '{}'",
            outcome.app, previous, outcome.current
        ),
        None => format!("Switched {} to '{}'", outcome.app, outcome.current),
    }
}

/// Add a profile. Without an application the setup wizard runs; without a
/// profile name it is prompted for.
pub fn add(
    paths: &Paths,
    app: Option<&str>,
    profile: Option<&str>,
    yes: bool,
    ui: &Ui,
) -> Result<()> {
    let mut switcher = open_switcher(paths)?;

    let Some(app) = app else {
        return wizard::run_wizard(&mut switcher, ui);
    };

    let profile = match profile {
        Some(profile) => profile.to_string(),
        None => wizard::prompt_profile("Profile name")?,
    };

    let spinner = ui.spinner(format!("Saving {app} profile '{profile}'..."));
    let result = if yes {
        switcher.add_profile(app, &profile, |_, _| true)
    } else {
        switcher.add_profile(app, &profile, |app, profile| {
            spinner.suspend(|| wizard::confirm_overwrite(app, profile))
        })
    };

    match result {
        Ok(outcome) => {
            let verb = if outcome.overwritten { "Updated" } else { "Added" };
            ui.spinner_finish_ok(
                &spinner,
                format!("{verb} profile '{}' for {}", outcome.profile, outcome.app),
            );
            ui.println(format!(
                "  {}",
                ui.dim(outcome.snapshot_path.display().to_string())
            ));
            Ok(())
        }
        Err(SwitchError::Cancelled) => {
            ui.spinner_abandon(&spinner);
            ui.warn("Overwrite cancelled.");
            Ok(())
        }
        Err(e) => {
            ui.spinner_abandon(&spinner);
            Err(cli_error(e))
        }
    }
}

/// List all configured applications
pub fn list(paths: &Paths, ui: &Ui) -> Result<()> {
    let switcher = open_switcher(paths)?;
    let apps = switcher.list_applications();

    if apps.is_empty() {
        ui.warn("No applications configured.");
        ui.newline();
        ui.println("Set up your first one with:");
        ui.println(format!("  {}", ui.bold("switch add")));
        return Ok(());
    }

    let mut table = ui.simple_table();
    table.set_header(vec![
        ui.header_cell(""),
        ui.header_cell("App"),
        ui.header_cell("Profiles"),
        ui.header_cell("Current"),
    ]);

    for app in &apps {
        let marker = if app.is_default { ui.icon_current() } else { " " };
        let name = if app.is_default {
            ui.colored_cell(format!("{} (default)", app.name), AnsiColor::Green)
        } else {
            ui.cell(&app.name)
        };
        let current = match &app.current {
            Some(current) => ui.cell(current),
            None => ui.colored_cell("-", AnsiColor::BrightBlack),
        };
        table.add_row(vec![
            ui.cell(marker),
            name,
            ui.cell(app.profile_count.to_string()),
            current,
        ]);
    }

    ui.section("Applications");
    ui.println(table.to_string());
    Ok(())
}

/// List the profiles of one application
pub fn list_app(paths: &Paths, app: &str, ui: &Ui) -> Result<()> {
    let switcher = open_switcher(paths)?;
    let listing = switcher.list_profiles(app).map_err(cli_error)?;

    ui.section(format!("{} profiles", listing.app));
    ui.println(ui.dim(listing.artifact_path.display().to_string()));
    ui.newline();

    if listing.profiles.is_empty() {
        ui.warn(format!("No profiles for {}.", listing.app));
        ui.println(format!("  switch add {} <name>", listing.app));
        return Ok(());
    }

    let mut table = ui.table();
    table.set_header(vec![
        ui.header_cell(""),
        ui.header_cell("Profile"),
        ui.header_cell("Kind"),
        ui.header_cell("Size"),
        ui.header_cell("Saved"),
    ]);

    for profile in &listing.profiles {
        let marker = if profile.is_current { ui.icon_current() } else { " " };
        let name = if profile.is_current {
            ui.colored_cell(format!("{} (current)", profile.name), AnsiColor::Green)
        } else {
            ui.cell(&profile.name)
        };

        let row = match &profile.snapshot {
            Some(info) => vec![
                ui.cell(marker),
                name,
                ui.kind_cell(info.kind),
                ui.cell(info.size.map(format_bytes).unwrap_or_else(|| "?".to_string())),
                ui.cell(info.modified.as_ref().map(format_time).unwrap_or_default()),
            ],
            None => vec![
                ui.cell(marker),
                name,
                ui.colored_cell("missing", AnsiColor::Red),
                ui.cell("-"),
                ui.cell("-"),
            ],
        };
        table.add_row(row);
    }

    ui.println(table.to_string());
    Ok(())
}

/// Print the profile matching the live config
pub fn current(paths: &Paths, app: &str, ui: &Ui) -> Result<()> {
    let switcher = open_switcher(paths)?;
    if switcher.registry().app(app).is_none() {
        return Err(cli_error(SwitchError::UnknownApplication {
            app: app.to_string(),
        }));
    }

    match switcher.find_current(app) {
        Some(profile) => ui.println(profile),
        None => ui.warn(format!("The live {app} config matches none of its profiles")),
    }
    Ok(())
}

/// Make `app` the application a bare `switch` cycles
pub fn set_default(paths: &Paths, app: &str, ui: &Ui) -> Result<()> {
    let mut switcher = open_switcher(paths)?;
    let previous = switcher.set_default_application(app).map_err(cli_error)?;
    let app = switcher.registry().default.config.clone();

    match previous {
        Some(previous) if previous != app => {
            ui.ok(format!("Default app changed from {previous} to {app}"))
        }
        _ => ui.ok(format!("Default app set to {app}")),
    }
    Ok(())
}

/// Pick the editor: `$EDITOR`, else the first fallback found on `PATH`
fn resolve_editor(editor: Option<String>, path_var: Option<OsString>) -> Option<PathBuf> {
    if let Some(editor) = editor.filter(|e| !e.trim().is_empty()) {
        return Some(PathBuf::from(editor));
    }

    let dirs: Vec<PathBuf> = path_var
        .map(|p| env::split_paths(&p).collect())
        .unwrap_or_default();
    FALLBACK_EDITORS.iter().find_map(|name| {
        dirs.iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

/// Open the registry file in an editor
pub fn open_config(paths: &Paths, ui: &Ui) -> Result<()> {
    // Creates the file if this is a first run
    open_switcher(paths)?;

    let editor = resolve_editor(env::var("EDITOR").ok(), env::var_os("PATH")).context(
        "No text editor found.\nHint: Set the EDITOR environment variable or install nano, vim or code.",
    )?;

    let status = Command::new(&editor)
        .arg(&paths.config_file)
        .status()
        .with_context(|| format!("Failed to run editor: {}", editor.display()))?;

    if !status.success() {
        bail!("Editor exited with non-zero status");
    }

    ui.ok(format!("Edited {}", paths.config_file.display()));
    Ok(())
}

/// Show the built-in templates and which applications are installed
pub fn templates(paths: &Paths, ui: &Ui) -> Result<()> {
    let templates = AppTemplate::builtin();
    let detected = detect_applications(paths, &templates);

    let mut table = ui.table();
    table.set_header(vec![
        ui.header_cell("App"),
        ui.header_cell("Config path"),
        ui.header_cell("Switch pattern"),
        ui.header_cell("Found"),
    ]);

    for template in &templates {
        let found = detected.iter().find(|d| d.template.name == template.name);
        let found_cell = match found {
            Some(d) => ui.colored_cell(format!("{} ({})", ui.icon_ok(), d.kind), AnsiColor::Green),
            None => ui.colored_cell("-", AnsiColor::BrightBlack),
        };
        table.add_row(vec![
            ui.cell(&template.name),
            ui.cell(found.map_or(template.artifact_path.as_str(), |d| d.artifact_path.as_str())),
            ui.cell(&template.snapshot_template),
            found_cell,
        ]);
    }

    ui.section("Built-in templates");
    ui.println(table.to_string());
    ui.newline();
    ui.info(format!("{} of {} detected on this machine", detected.len(), templates.len()));
    Ok(())
}

/// Run diagnostics
pub fn doctor(paths: &Paths, ui: &Ui) -> Result<()> {
    if !run_doctor(paths, AppTemplate::builtin(), ui) {
        bail!("Problems found.\nHint: Fix the entries marked above, or re-add the affected profiles.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::test_utils::{read, setup_test_paths, write};
    use crate::ui::ColorMode;
    use std::fs;
    use tempfile::TempDir;

    fn test_ui() -> Ui {
        Ui::new(ColorMode::Never, false)
    }

    #[test]
    fn test_list_empty() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        assert!(list(&paths, &test_ui()).is_ok());
        assert!(paths.config_file.exists());
    }

    #[test]
    fn test_add_use_and_list() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        let auth = temp_dir.path().join(".codex/auth.json");

        write(&auth, r#"{"token":"a"}"#);
        add(&paths, Some("codex"), Some("a"), false, &ui).unwrap();
        write(&auth, r#"{"token":"b"}"#);
        add(&paths, Some("codex"), Some("b"), false, &ui).unwrap();

        use_profile(&paths, "codex", Some("a"), &ui).unwrap();
        assert_eq!(read(&auth), r#"{"token":"a"}"#);

        // Bare switch cycles codex, the default
        cycle_default(&paths, &ui).unwrap();
        assert_eq!(read(&auth), r#"{"token":"b"}"#);

        assert!(list(&paths, &ui).is_ok());
        assert!(list_app(&paths, "codex", &ui).is_ok());
        assert!(current(&paths, "codex", &ui).is_ok());
    }

    #[test]
    fn test_add_duplicate_with_yes_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        let gitconfig = temp_dir.path().join(".gitconfig");

        write(&gitconfig, "old");
        add(&paths, Some("git"), Some("work"), true, &ui).unwrap();
        write(&gitconfig, "new");
        add(&paths, Some("git"), Some("work"), true, &ui).unwrap();

        assert_eq!(read(&temp_dir.path().join(".gitconfig.work.switch")), "new");
    }

    #[test]
    fn test_use_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        write(&temp_dir.path().join(".gitconfig"), "x");
        add(&paths, Some("git"), Some("work"), true, &ui).unwrap();

        let err = use_profile(&paths, "git", Some("home"), &ui).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("profile 'home' not found"));
        assert!(message.contains("Hint: Use 'switch list git'"));
    }

    #[test]
    fn test_cycle_default_unconfigured() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);

        let err = cycle_default(&paths, &test_ui()).unwrap_err();
        assert!(err.to_string().contains("'codex' is not configured"));
    }

    #[test]
    fn test_set_default() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        write(&temp_dir.path().join(".gitconfig"), "x");
        add(&paths, Some("git"), Some("work"), true, &ui).unwrap();

        set_default(&paths, "Git", &ui).unwrap();
        let registry = Registry::load(&paths.config_file).unwrap();
        assert_eq!(registry.default_application(), Some("git"));

        assert!(set_default(&paths, "nope", &ui).is_err());
    }

    #[test]
    fn test_current_unknown_app() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        assert!(current(&paths, "codex", &test_ui()).is_err());
    }

    #[test]
    fn test_templates_and_doctor() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        write(&temp_dir.path().join(".gitconfig"), "x");

        assert!(templates(&paths, &ui).is_ok());
        add(&paths, Some("git"), Some("work"), true, &ui).unwrap();
        set_default(&paths, "git", &ui).unwrap();
        assert!(doctor(&paths, &ui).is_ok());

        fs::remove_file(temp_dir.path().join(".gitconfig.work.switch")).unwrap();
        assert!(doctor(&paths, &ui).is_err());
    }

    #[test]
    fn test_resolve_editor() {
        let temp_dir = TempDir::new().unwrap();
        write(&temp_dir.path().join("vim"), "");
        write(&temp_dir.path().join("code"), "");
        let path_var = Some(temp_dir.path().as_os_str().to_owned());

        assert_eq!(
            resolve_editor(Some("hx".to_string()), path_var.clone()),
            Some(PathBuf::from("hx"))
        );
        assert_eq!(
            resolve_editor(None, path_var.clone()),
            Some(temp_dir.path().join("vim"))
        );
        assert_eq!(resolve_editor(Some(" ".to_string()), None), None);
    }
}
