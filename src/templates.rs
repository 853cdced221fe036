//! Built-in templates for well-known applications, and detection of which ones are installed.

use std::path::Path;

use crate::paths::{Artifact, ArtifactKind, Paths};

/// Snapshot template used for single-file artifacts
pub const FILE_SNAPSHOT_TEMPLATE: &str = "{artifact_path}.{name}.switch";

/// How to find and snapshot one application's configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppTemplate {
    pub name: String,
    /// Candidate locations checked in order during detection
    pub detect_paths: Vec<String>,
    /// Default live artifact path
    pub artifact_path: String,
    pub snapshot_template: String,
    pub description: String,
}

impl AppTemplate {
    pub fn new(
        name: &str,
        detect_paths: &[&str],
        artifact_path: &str,
        snapshot_template: &str,
        description: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            detect_paths: detect_paths.iter().map(|p| p.to_string()).collect(),
            artifact_path: artifact_path.to_string(),
            snapshot_template: snapshot_template.to_string(),
            description: description.to_string(),
        }
    }

    /// The built-in template table
    pub fn builtin() -> Vec<AppTemplate> {
        vec![
            Self::new(
                "codex",
                &["~/.codex/auth.json"],
                "~/.codex/auth.json",
                FILE_SNAPSHOT_TEMPLATE,
                "Codex authentication file",
            ),
            Self::new(
                "claude",
                &["~/.claude/config.json"],
                "~/.claude/config.json",
                FILE_SNAPSHOT_TEMPLATE,
                "Claude configuration file",
            ),
            Self::new(
                "vscode",
                &["~/.vscode/User", "~/Library/Application Support/Code/User"],
                "~/.vscode/User",
                "~/.vscode/profiles/{name}.switch",
                "VSCode user settings folder",
            ),
            Self::new(
                "cursor",
                &["~/.cursor", "~/Library/Application Support/Cursor"],
                "~/.cursor",
                "~/.cursor/profiles/{name}.switch",
                "Cursor configuration folder",
            ),
            Self::new(
                "ssh",
                &["~/.ssh"],
                "~/.ssh",
                "~/.ssh/profiles/{name}.switch",
                "SSH configuration folder",
            ),
            Self::new(
                "git",
                &["~/.gitconfig"],
                "~/.gitconfig",
                FILE_SNAPSHOT_TEMPLATE,
                "Git configuration file",
            ),
        ]
    }
}

/// Look up a template by name, case-insensitively
pub fn find_template<'a>(templates: &'a [AppTemplate], name: &str) -> Option<&'a AppTemplate> {
    templates
        .iter()
        .find(|t| t.name == name)
        .or_else(|| templates.iter().find(|t| t.name.eq_ignore_ascii_case(name)))
}

/// An application found on this machine
#[derive(Debug, Clone)]
pub struct DetectedApp {
    pub template: AppTemplate,
    /// Artifact path to use: the template default if it exists, else the detected location
    pub artifact_path: String,
    pub kind: ArtifactKind,
}

/// Check every template's candidate paths; the first existing one wins.
///
/// Sorted by application name.
pub fn detect_applications(paths: &Paths, templates: &[AppTemplate]) -> Vec<DetectedApp> {
    let mut found: Vec<DetectedApp> = templates
        .iter()
        .filter_map(|template| {
            let detected = template
                .detect_paths
                .iter()
                .find_map(|p| Artifact::probe(paths.expand_path(p)).map(|a| (p, a)))?;

            let default = Artifact::probe(paths.expand_path(&template.artifact_path));
            let (artifact_path, kind) = match default {
                Some(artifact) => (template.artifact_path.clone(), artifact.kind()),
                None => (detected.0.clone(), detected.1.kind()),
            };

            Some(DetectedApp {
                template: template.clone(),
                artifact_path,
                kind,
            })
        })
        .collect();

    found.sort_by(|a, b| a.template.name.cmp(&b.template.name));
    found
}

/// Snapshot template suggested for an artifact configured by hand.
///
/// Files get `{artifact_path}.{name}.switch`, folders a `profiles/` directory next
/// to them. When the kind is unknown, a base name containing a `.` means a file.
pub fn default_snapshot_template(artifact_path: &str, kind: Option<ArtifactKind>) -> String {
    let normalized = artifact_path.replace('\\', "/");
    let path = Path::new(&normalized);
    let is_file = match kind {
        Some(kind) => kind == ArtifactKind::File,
        None => path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().contains('.')),
    };

    if is_file {
        return FILE_SNAPSHOT_TEMPLATE.to_string();
    }

    match path.parent().map(|p| p.to_string_lossy().into_owned()) {
        Some(parent) if !parent.is_empty() => format!("{parent}/profiles/{{name}}.switch"),
        _ => "profiles/{name}.switch".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_names() {
        let names: Vec<_> = AppTemplate::builtin().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["codex", "claude", "vscode", "cursor", "ssh", "git"]);
    }

    #[test]
    fn test_find_template() {
        let templates = AppTemplate::builtin();
        assert_eq!(find_template(&templates, "git").unwrap().artifact_path, "~/.gitconfig");
        assert_eq!(find_template(&templates, "SSH").unwrap().name, "ssh");
        assert!(find_template(&templates, "emacs").is_none());
    }

    #[test]
    fn test_detect_applications() {
        let temp_dir = TempDir::new().unwrap();
        let paths = Paths::with_home(temp_dir.path());
        fs::write(temp_dir.path().join(".gitconfig"), "[user]").unwrap();
        fs::create_dir_all(temp_dir.path().join(".ssh")).unwrap();
        fs::create_dir_all(temp_dir.path().join("Library/Application Support/Code/User")).unwrap();

        let detected = detect_applications(&paths, &AppTemplate::builtin());
        let names: Vec<_> = detected.iter().map(|d| d.template.name.as_str()).collect();
        assert_eq!(names, vec!["git", "ssh", "vscode"]);

        let vscode = &detected[2];
        assert_eq!(vscode.artifact_path, "~/Library/Application Support/Code/User");
        assert_eq!(vscode.kind, ArtifactKind::Folder);
        assert_eq!(detected[0].kind, ArtifactKind::File);
    }

    #[test]
    fn test_default_snapshot_template() {
        assert_eq!(
            default_snapshot_template("~/.config/tool/auth.json", None),
            "{artifact_path}.{name}.switch"
        );
        assert_eq!(
            default_snapshot_template("~/.config/tool", None),
            "~/.config/profiles/{name}.switch"
        );
        assert_eq!(default_snapshot_template("settings", None), "profiles/{name}.switch");
        assert_eq!(
            default_snapshot_template("~/.ssh", Some(ArtifactKind::Folder)),
            "~/profiles/{name}.switch"
        );
        assert_eq!(
            default_snapshot_template("~/.netrc_work", Some(ArtifactKind::File)),
            "{artifact_path}.{name}.switch"
        );
    }
}
