use anyhow::{Result, bail};
use directories::BaseDirs;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the registry file inside the home directory
pub const CONFIG_FILE_NAME: &str = ".switch.toml";

const ARTIFACT_PLACEHOLDER: &str = "{artifact_path}";
/// Older configs spell the artifact placeholder this way
const LEGACY_ARTIFACT_PLACEHOLDER: &str = "{auth_path}";
const NAME_PLACEHOLDER: &str = "{name}";

/// All computed paths used by switch
#[derive(Debug, Clone)]
pub struct Paths {
    /// The user's home directory, `None` when it cannot be determined
    pub home_dir: Option<PathBuf>,
    /// ~/.switch.toml, or the `--config` override
    pub config_file: PathBuf,
}

impl Paths {
    /// Resolve paths from the environment.
    ///
    /// The home directory is only mandatory when no explicit config file is given.
    pub fn new(config_override: Option<PathBuf>) -> Result<Self> {
        let home_dir = BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());

        let config_file = match (config_override, &home_dir) {
            (Some(path), _) => path,
            (None, Some(home)) => home.join(CONFIG_FILE_NAME),
            (None, None) => bail!(
                "Failed to determine home directory.\nHint: pass --config <PATH> or set SWITCH_CONFIG."
            ),
        };

        Ok(Self {
            home_dir,
            config_file,
        })
    }

    /// Paths rooted at an explicit home directory
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            config_file: home.join(CONFIG_FILE_NAME),
            home_dir: Some(home),
        }
    }

    fn home_str(&self) -> Option<String> {
        self.home_dir
            .as_ref()
            .map(|home| home.to_string_lossy().replace('\\', "/"))
    }

    /// Expand a leading `~` and normalize the path to forward slashes.
    ///
    /// `~` and `~/...` (or `~\...`) are replaced with the home directory; other
    /// forms such as `~user` are left alone. Redundant `.`/`..` segments are
    /// cleaned lexically. When the home directory is unknown the tilde is kept.
    pub fn expand(&self, path: &str) -> String {
        if path.is_empty() {
            return String::new();
        }

        let path = path.replace('\\', "/");
        let cleaned = clean(&self.expand_tilde(&path).unwrap_or(path));

        // Cleaning can surface a leading `~` (`x/../~/a`)
        match self.expand_tilde(&cleaned) {
            Some(expanded) => clean(&expanded),
            None => cleaned,
        }
    }

    fn expand_tilde(&self, path: &str) -> Option<String> {
        let home = self.home_str()?;
        match path.strip_prefix('~')? {
            "" => Some(home),
            rest if rest.starts_with('/') => Some(format!("{home}{rest}")),
            _ => None,
        }
    }

    /// [`Paths::expand`] returning a `PathBuf`
    pub fn expand_path(&self, path: &str) -> PathBuf {
        PathBuf::from(self.expand(path))
    }

    /// Materialize a snapshot template for one profile.
    ///
    /// Substitution is literal: `{artifact_path}` (or `{auth_path}`) becomes
    /// `artifact_path`, `{name}` becomes `name`, then the result is expanded.
    pub fn resolve_template(&self, template: &str, artifact_path: &str, name: &str) -> String {
        let resolved = template
            .replace(ARTIFACT_PLACEHOLDER, artifact_path)
            .replace(LEGACY_ARTIFACT_PLACEHOLDER, artifact_path)
            .replace(NAME_PLACEHOLDER, name);
        self.expand(&resolved)
    }
}

/// Lexically clean a slash-separated path.
fn clean(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(last) if *last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Whether an artifact is a single file or a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    File,
    Folder,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => f.write_str("File"),
            Self::Folder => f.write_str("Folder"),
        }
    }
}

/// An on-disk configuration artifact, tagged by kind when it is probed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    File(PathBuf),
    Directory(PathBuf),
}

impl Artifact {
    /// Look at `path` on disk. Returns `None` if it does not exist or cannot be stat'ed.
    pub fn probe(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let meta = fs::metadata(&path).ok()?;
        if meta.is_dir() {
            Some(Self::Directory(path))
        } else {
            Some(Self::File(path))
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::File(path) | Self::Directory(path) => path,
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::File(_) => ArtifactKind::File,
            Self::Directory(_) => ArtifactKind::Folder,
        }
    }
}

/// If `inner` lies strictly inside `outer`, the direct child of `outer` that contains it.
///
/// Used to keep snapshot stores that live inside a live folder out of copies and comparisons.
pub fn nested_child(outer: &Path, inner: &Path) -> Option<PathBuf> {
    let rest = inner.strip_prefix(outer).ok()?;
    let first = rest.components().next()?;
    Some(outer.join(first))
}
