//! Error taxonomy for the switching engine.
//!
//! Every engine operation returns a [`SwitchError`] naming the kind of failure
//! together with the application, profile or path involved, so the CLI layer
//! can turn it into an actionable message.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = SwitchError> = std::result::Result<T, E>;

/// Failure while copying an artifact from `src` to `dst`.
#[derive(Debug, Error)]
#[error("failed to copy {} to {}: {source}", src.display(), dst.display())]
pub struct CopyError {
    pub src: PathBuf,
    pub dst: PathBuf,
    #[source]
    pub source: io::Error,
}

impl CopyError {
    pub fn new(src: impl Into<PathBuf>, dst: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum SwitchError {
    #[error("no configuration or built-in template found for app '{app}'")]
    UnknownApplication { app: String },

    #[error("config path not found: {}", path.display())]
    ArtifactNotFound { path: PathBuf },

    #[error("profile '{profile}' not found for {app}")]
    ProfileNotFound { app: String, profile: String },

    #[error("snapshot for profile '{profile}' not found: {}", path.display())]
    SnapshotMissing { profile: String, path: PathBuf },

    #[error("invalid profile name '{name}': {reason}")]
    InvalidProfileName { name: String, reason: &'static str },

    #[error("cancelled by user")]
    Cancelled,

    #[error("failed to snapshot profile '{profile}'")]
    SnapshotFailure {
        profile: String,
        #[source]
        source: CopyError,
    },

    #[error("failed to switch to profile '{profile}'")]
    SwitchFailure {
        profile: String,
        #[source]
        source: CopyError,
    },

    #[error("failed to read config file {}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to write config file {}", path.display())]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no profiles configured for {app}")]
    NoAccountsConfigured { app: String },
}

impl SwitchError {
    /// Short hint the CLI prints below the error, if one applies.
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::UnknownApplication { .. } => {
                Some("Run 'switch add' to set up an application.".to_string())
            }
            Self::ProfileNotFound { app, .. } => {
                Some(format!("Use 'switch list {app}' to see available profiles."))
            }
            Self::NoAccountsConfigured { app } => Some(format!(
                "Run 'switch add {app} <name>' to add your first profile."
            )),
            Self::SnapshotMissing { .. } => {
                Some("Run 'switch doctor' to find profiles whose snapshots are gone.".to_string())
            }
            _ => None,
        }
    }
}
