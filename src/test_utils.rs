//! Test utilities shared across test modules
//!
//! Everything is rooted in a temporary directory that stands in for the home
//! directory, so `~/.codex/auth.json` resolves to `<temp>/.codex/auth.json`.

use std::fs;
use std::path::Path;

use crate::paths::Paths;
use crate::switch::Switcher;
use crate::templates::AppTemplate;
use tempfile::TempDir;

/// Create a Paths struct for testing with the temp dir as home
pub fn setup_test_paths(temp_dir: &TempDir) -> Paths {
    Paths::with_home(temp_dir.path())
}

/// A switcher over an empty registry, using the built-in templates
pub fn setup_switcher(temp_dir: &TempDir) -> Switcher {
    Switcher::open(setup_test_paths(temp_dir), AppTemplate::builtin()).unwrap()
}

/// Write a file, creating its parent directories
pub fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}
