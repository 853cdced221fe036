//! Content comparison between a live artifact and a snapshot.
//!
//! Files that both parse as JSON objects are compared structurally (key order and
//! whitespace don't matter); anything else is compared byte-for-byte. Folders are
//! compared recursively by default.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::paths::nested_child;

/// How two folders are judged equal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DirectoryCompare {
    /// Equal when both exist as folders, contents are not looked at
    Shallow,
    /// Same relative entries, and every file pair equal under the file rule
    #[default]
    Recursive,
}

/// Whether `a` and `b` hold the same content.
///
/// Returns `false` when either path is missing or unreadable, or when one is a
/// folder and the other a file. Symmetric in its arguments.
pub fn content_equal(a: &Path, b: &Path, mode: DirectoryCompare) -> bool {
    let (Ok(meta_a), Ok(meta_b)) = (fs::metadata(a), fs::metadata(b)) else {
        return false;
    };

    match (meta_a.is_dir(), meta_b.is_dir()) {
        (true, true) => match mode {
            DirectoryCompare::Shallow => true,
            DirectoryCompare::Recursive => dir_equal(a, b),
        },
        (false, false) => file_equal(a, b),
        _ => false,
    }
}

/// Compare two files, structurally when both are JSON objects
pub fn file_equal(a: &Path, b: &Path) -> bool {
    let (Ok(data_a), Ok(data_b)) = (fs::read(a), fs::read(b)) else {
        return false;
    };

    match (parse_object(&data_a), parse_object(&data_b)) {
        (Some(obj_a), Some(obj_b)) => obj_a == obj_b,
        _ => data_a == data_b,
    }
}

fn parse_object(data: &[u8]) -> Option<Map<String, Value>> {
    serde_json::from_slice(data).ok()
}

/// Entry kinds below a folder, keyed by relative path
fn tree(root: &Path, skip: Option<&Path>) -> Option<BTreeMap<PathBuf, bool>> {
    let mut entries = BTreeMap::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| Some(e.path()) != skip)
    {
        let entry = entry.ok()?;
        let rel = entry.path().strip_prefix(root).ok()?.to_path_buf();
        entries.insert(rel, entry.file_type().is_dir());
    }
    Some(entries)
}

fn dir_equal(a: &Path, b: &Path) -> bool {
    // A snapshot stored inside the live folder is not part of the live content
    let skip_a = nested_child(a, b);
    let skip_b = nested_child(b, a);

    let (Some(tree_a), Some(tree_b)) = (tree(a, skip_a.as_deref()), tree(b, skip_b.as_deref()))
    else {
        return false;
    };

    tree_a == tree_b
        && tree_a
            .iter()
            .filter(|(_, is_dir)| !**is_dir)
            .all(|(rel, _)| file_equal(&a.join(rel), &b.join(rel)))
}
