//! Filesystem utility functions
//!
//! Copying of configuration artifacts (single files or whole folders), plus the
//! small helpers the engine needs around them.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::error::CopyError;
use crate::paths::nested_child;

const TEMP_SUFFIX: &str = ".switch-tmp";

/// Recursively calculate the total size of a directory in bytes
///
/// Symbolic links are not followed.
pub fn dir_size(path: &Path) -> io::Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if metadata.is_file() {
            total += metadata.len();
        } else if metadata.is_dir() {
            total += dir_size(&entry.path())?;
        }
    }
    Ok(total)
}

/// Size of a file, or of everything below a folder
pub fn artifact_size(path: &Path) -> io::Result<u64> {
    let metadata = fs::metadata(path)?;
    if metadata.is_dir() {
        dir_size(path)
    } else {
        Ok(metadata.len())
    }
}

/// Copy a file or folder to `dst`, overwriting what is there.
///
/// Folders are copied recursively, creating intermediate directories and keeping
/// each entry's permission bits. Entries already in `dst` that don't exist in
/// `src` are left alone; see [`mirror_path`] for the pruning variant.
///
/// When `dst` lies inside `src`, the child of `src` holding `dst` is skipped.
///
/// # Errors
/// Returns a [`CopyError`] if `src` is missing or unreadable, or if anything
/// under `dst` cannot be created or written. A folder copy that fails midway
/// may leave some entries copied.
pub fn copy_path(src: &Path, dst: &Path) -> Result<(), CopyError> {
    let metadata = fs::metadata(src).map_err(|e| CopyError::new(src, dst, e))?;
    if metadata.is_dir() {
        copy_dir(src, dst)
    } else {
        copy_file(src, dst)
    }
}

/// Like [`copy_path`], but afterwards removes entries of a destination folder
/// that have no counterpart in the source folder.
///
/// A snapshot store nested in `dst` (the child of `dst` containing `src`) is never pruned.
pub fn mirror_path(src: &Path, dst: &Path) -> Result<(), CopyError> {
    copy_path(src, dst)?;
    if fs::metadata(src).is_ok_and(|m| m.is_dir()) {
        prune_stale(src, dst)?;
    }
    Ok(())
}

/// Copy one file byte-for-byte.
///
/// The source is read completely before the destination is touched, and the new
/// content is written to a sibling temp file that is renamed over `dst`, so a
/// failure never leaves `dst` truncated.
pub fn copy_file(src: &Path, dst: &Path) -> Result<(), CopyError> {
    let err = |e: io::Error| CopyError::new(src, dst, e);

    let permissions = fs::metadata(src).map_err(err)?.permissions();
    let contents = fs::read(src).map_err(err)?;

    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(err)?;
    }

    write_atomic(dst, &contents, permissions).map_err(err)
}

fn copy_dir(src: &Path, dst: &Path) -> Result<(), CopyError> {
    let skip = nested_child(src, dst);

    // Walk the whole tree up front so an unreadable entry fails before anything is written
    let mut entries = Vec::new();
    for entry in WalkDir::new(src)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| Some(e.path()) != skip.as_deref())
    {
        entries.push(entry.map_err(|e| CopyError::new(src, dst, e.into()))?);
    }

    let mut dirs = Vec::new();
    for entry in &entries {
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            let err = |e: io::Error| CopyError::new(entry.path(), &target, e);
            fs::create_dir_all(&target).map_err(err)?;
            let permissions = entry.metadata().map_err(|e| err(e.into()))?.permissions();
            dirs.push((target, permissions));
        } else {
            copy_file(entry.path(), &target)?;
        }
    }

    // Deepest first, so read-only folders don't block writes into their children
    for (dir, permissions) in dirs.into_iter().rev() {
        fs::set_permissions(&dir, permissions).map_err(|e| CopyError::new(src, &dir, e))?;
    }

    Ok(())
}

fn prune_stale(src: &Path, dst: &Path) -> Result<(), CopyError> {
    let keep = nested_child(dst, src);
    let mut stale = Vec::new();

    let mut walker = WalkDir::new(dst)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| Some(e.path()) != keep.as_deref());

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| CopyError::new(src, dst, e.into()))?;
        let Ok(rel) = entry.path().strip_prefix(dst) else {
            continue;
        };
        if fs::symlink_metadata(src.join(rel)).is_err() {
            stale.push(entry.path().to_path_buf());
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
        }
    }

    for path in stale {
        remove_path(&path).map_err(|e| CopyError::new(src, &path, e))?;
    }
    Ok(())
}

/// Remove a file, symlink or whole folder
pub fn remove_path(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Where a write to `path` lands: through a symlink onto its target, so the link survives
fn write_target(path: &Path) -> PathBuf {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.file_type().is_symlink() => {
            fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}

/// Empty owner-only (0600 on unix) temp file in `dir`
fn create_temp(dir: &Path, name: &str) -> io::Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)
}

/// Write `contents` to a temp file next to `path` and rename it into place.
///
/// The temp file is created owner-only and gets `permissions` before the rename.
fn write_atomic(path: &Path, contents: &[u8], permissions: fs::Permissions) -> io::Result<()> {
    let target = write_target(path);
    let dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut temp = create_temp(dir, &name)?;
    temp.write_all(contents)?;
    temp.as_file().set_permissions(permissions)?;
    temp.persist(&target).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn assert_no_temp_files(dir: &Path) {
        for entry in fs::read_dir(dir).unwrap() {
            let name = entry.unwrap().file_name();
            assert!(!name.to_string_lossy().ends_with(TEMP_SUFFIX), "leftover {name:?}");
        }
    }

    #[test]
    fn test_copy_file_creates_parents() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("auth.json");
        let dst = temp_dir.path().join("deep/nested/auth.json.work.switch");
        fs::write(&src, r#"{"token":"a"}"#).unwrap();

        copy_path(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(&dst).unwrap(), r#"{"token":"a"}"#);
        assert_no_temp_files(dst.parent().unwrap());
    }

    #[test]
    fn test_copy_file_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("a");
        let dst = temp_dir.path().join("b");
        fs::write(&src, "new").unwrap();
        fs::write(&dst, "old content that is longer").unwrap();

        copy_path(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(&dst).unwrap(), "new");
    }

    #[test]
    fn test_copy_folder_recursive() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("User");
        fs::create_dir_all(src.join("snippets")).unwrap();
        fs::write(src.join("settings.json"), "{}").unwrap();
        fs::write(src.join("snippets/rust.json"), "[]").unwrap();

        let dst = temp_dir.path().join("profiles/work.switch");
        copy_path(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("settings.json")).unwrap(), "{}");
        assert_eq!(fs::read_to_string(dst.join("snippets/rust.json")).unwrap(), "[]");
    }

    #[test]
    fn test_copy_missing_source_fails() {
        let temp_dir = TempDir::new().unwrap();
        let dst = temp_dir.path().join("dst");
        fs::write(&dst, "keep me").unwrap();

        let err = copy_path(&temp_dir.path().join("missing"), &dst).unwrap_err();
        assert_eq!(err.source.kind(), io::ErrorKind::NotFound);
        assert_eq!(fs::read_to_string(&dst).unwrap(), "keep me");
    }

    #[test]
    fn test_copy_destination_parent_is_file() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::write(&src, "data").unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        assert!(copy_path(&src, &blocker.join("dst")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("keys");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("id_ed25519"), "secret").unwrap();
        fs::set_permissions(src.join("id_ed25519"), fs::Permissions::from_mode(0o600)).unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o700)).unwrap();

        let dst = temp_dir.path().join("copy");
        copy_path(&src, &dst).unwrap();

        let file_mode = fs::metadata(dst.join("id_ed25519")).unwrap().permissions().mode();
        let dir_mode = fs::metadata(&dst).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600);
        assert_eq!(dir_mode & 0o777, 0o700);
    }

    #[test]
    fn test_copy_keeps_stale_children_but_mirror_prunes() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(dst.join("old_dir")).unwrap();
        fs::write(src.join("keep.txt"), "1").unwrap();
        fs::write(dst.join("stale.txt"), "x").unwrap();
        fs::write(dst.join("old_dir/inner.txt"), "x").unwrap();

        copy_path(&src, &dst).unwrap();
        assert!(dst.join("stale.txt").exists());

        mirror_path(&src, &dst).unwrap();
        assert!(dst.join("keep.txt").exists());
        assert!(!dst.join("stale.txt").exists());
        assert!(!dst.join("old_dir").exists());
    }

    #[test]
    fn test_nested_snapshot_store_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let live = temp_dir.path().join(".ssh");
        fs::create_dir_all(&live).unwrap();
        fs::write(live.join("config"), "Host a").unwrap();

        let snapshot = live.join("profiles/work.switch");
        copy_path(&live, &snapshot).unwrap();
        assert_eq!(fs::read_to_string(snapshot.join("config")).unwrap(), "Host a");
        assert!(!snapshot.join("profiles").exists());

        // Installing the snapshot back must not prune the store it lives in
        fs::write(live.join("extra"), "x").unwrap();
        mirror_path(&snapshot, &live).unwrap();
        assert!(!live.join("extra").exists());
        assert!(snapshot.join("config").exists());
    }

    #[test]
    fn test_remove_path() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("d");
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("sub/f"), "x").unwrap();
        let file = temp_dir.path().join("f");
        fs::write(&file, "x").unwrap();

        remove_path(&dir).unwrap();
        remove_path(&file).unwrap();
        assert!(!dir.exists());
        assert!(!file.exists());
    }

    #[test]
    fn test_artifact_size() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a"), "12345").unwrap();
        fs::create_dir_all(temp_dir.path().join("sub")).unwrap();
        fs::write(temp_dir.path().join("sub/b"), "123").unwrap();

        assert_eq!(artifact_size(&temp_dir.path().join("a")).unwrap(), 5);
        assert_eq!(artifact_size(temp_dir.path()).unwrap(), 8);
    }

    #[cfg(unix)]
    #[test]
    fn test_temp_file_is_private_until_renamed() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let temp = create_temp(temp_dir.path(), "id_ed25519").unwrap();

        let mode = temp.as_file().metadata().unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
        assert!(temp.path().to_string_lossy().ends_with(TEMP_SUFFIX));
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_file_widens_to_source_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("config");
        fs::write(&src, "Host *").unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o644)).unwrap();

        let dst = temp_dir.path().join("config.work.switch");
        copy_path(&src, &dst).unwrap();

        let mode = fs::metadata(&dst).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_file_writes_through_symlink() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("dotfiles/gitconfig");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, "[user] old").unwrap();
        let link = temp_dir.path().join(".gitconfig");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let src = temp_dir.path().join("snapshot");
        fs::write(&src, "[user] new").unwrap();
        copy_path(&src, &link).unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&target).unwrap(), "[user] new");
        assert_no_temp_files(target.parent().unwrap());
        assert_no_temp_files(temp_dir.path());
    }
}
