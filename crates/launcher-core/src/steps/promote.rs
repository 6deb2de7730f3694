//! Atomic replacement of a version directory with rollback.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{LauncherError, Result};
use crate::paths::BACKUP_SUFFIX;

/// `versions/v1_0_0` becomes `versions/v1_0_0__bak`.
#[must_use]
pub fn backup_path(target_dir: &Path) -> PathBuf {
    let mut name: OsString = target_dir
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(BACKUP_SUFFIX);
    target_dir.with_file_name(name)
}

/// Move `staging_dir` into place as `target_dir`.
///
/// Steps:
/// 1. Remove a stale backup if one exists
/// 2. Move current target -> backup (rename)
/// 3. Move staging -> target (rename)
/// 4. Delete the backup
///
/// If step 3 fails the backup is renamed back so the previous install stays
/// usable.
pub fn promote(staging_dir: &Path, target_dir: &Path) -> Result<()> {
    if !staging_dir.is_dir() {
        return Err(LauncherError::PromoteFailed {
            reason: format!("staging not found: {}", staging_dir.display()),
            rolled_back: false,
        });
    }

    if let Some(parent) = target_dir.parent() {
        fs::create_dir_all(parent).map_err(|e| LauncherError::PromoteFailed {
            reason: format!("failed to create {}: {e}", parent.display()),
            rolled_back: false,
        })?;
    }

    let backup = backup_path(target_dir);
    if backup.exists() {
        warn!(path = %backup.display(), "Removing stale backup");
        let _ = fs::remove_dir_all(&backup);
    }

    let had_target = target_dir.exists();
    if had_target {
        fs::rename(target_dir, &backup).map_err(|e| LauncherError::PromoteFailed {
            reason: format!("failed to move current version aside: {e}"),
            rolled_back: false,
        })?;
        debug!(backup = %backup.display(), "Current version moved to backup");
    }

    if let Err(e) = fs::rename(staging_dir, target_dir) {
        warn!(error = %e, "Promote failed, rolling back");
        let rolled_back = had_target && rollback(&backup, target_dir);
        return Err(LauncherError::PromoteFailed {
            reason: format!("failed to move staging into place: {e}"),
            rolled_back,
        });
    }

    if had_target {
        if let Err(e) = fs::remove_dir_all(&backup) {
            warn!(path = %backup.display(), error = %e, "Failed to remove backup");
        }
    }

    info!(target = %target_dir.display(), "Promoted staged version");
    Ok(())
}

/// Restore `backup` as `target_dir`. Returns whether it worked.
fn rollback(backup: &Path, target_dir: &Path) -> bool {
    if target_dir.exists() {
        let _ = fs::remove_dir_all(target_dir);
    }

    match fs::rename(backup, target_dir) {
        Ok(()) => {
            info!(target = %target_dir.display(), "Rollback complete");
            true
        }
        Err(e) => {
            warn!(error = %e, "Install failed and rollback failed");
            false
        }
    }
}

/// Put back a backup left by a promote that was interrupted.
///
/// Applies only when `target_dir` is missing and its backup exists.
/// Returns whether anything was restored.
pub fn recover_interrupted(target_dir: &Path) -> Result<bool> {
    let backup = backup_path(target_dir);
    if target_dir.exists() || !backup.is_dir() {
        return Ok(false);
    }

    warn!(
        backup = %backup.display(),
        "Found backup without live version; restoring interrupted promote"
    );
    fs::rename(&backup, target_dir)?;
    Ok(true)
}

/// Best-effort removal of files and directories.
///
/// Returns the paths that could not be removed; callers only report them.
pub fn cleanup<P: AsRef<Path>>(paths: &[P]) -> Vec<PathBuf> {
    let mut leftovers = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let result = if path.is_dir() {
            fs::remove_dir_all(path)
        } else if path.is_file() {
            fs::remove_file(path)
        } else {
            continue;
        };

        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Cleanup failed");
            leftovers.push(path.to_path_buf());
        }
    }

    leftovers
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn populate(dir: &Path, file: &str, content: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(file), content).unwrap();
    }

    #[test]
    fn test_backup_path() {
        assert_eq!(
            backup_path(Path::new("/x/versions/v1_0_0")),
            PathBuf::from("/x/versions/v1_0_0__bak")
        );
    }

    #[test]
    fn test_promote_replaces_existing_target() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("versions/v1_1_0");
        let staging = dir.path().join("versions/_staging/p/v1_1_0");
        populate(&target, "a.txt", "A");
        populate(&staging, "b.txt", "B");

        promote(&staging, &target).unwrap();

        assert!(!target.join("a.txt").exists());
        assert_eq!(fs::read_to_string(target.join("b.txt")).unwrap(), "B");
        assert_eq!(fs::read_dir(&target).unwrap().count(), 1);
        assert!(!backup_path(&target).exists());
        assert!(!staging.exists());
    }

    #[test]
    fn test_promote_without_existing_target() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("versions/v1_1_0");
        let staging = dir.path().join("staging");
        populate(&staging, "b.txt", "B");

        promote(&staging, &target).unwrap();

        assert_eq!(fs::read_to_string(target.join("b.txt")).unwrap(), "B");
        assert!(!backup_path(&target).exists());
    }

    #[test]
    fn test_promote_removes_stale_backup() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("v2_0_0");
        let staging = dir.path().join("staging");
        populate(&backup_path(&target), "stale.txt", "old");
        populate(&staging, "new.txt", "new");

        promote(&staging, &target).unwrap();

        assert!(target.join("new.txt").exists());
        assert!(!backup_path(&target).exists());
    }

    #[test]
    fn test_promote_missing_staging() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("v1_0_0");
        populate(&target, "a.txt", "A");

        let result = promote(&dir.path().join("absent"), &target);
        assert!(matches!(result, Err(LauncherError::PromoteFailed { .. })));
        assert!(target.join("a.txt").exists());
    }

    #[test]
    fn test_promote_rolls_back_when_rename_fails() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("v1_0_0");
        populate(&target, "a.txt", "A");

        // Staging lives inside the target, so moving the target aside
        // makes the staging rename fail.
        let staging = target.join("nested_staging");
        populate(&staging, "b.txt", "B");

        let result = promote(&staging, &target);

        match result {
            Err(LauncherError::PromoteFailed { rolled_back, .. }) => assert!(rolled_back),
            other => panic!("expected PromoteFailed, got {other:?}"),
        }
        assert_eq!(fs::read_to_string(target.join("a.txt")).unwrap(), "A");
        assert!(!backup_path(&target).exists());
    }

    #[test]
    fn test_failed_first_install_reports_nothing_restored() {
        let dir = TempDir::new().unwrap();
        let staging = dir.path().join("staging");
        populate(&staging, "b.txt", "B");

        // A directory cannot be moved inside itself.
        let target = staging.join("v1_0_0");
        let result = promote(&staging, &target);

        match result {
            Err(LauncherError::PromoteFailed { rolled_back, .. }) => assert!(!rolled_back),
            other => panic!("expected PromoteFailed, got {other:?}"),
        }
        assert!(staging.join("b.txt").exists());
    }

    #[test]
    fn test_recover_interrupted() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("v1_0_0");
        populate(&backup_path(&target), "a.txt", "A");

        assert!(recover_interrupted(&target).unwrap());
        assert_eq!(fs::read_to_string(target.join("a.txt")).unwrap(), "A");
        assert!(!recover_interrupted(&target).unwrap());
    }

    #[test]
    fn test_cleanup_swallows_missing_paths() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("archive.zip");
        let tree = dir.path().join("staging");
        fs::write(&file, b"zip").unwrap();
        populate(&tree.join("deep"), "x", "y");

        let leftovers = cleanup(&[file.clone(), tree.clone(), dir.path().join("absent")]);

        assert!(leftovers.is_empty());
        assert!(!file.exists());
        assert!(!tree.exists());
    }
}
