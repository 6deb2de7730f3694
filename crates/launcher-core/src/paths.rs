//! On-disk layout of the launcher.
//!
//! ```text
//! <base>/data/current.json
//! <base>/data/app.json
//! <base>/data/launcher.json
//! <base>/data/notice_ack.json
//! <base>/versions/v<major>_<minor>_<patch>/...
//! <base>/versions/_staging/<program_id>/v<ver>/...
//! <base>/downloads_tmp/<program_id>_<version>.zip
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LauncherError, Result};
use crate::version::SemVer;

/// Name of the scratch area under `versions/`.
pub const STAGING_DIR_NAME: &str = "_staging";

/// Suffix of the backup directory used while promoting.
pub const BACKUP_SUFFIX: &str = "__bak";

/// How the launcher finds its base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseDirStrategy {
    /// Directory containing the running executable.
    Packaged,
    /// Current working directory, for running from a source checkout.
    Source,
    /// A directory chosen by the caller.
    Explicit(PathBuf),
}

impl BaseDirStrategy {
    /// Release builds are packaged; debug builds run from source.
    #[must_use]
    pub fn detect() -> Self {
        if cfg!(debug_assertions) {
            Self::Source
        } else {
            Self::Packaged
        }
    }

    /// Resolve the base directory.
    pub fn resolve(&self) -> Result<PathBuf> {
        match self {
            Self::Packaged => {
                let exe = std::env::current_exe()?;
                exe.parent().map(Path::to_path_buf).ok_or_else(|| {
                    LauncherError::Io(format!("executable has no parent: {}", exe.display()))
                })
            }
            Self::Source => Ok(std::env::current_dir()?),
            Self::Explicit(dir) => Ok(dir.clone()),
        }
    }
}

/// Every path the launcher reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherPaths {
    /// Root of the installation.
    pub base_dir: PathBuf,
    /// `data/`, holding the JSON records.
    pub data_dir: PathBuf,
    /// `versions/`, holding one directory per installed version.
    pub versions_dir: PathBuf,
    /// `data/current.json`.
    pub current_json: PathBuf,
}

impl LauncherPaths {
    /// Lay out paths under `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let data_dir = base_dir.join("data");
        let versions_dir = base_dir.join("versions");
        let current_json = data_dir.join("current.json");
        Self {
            base_dir,
            data_dir,
            versions_dir,
            current_json,
        }
    }

    /// Resolve the base directory with `strategy` and lay out paths under it.
    pub fn from_strategy(strategy: &BaseDirStrategy) -> Result<Self> {
        Ok(Self::new(strategy.resolve()?))
    }

    /// Create `data/` and `versions/` if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        fs::create_dir_all(&self.versions_dir)?;
        Ok(())
    }

    /// `downloads_tmp/`.
    #[must_use]
    pub fn downloads_dir(&self) -> PathBuf {
        self.base_dir.join("downloads_tmp")
    }

    /// Archive path for a program version, e.g. `downloads_tmp/my_program_1.1.0.zip`.
    #[must_use]
    pub fn download_path(&self, program_id: &str, version: &str, extension: &str) -> PathBuf {
        self.downloads_dir()
            .join(format!("{program_id}_{version}.{extension}"))
    }

    /// `versions/_staging/`.
    #[must_use]
    pub fn staging_root(&self) -> PathBuf {
        self.versions_dir.join(STAGING_DIR_NAME)
    }

    /// `versions/_staging/<program_id>/<dirname>`.
    #[must_use]
    pub fn staging_dir(&self, program_id: &str, dirname: &str) -> PathBuf {
        self.staging_root().join(program_id).join(dirname)
    }

    /// `versions/<dirname>`.
    #[must_use]
    pub fn version_dir(&self, dirname: &str) -> PathBuf {
        self.versions_dir.join(dirname)
    }

    /// `data/notice_ack.json`.
    #[must_use]
    pub fn notice_ack_json(&self) -> PathBuf {
        self.data_dir.join("notice_ack.json")
    }

    /// `data/app.json`.
    #[must_use]
    pub fn app_json(&self) -> PathBuf {
        self.data_dir.join("app.json")
    }

    /// `data/launcher.json`.
    #[must_use]
    pub fn settings_json(&self) -> PathBuf {
        self.data_dir.join("launcher.json")
    }

    /// Installed version directory names, oldest first.
    ///
    /// Scratch and backup directories are skipped.
    pub fn installed_versions(&self) -> Result<Vec<String>> {
        if !self.versions_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = fs::read_dir(&self.versions_dir)?
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| {
                name.starts_with('v') && name != STAGING_DIR_NAME && !name.ends_with(BACKUP_SUFFIX)
            })
            .collect();

        names.sort_by_key(|name| (dirname_to_semver(name), name.clone()));
        Ok(names)
    }
}

/// Parse `v1_2_3` back into a version. Unparseable names sort first.
fn dirname_to_semver(name: &str) -> Option<SemVer> {
    SemVer::parse(&name.replace('_', ".")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout() {
        let paths = LauncherPaths::new("/opt/app");
        assert_eq!(paths.current_json, PathBuf::from("/opt/app/data/current.json"));
        assert_eq!(
            paths.download_path("my_program", "1.1.0", "zip"),
            PathBuf::from("/opt/app/downloads_tmp/my_program_1.1.0.zip")
        );
        assert_eq!(
            paths.staging_dir("my_program", "v1_1_0"),
            PathBuf::from("/opt/app/versions/_staging/my_program/v1_1_0")
        );
        assert_eq!(
            paths.version_dir("v1_1_0"),
            PathBuf::from("/opt/app/versions/v1_1_0")
        );
    }

    #[test]
    fn test_explicit_strategy() {
        let strategy = BaseDirStrategy::Explicit(PathBuf::from("/srv/launcher"));
        let paths = LauncherPaths::from_strategy(&strategy).unwrap();
        assert_eq!(paths.base_dir, PathBuf::from("/srv/launcher"));
    }

    #[test]
    fn test_packaged_strategy_uses_exe_parent() {
        let dir = BaseDirStrategy::Packaged.resolve().unwrap();
        let exe = std::env::current_exe().unwrap();
        assert_eq!(Some(dir.as_path()), exe.parent());
    }

    #[test]
    fn test_ensure_dirs() {
        let tmp = TempDir::new().unwrap();
        let paths = LauncherPaths::new(tmp.path());
        paths.ensure_dirs().unwrap();
        assert!(paths.data_dir.is_dir());
        assert!(paths.versions_dir.is_dir());
    }

    #[test]
    fn test_installed_versions_sorted_and_filtered() {
        let tmp = TempDir::new().unwrap();
        let paths = LauncherPaths::new(tmp.path());
        for name in ["v1_10_0", "v1_9_0", "_staging", "v1_9_0__bak", "other"] {
            fs::create_dir_all(paths.versions_dir.join(name)).unwrap();
        }
        fs::write(paths.versions_dir.join("v9_9_9"), b"not a dir").unwrap();

        assert_eq!(paths.installed_versions().unwrap(), vec!["v1_9_0", "v1_10_0"]);
    }

    #[test]
    fn test_installed_versions_without_versions_dir() {
        let tmp = TempDir::new().unwrap();
        let paths = LauncherPaths::new(tmp.path().join("missing"));
        assert!(paths.installed_versions().unwrap().is_empty());
    }
}
