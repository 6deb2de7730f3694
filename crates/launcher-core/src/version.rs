//! Semantic version parsing and update-direction decisions.
//!
//! Versions are strict `major.minor.patch` triples. An optional leading
//! `v`/`V` is accepted so release tags and state records compare equally.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{LauncherError, Result};

/// A `major.minor.patch` version, ordered by tuple comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemVer {
    /// Major version number.
    pub major: u64,
    /// Minor version number.
    pub minor: u64,
    /// Patch version number.
    pub patch: u64,
}

impl SemVer {
    /// Creates a version from its components.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version string such as `1.2.3` or `v1.2.3`.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(LauncherError::InvalidVersion("version is empty".to_string()));
        }

        let body = trimmed
            .strip_prefix(['v', 'V'])
            .unwrap_or(trimmed)
            .trim();

        let parts: Vec<&str> = body.split('.').collect();
        if parts.len() != 3 {
            return Err(LauncherError::InvalidVersion(format!(
                "expected major.minor.patch: {s}"
            )));
        }

        let component = |part: &str| -> Result<u64> {
            let part = part.trim();
            if part.starts_with('-') {
                return Err(LauncherError::InvalidVersion(format!(
                    "negative component: {s}"
                )));
            }
            part.parse::<u64>().map_err(|_| {
                LauncherError::InvalidVersion(format!("non-integer component: {s}"))
            })
        };

        Ok(Self {
            major: component(parts[0])?,
            minor: component(parts[1])?,
            patch: component(parts[2])?,
        })
    }
}

impl FromStr for SemVer {
    type Err = LauncherError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Parse a version string. See [`SemVer::parse`].
pub fn parse(v: &str) -> Result<SemVer> {
    SemVer::parse(v)
}

/// Compare the local version against the remote one.
///
/// `Less` means the remote is newer and an update is needed.
pub fn compare(local: &str, remote: &str) -> Result<Ordering> {
    let local = SemVer::parse(local)?;
    let remote = SemVer::parse(remote)?;
    Ok(local.cmp(&remote))
}

/// What the launcher should do after comparing versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDirection {
    /// The server has a newer version.
    UpdateRequired,
    /// Local and server versions are the same.
    UpToDate,
    /// The server is behind the local install. Never downgrade.
    LocalNewer,
}

impl From<Ordering> for UpdateDirection {
    fn from(ordering: Ordering) -> Self {
        match ordering {
            Ordering::Less => Self::UpdateRequired,
            Ordering::Equal => Self::UpToDate,
            Ordering::Greater => Self::LocalNewer,
        }
    }
}

/// Normalize a version into its install directory name.
///
/// `1.0.1` becomes `v1_0_1`; an existing `v` prefix is kept.
pub fn version_to_dirname(version: &str) -> Result<String> {
    let trimmed = version.trim();
    if trimmed.is_empty() {
        return Err(LauncherError::InvalidVersion("version is empty".to_string()));
    }
    let name = trimmed.replace('.', "_");
    if name.starts_with('v') {
        Ok(name)
    } else {
        Ok(format!("v{name}"))
    }
}
