//! Error types for the launcher.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while checking, installing or launching a version.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LauncherError {
    /// The persisted state file does not exist.
    #[error("state file not found: {}", .0.display())]
    StateNotFound(PathBuf),

    /// The persisted state file is not valid JSON or lacks a required field.
    #[error("invalid state file: {0}")]
    StateInvalid(String),

    /// The update server could not be reached or answered with an error status.
    #[error("update server unreachable: {0}")]
    RemoteUnreachable(String),

    /// The update server answered with a body that fails validation.
    #[error("invalid server response: {0}")]
    InvalidResponse(String),

    /// The latest release has no downloadable asset.
    #[error("latest release has no asset url")]
    AssetMissing,

    /// The asset URL could not be probed. Diagnostic only.
    #[error("asset probe failed: {0}")]
    ProbeFailed(String),

    /// Downloading the asset failed.
    #[error("download failed: {0}")]
    DownloadFailed(String),

    /// The archive to unpack does not exist.
    #[error("archive not found: {}", .0.display())]
    ArchiveNotFound(PathBuf),

    /// The archive could not be extracted.
    #[error("unpack failed: {0}")]
    UnpackFailed(String),

    /// The release archive does not contain the expected executable.
    #[error("executable '{exe_name}' not found in package at {}", .dir.display())]
    ExeNotFoundInPackage {
        /// File name that was searched for.
        exe_name: String,
        /// Directory that was searched.
        dir: PathBuf,
    },

    /// Promoting the staged version into place failed.
    #[error("promote failed: {reason} (previous version restored: {rolled_back})")]
    PromoteFailed {
        /// Underlying failure.
        reason: String,
        /// Whether the previous install was moved back into place.
        rolled_back: bool,
    },

    /// The installed version has no executable on disk.
    #[error("executable '{exe_name}' not found locally at {}", .dir.display())]
    ExeNotFoundLocally {
        /// File name that was searched for.
        exe_name: String,
        /// Directory that was searched.
        dir: PathBuf,
    },

    /// A version string is not `major.minor.patch`.
    #[error("invalid version format: {0}")]
    InvalidVersion(String),

    /// The downloaded archive does not match the published digest.
    #[error("checksum verification failed: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Digest published by the server.
        expected: String,
        /// Digest of the downloaded file.
        actual: String,
    },

    /// The executable could not be started.
    #[error("failed to launch: {0}")]
    LaunchFailed(String),

    /// An update run is already in flight.
    #[error("an update run is already in progress")]
    Busy,

    /// A configuration file could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(String),

    /// A panic or other unexpected failure inside the update run.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl LauncherError {
    /// Returns a user-friendly error message suitable for display.
    #[must_use]
    pub fn user_message(&self) -> &str {
        match self {
            Self::StateNotFound(_) | Self::StateInvalid(_) => {
                "The installation record is missing or damaged. Please reinstall the program."
            }
            Self::RemoteUnreachable(_) => {
                "Could not reach the update server. Please check your internet connection."
            }
            Self::InvalidResponse(_) | Self::AssetMissing => {
                "The update server returned an unexpected answer. Please try again later."
            }
            Self::ProbeFailed(_) | Self::DownloadFailed(_) => {
                "The update could not be downloaded. Please try again."
            }
            Self::ChecksumMismatch { .. } => {
                "Security verification failed. The download may have been tampered with."
            }
            Self::ArchiveNotFound(_) | Self::UnpackFailed(_) => {
                "Could not extract the update package."
            }
            Self::ExeNotFoundInPackage { .. } => "The update package is incomplete.",
            Self::PromoteFailed { .. } => "Could not install the update. Please try again.",
            Self::ExeNotFoundLocally { .. } => {
                "The installed program could not be found. Please reinstall the program."
            }
            Self::LaunchFailed(_) => "The program could not be started.",
            Self::Busy => "An update is already running.",
            Self::InvalidVersion(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Unexpected(_) => "An unexpected error occurred.",
        }
    }

    /// Returns whether this error is potentially recoverable with a retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnreachable(_)
                | Self::ProbeFailed(_)
                | Self::DownloadFailed(_)
                | Self::PromoteFailed { .. }
                | Self::Busy
                | Self::Io(_)
        )
    }

    /// Returns whether this error stops an update run.
    ///
    /// Only probe failures are reported and then ignored.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::ProbeFailed(_))
    }
}

impl From<reqwest::Error> for LauncherError {
    fn from(err: reqwest::Error) -> Self {
        Self::RemoteUnreachable(err.to_string())
    }
}

impl From<std::io::Error> for LauncherError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for LauncherError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<zip::result::ZipError> for LauncherError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::UnpackFailed(err.to_string())
    }
}

/// Result type alias for launcher operations.
pub type Result<T> = std::result::Result<T, LauncherError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        let err = LauncherError::RemoteUnreachable("connection refused".to_string());
        assert!(err.user_message().contains("internet connection"));

        let err = LauncherError::ChecksumMismatch {
            expected: "abc".to_string(),
            actual: "def".to_string(),
        };
        assert!(err.user_message().contains("Security verification failed"));

        let err = LauncherError::ExeNotFoundInPackage {
            exe_name: "CrawlProgram.exe".to_string(),
            dir: PathBuf::from("versions/v1_0_0"),
        };
        assert!(err.user_message().contains("incomplete"));
    }

    #[test]
    fn test_retryable() {
        assert!(LauncherError::RemoteUnreachable("timeout".to_string()).is_retryable());
        assert!(LauncherError::DownloadFailed("reset".to_string()).is_retryable());
        assert!(!LauncherError::StateInvalid("missing".to_string()).is_retryable());
        assert!(
            !LauncherError::ChecksumMismatch {
                expected: "a".to_string(),
                actual: "b".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_only_probe_failure_is_non_fatal() {
        assert!(!LauncherError::ProbeFailed("405".to_string()).is_fatal());
        assert!(LauncherError::AssetMissing.is_fatal());
        assert!(LauncherError::DownloadFailed("x".to_string()).is_fatal());
    }

    #[test]
    fn test_display_includes_paths() {
        let err = LauncherError::StateNotFound(PathBuf::from("data/current.json"));
        assert_eq!(err.to_string(), "state file not found: data/current.json");

        let err = LauncherError::PromoteFailed {
            reason: "access denied".to_string(),
            rolled_back: true,
        };
        assert!(err.to_string().contains("restored: true"));
    }
}
