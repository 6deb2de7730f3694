//! Launcher configuration.
//!
//! Nothing here is global: callers build a [`LauncherContext`] once and pass
//! it to the orchestrator and worker.

use std::fs;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LauncherError, Result};
use crate::paths::LauncherPaths;

/// Executable searched for inside each version directory.
pub const DEFAULT_EXE_NAME: &str = "CrawlProgram.exe";

/// Tunables read from `data/launcher.json`. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherSettings {
    /// File name of the program executable.
    pub exe_name: String,
    /// Timeout for the latest-version request, in seconds.
    pub latest_timeout_secs: u64,
    /// Timeout for the notice request, in seconds.
    pub notice_timeout_secs: u64,
    /// Timeout for probing the asset URL, in seconds.
    pub probe_timeout_secs: u64,
    /// Per-operation timeout while downloading, in seconds.
    pub download_timeout_secs: u64,
    /// Verify the archive when the server publishes a sha256 digest.
    pub verify_checksum: bool,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            exe_name: DEFAULT_EXE_NAME.to_string(),
            latest_timeout_secs: 10,
            notice_timeout_secs: 5,
            probe_timeout_secs: 15,
            download_timeout_secs: 60,
            verify_checksum: true,
        }
    }
}

impl LauncherSettings {
    /// Load settings from `path`, falling back to defaults when it is absent.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| LauncherError::Config(format!("{}: {e}", path.display())))
    }

    /// Timeout for the latest-version request.
    #[must_use]
    pub fn latest_timeout(&self) -> Duration {
        Duration::from_secs(self.latest_timeout_secs)
    }

    /// Timeout for the notice request.
    #[must_use]
    pub fn notice_timeout(&self) -> Duration {
        Duration::from_secs(self.notice_timeout_secs)
    }

    /// Timeout for the asset probe.
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Timeout for download operations.
    #[must_use]
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

/// Support links shown next to update errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportConfig {
    /// Product home page.
    pub site_url: String,
    /// Questions and answers page.
    pub qna_url: String,
}

impl SupportConfig {
    /// Read `support{site_url, qna_url}` from `data/app.json`.
    ///
    /// Returns `None` if the file is missing or malformed, or if either URL is
    /// absent or blank.
    #[must_use]
    pub fn load(path: &std::path::Path) -> Option<Self> {
        let text = fs::read_to_string(path).ok()?;
        let value: Value = serde_json::from_str(&text).ok()?;
        let support = value.get("support")?;

        let url = |key: &str| {
            support
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            site_url: url("site_url")?,
            qna_url: url("qna_url")?,
        })
    }
}

/// Everything an update run needs, built once at startup.
#[derive(Debug, Clone)]
pub struct LauncherContext {
    /// Directory layout.
    pub paths: LauncherPaths,
    /// Tunables.
    pub settings: LauncherSettings,
}

impl LauncherContext {
    /// Builds a context from explicit parts.
    #[must_use]
    pub fn new(paths: LauncherPaths, settings: LauncherSettings) -> Self {
        Self { paths, settings }
    }

    /// Builds a context, reading settings from `data/launcher.json`.
    pub fn load(paths: LauncherPaths) -> Result<Self> {
        let settings = LauncherSettings::load(&paths.settings_json())?;
        Ok(Self { paths, settings })
    }

    /// Support links from `data/app.json`, if configured.
    #[must_use]
    pub fn support(&self) -> Option<SupportConfig> {
        SupportConfig::load(&self.paths.app_json())
    }
}
