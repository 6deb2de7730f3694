//! Persisted record of the installed program version.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LauncherError, Result};

/// Identity of the installed program, stored in `data/current.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentState {
    /// Installed version, `major.minor.patch`.
    pub version: String,
    /// Program identifier used in server URLs.
    pub program_id: String,
    /// Base URL of the update server.
    pub server_url: String,
}

impl CurrentState {
    /// Returns a copy of this state pointing at another version.
    #[must_use]
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..self.clone()
        }
    }
}

/// Read the state file.
///
/// A missing file is [`LauncherError::StateNotFound`]. Text that is not UTF-8,
/// unparseable JSON or a missing, non-string or blank field is
/// [`LauncherError::StateInvalid`].
pub fn read(path: &Path) -> Result<CurrentState> {
    if !path.exists() {
        return Err(LauncherError::StateNotFound(path.to_path_buf()));
    }

    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::InvalidData => {
            LauncherError::StateInvalid(format!("{}: {e}", path.display()))
        }
        _ => LauncherError::from(e),
    })?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| LauncherError::StateInvalid(format!("{}: {e}", path.display())))?;

    let field = |key: &str| -> Result<String> {
        match value.get(key).and_then(Value::as_str).map(str::trim) {
            Some(s) if !s.is_empty() => Ok(s.to_string()),
            _ => Err(LauncherError::StateInvalid(format!(
                "\"{key}\" is required (non-empty string)"
            ))),
        }
    };

    Ok(CurrentState {
        program_id: field("program_id")?,
        version: field("version")?,
        server_url: field("server_url")?,
    })
}

/// Write the state file atomically.
pub fn write(path: &Path, state: &CurrentState) -> Result<()> {
    let json = serde_json::to_string_pretty(state)?;
    write_atomic(path, json.as_bytes())?;
    tracing::info!(version = %state.version, "Saved state to {}", path.display());
    Ok(())
}

/// Write bytes to a sibling `.tmp` file, sync it, then rename over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        LauncherError::Io(format!(
            "failed to replace {} with {}: {e}",
            path.display(),
            temp_path.display()
        ))
    })
}
