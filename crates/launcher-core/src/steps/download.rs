//! Asset probing and streaming download.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_LENGTH, HeaderMap};
use tracing::{debug, info, warn};

use crate::error::{LauncherError, Result};
use crate::remote::USER_AGENT_VALUE;

/// Size of each read from the response body.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Progress information during a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    /// Bytes written so far.
    pub downloaded: u64,
    /// Expected total, 0 when unknown.
    pub total: u64,
}

impl DownloadProgress {
    /// Creates a new progress instance.
    #[must_use]
    pub fn new(downloaded: u64, total: u64) -> Self {
        Self { downloaded, total }
    }

    /// Returns the progress as a fraction (0.0 to 1.0), 0 when the total is unknown.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.downloaded as f64 / self.total as f64).min(1.0)
    }

    /// Returns the progress as a percentage (0 to 100).
    #[must_use]
    pub fn percentage(&self) -> u8 {
        (self.fraction() * 100.0) as u8
    }
}

/// Formats a byte count in human-readable form.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT_VALUE)
        .timeout(timeout)
        .build()
        .map_err(|e| LauncherError::DownloadFailed(e.to_string()))
}

/// Check that `url` is reachable and return its headers.
///
/// Tries `HEAD` first and falls back to a `GET` whose body is never read.
pub fn probe(url: &str, timeout: Duration) -> Result<HeaderMap> {
    let client = client(timeout).map_err(|e| LauncherError::ProbeFailed(e.to_string()))?;

    match client.head(url).header(ACCEPT, "*/*").send() {
        Ok(response) if response.status() == StatusCode::OK => {
            debug!(%url, "Probe ok (HEAD)");
            return Ok(response.headers().clone());
        }
        Ok(response) => debug!(%url, status = %response.status(), "HEAD not usable, trying GET"),
        Err(e) => debug!(%url, error = %e, "HEAD failed, trying GET"),
    }

    let response = client
        .get(url)
        .header(ACCEPT, "*/*")
        .send()
        .map_err(|e| LauncherError::ProbeFailed(format!("request failed: {e}")))?;

    if response.status() != StatusCode::OK {
        return Err(LauncherError::ProbeFailed(format!(
            "bad status(get): {}",
            response.status().as_u16()
        )));
    }

    debug!(%url, "Probe ok (GET)");
    Ok(response.headers().clone())
}

/// Stream `url` into `dst`, returning the number of bytes written.
///
/// The body goes to `<dst>.part` and is renamed onto `dst` only after the
/// last chunk is written. On failure the partial file is removed and an
/// existing `dst` is left alone. `on_progress(written, total)` runs after
/// every chunk; a panic inside it is swallowed. `size_hint` is used as the
/// total when the response carries no usable `Content-Length`.
pub fn download<F>(
    url: &str,
    dst: &Path,
    timeout: Duration,
    size_hint: Option<u64>,
    mut on_progress: F,
) -> Result<u64>
where
    F: FnMut(u64, u64),
{
    let part = part_path(dst);
    info!(%url, dst = %dst.display(), "Starting download");

    match stream_to(url, &part, timeout, size_hint, &mut on_progress) {
        Ok(written) => {
            if dst.exists() {
                let _ = fs::remove_file(dst);
            }
            if let Err(e) = fs::rename(&part, dst) {
                let _ = fs::remove_file(&part);
                return Err(LauncherError::DownloadFailed(format!(
                    "failed to move {} into place: {e}",
                    part.display()
                )));
            }
            info!(bytes = written, "Download complete");
            Ok(written)
        }
        Err(e) => {
            if part.exists() {
                if let Err(remove_err) = fs::remove_file(&part) {
                    warn!(path = %part.display(), error = %remove_err, "Could not remove partial download");
                }
            }
            Err(e)
        }
    }
}

/// `archive.zip` becomes `archive.zip.part`.
#[must_use]
pub fn part_path(dst: &Path) -> PathBuf {
    let mut name = dst.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

fn stream_to<F>(
    url: &str,
    part: &Path,
    timeout: Duration,
    size_hint: Option<u64>,
    on_progress: &mut F,
) -> Result<u64>
where
    F: FnMut(u64, u64),
{
    if let Some(parent) = part.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            LauncherError::DownloadFailed(format!("failed to create {}: {e}", parent.display()))
        })?;
    }

    let mut response = client(timeout)?
        .get(url)
        .header(ACCEPT, "*/*")
        .send()
        .map_err(|e| LauncherError::DownloadFailed(format!("request failed: {e}")))?;

    if response.status() != StatusCode::OK {
        return Err(LauncherError::DownloadFailed(format!(
            "bad status: {}",
            response.status().as_u16()
        )));
    }

    let total = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .or(size_hint)
        .unwrap_or(0);

    let mut file = File::create(part).map_err(|e| {
        LauncherError::DownloadFailed(format!("failed to create {}: {e}", part.display()))
    })?;
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut written: u64 = 0;

    loop {
        let n = response
            .read(&mut buffer)
            .map_err(|e| LauncherError::DownloadFailed(format!("read failed: {e}")))?;
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n])
            .map_err(|e| LauncherError::DownloadFailed(format!("write failed: {e}")))?;
        written += n as u64;

        if panic::catch_unwind(AssertUnwindSafe(|| on_progress(written, total))).is_err() {
            debug!("Progress callback panicked; ignoring");
        }
    }

    file.sync_all()
        .map_err(|e| LauncherError::DownloadFailed(format!("sync failed: {e}")))?;
    Ok(written)
}
