//! Client for the update server's metadata endpoints.
//!
//! Both endpoints are validated leniently: only the fields the launcher
//! cannot work without are required, everything else falls back to `None`
//! or a safe default.

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::ACCEPT;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{LauncherError, Result};

/// User agent sent with every launcher request.
pub(crate) const USER_AGENT_VALUE: &str = concat!("crawl-launcher/", env!("CARGO_PKG_VERSION"));

/// Maximum number of body characters quoted in a bad-status error.
const ERROR_BODY_PREVIEW: usize = 200;

/// Remote descriptor of the newest release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestInfo {
    /// Program identifier echoed by the server.
    pub program_id: String,
    /// Newest published version.
    pub latest_version: String,
    /// Download URL of the release archive.
    pub asset_url: Option<String>,
    /// Published sha256 of the archive, hex encoded.
    pub asset_sha256: Option<String>,
    /// Published archive size in bytes.
    pub asset_size: Option<u64>,
}

/// Importance of a server notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoticeLevel {
    /// Must be read before continuing.
    Critical,
    /// Worth reading.
    Important,
    /// Informational.
    #[default]
    Info,
}

impl NoticeLevel {
    /// Parse a level name case-insensitively. Unknown names are `Info`.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Self::Critical,
            "IMPORTANT" => Self::Important,
            _ => Self::Info,
        }
    }

    /// Upper-case wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::Important => "IMPORTANT",
            Self::Info => "INFO",
        }
    }
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An announcement published for a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeInfo {
    /// Server-side identifier, used for acknowledgements.
    pub notice_id: String,
    /// Importance.
    pub level: NoticeLevel,
    /// Forced notices ignore acknowledgements.
    pub force: bool,
    /// Title, possibly empty.
    pub title: String,
    /// Body text, possibly empty.
    pub content: String,
}

/// HTTP client for `launcher/api/v1`.
#[derive(Debug, Clone)]
pub struct RemoteInfoClient {
    client: Client,
}

impl RemoteInfoClient {
    /// Create a client.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT_VALUE)
            .build()
            .map_err(|e| LauncherError::RemoteUnreachable(e.to_string()))?;
        Ok(Self { client })
    }

    /// Fetch the newest release descriptor for `program_id`.
    pub fn fetch_latest(
        &self,
        base_url: &str,
        program_id: &str,
        timeout: Duration,
    ) -> Result<LatestInfo> {
        let url = endpoint(base_url, program_id, "latest");
        debug!(%url, "Fetching latest version");

        let response = self.get_json(&url, timeout)?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(bad_status(status, response));
        }

        parse_latest(&read_json(response)?)
    }

    /// Fetch the newest notice for `program_id`, `None` when there is none.
    pub fn fetch_latest_notice(
        &self,
        base_url: &str,
        program_id: &str,
        timeout: Duration,
    ) -> Result<Option<NoticeInfo>> {
        let url = endpoint(base_url, program_id, "notices/latest");
        debug!(%url, "Fetching latest notice");

        let response = self.get_json(&url, timeout)?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(None),
            StatusCode::OK => parse_notice(&read_json(response)?).map(Some),
            status => Err(bad_status(status, response)),
        }
    }

    fn get_json(&self, url: &str, timeout: Duration) -> Result<Response> {
        self.client
            .get(url)
            .header(ACCEPT, "application/json")
            .timeout(timeout)
            .send()
            .map_err(|e| LauncherError::RemoteUnreachable(format!("request failed: {e}")))
    }
}

fn endpoint(base_url: &str, program_id: &str, tail: &str) -> String {
    format!(
        "{}/launcher/api/v1/programs/{program_id}/{tail}",
        base_url.trim_end_matches('/')
    )
}

fn bad_status(status: StatusCode, response: Response) -> LauncherError {
    let body = response.text().unwrap_or_default();
    let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
    LauncherError::RemoteUnreachable(format!("bad status: {} / {preview}", status.as_u16()))
}

fn read_json(response: Response) -> Result<Value> {
    let text = response
        .text()
        .map_err(|e| LauncherError::RemoteUnreachable(format!("failed to read body: {e}")))?;
    serde_json::from_str(&text)
        .map_err(|e| LauncherError::InvalidResponse(format!("json parse failed: {e}")))
}

/// Non-empty trimmed string at `key`.
fn required_str(obj: &Map<String, Value>, key: &str) -> Result<String> {
    optional_str(obj, key)
        .ok_or_else(|| LauncherError::InvalidResponse(format!("\"{key}\" is required")))
}

fn optional_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Trimmed string at `key`; anything else is empty.
fn lenient_text(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

pub(crate) fn parse_latest(body: &Value) -> Result<LatestInfo> {
    let obj = body
        .as_object()
        .ok_or_else(|| LauncherError::InvalidResponse("body is not an object".to_string()))?;

    let program_id = required_str(obj, "program_id")?;
    let latest_version = required_str(obj, "latest_version")?;

    let empty = Map::new();
    let asset = obj.get("asset").and_then(Value::as_object).unwrap_or(&empty);

    Ok(LatestInfo {
        program_id,
        latest_version,
        asset_url: optional_str(asset, "url"),
        asset_sha256: optional_str(asset, "sha256"),
        asset_size: asset.get("size").and_then(Value::as_u64),
    })
}

pub(crate) fn parse_notice(body: &Value) -> Result<NoticeInfo> {
    let outer = body
        .as_object()
        .ok_or_else(|| LauncherError::InvalidResponse("body is not an object".to_string()))?;

    let notice = match outer.get("notice") {
        None | Some(Value::Null) => outer,
        Some(Value::Object(inner)) if inner.is_empty() => outer,
        Some(Value::Object(inner)) => inner,
        Some(_) => {
            return Err(LauncherError::InvalidResponse(
                "notice is not an object".to_string(),
            ));
        }
    };

    let notice_id = required_str(notice, "id")?;
    let level = notice
        .get("level")
        .and_then(Value::as_str)
        .map(NoticeLevel::from_name)
        .unwrap_or_default();

    Ok(NoticeInfo {
        notice_id,
        level,
        force: matches!(notice.get("force"), Some(Value::Bool(true))),
        title: lenient_text(notice, "title"),
        content: lenient_text(notice, "content"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        assert_eq!(
            endpoint("https://example.com/", "my_program", "latest"),
            "https://example.com/launcher/api/v1/programs/my_program/latest"
        );
    }

    #[test]
    fn test_parse_latest_full() {
        let info = parse_latest(&json!({
            "program_id": " my_program ",
            "latest_version": "1.2.0",
            "asset": {"url": "https://cdn/x.zip", "sha256": "ab", "size": 12345}
        }))
        .unwrap();

        assert_eq!(info.program_id, "my_program");
        assert_eq!(info.latest_version, "1.2.0");
        assert_eq!(info.asset_url.as_deref(), Some("https://cdn/x.zip"));
        assert_eq!(info.asset_sha256.as_deref(), Some("ab"));
        assert_eq!(info.asset_size, Some(12345));
    }

    #[test]
    fn test_parse_latest_tolerates_bad_asset_fields() {
        let info = parse_latest(&json!({
            "program_id": "p",
            "latest_version": "1.2.0",
            "asset": {"url": 7, "sha256": "  ", "size": "big"}
        }))
        .unwrap();
        assert_eq!(info.asset_url, None);
        assert_eq!(info.asset_sha256, None);
        assert_eq!(info.asset_size, None);

        let info = parse_latest(&json!({"program_id": "p", "latest_version": "1.2.0", "asset": null}))
            .unwrap();
        assert_eq!(info.asset_url, None);
    }

    #[test]
    fn test_parse_latest_requires_identity() {
        for body in [
            json!({"latest_version": "1.0.0"}),
            json!({"program_id": "p", "latest_version": ""}),
            json!({"program_id": 3, "latest_version": "1.0.0"}),
            json!(["not", "an", "object"]),
        ] {
            assert!(matches!(
                parse_latest(&body),
                Err(LauncherError::InvalidResponse(_))
            ));
        }
    }

    #[test]
    fn test_parse_notice_wrapped_and_bare() {
        let wrapped = parse_notice(&json!({
            "notice": {"id": "n1", "level": "critical", "force": true, "title": " Hi ", "content": "Body"}
        }))
        .unwrap();
        assert_eq!(wrapped.notice_id, "n1");
        assert_eq!(wrapped.level, NoticeLevel::Critical);
        assert!(wrapped.force);
        assert_eq!(wrapped.title, "Hi");

        let bare = parse_notice(&json!({"id": "n2"})).unwrap();
        assert_eq!(bare.level, NoticeLevel::Info);
        assert!(!bare.force);
        assert_eq!(bare.title, "");
        assert_eq!(bare.content, "");
    }

    #[test]
    fn test_parse_notice_defaults() {
        let notice = parse_notice(&json!({
            "id": "n3", "level": "urgent", "force": "yes", "title": 42, "content": null
        }))
        .unwrap();
        assert_eq!(notice.level, NoticeLevel::Info);
        assert!(!notice.force);
        assert_eq!(notice.title, "");
        assert_eq!(notice.content, "");
    }

    #[test]
    fn test_parse_notice_requires_id() {
        assert!(matches!(
            parse_notice(&json!({"notice": {"title": "x"}})),
            Err(LauncherError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_notice(&json!({"notice": "text"})),
            Err(LauncherError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_notice_level_names() {
        assert_eq!(NoticeLevel::from_name("Important"), NoticeLevel::Important);
        assert_eq!(NoticeLevel::Critical.to_string(), "CRITICAL");
    }
}
