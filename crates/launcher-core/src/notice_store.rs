//! "Hide for today" acknowledgements of server notices.
//!
//! Stored as `{notice_id: hide_until_unix_seconds}` in `data/notice_ack.json`.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::remote::NoticeInfo;
use crate::state::write_atomic;

/// Default hide period in seconds: one day.
pub const HIDE_FOR_DAY_SECS: i64 = 60 * 60 * 24;

/// Acknowledgement file.
#[derive(Debug, Clone)]
pub struct NoticeAckStore {
    path: PathBuf,
}

impl NoticeAckStore {
    /// Store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// All acknowledgements. A missing or invalid file reads as empty.
    #[must_use]
    pub fn load(&self) -> BTreeMap<String, i64> {
        let Ok(text) = fs::read_to_string(&self.path) else {
            return BTreeMap::new();
        };
        let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(&text) else {
            debug!(path = %self.path.display(), "Ignoring invalid acknowledgement file");
            return BTreeMap::new();
        };

        obj.into_iter()
            .filter_map(|(id, until)| {
                let id = id.trim().to_string();
                let until = until.as_i64()?;
                (!id.is_empty()).then_some((id, until))
            })
            .collect()
    }

    /// Replace all acknowledgements.
    pub fn save(&self, acks: &BTreeMap<String, i64>) -> Result<()> {
        let json = serde_json::to_string_pretty(acks)?;
        write_atomic(&self.path, json.as_bytes())
    }

    /// Whether `notice_id` is hidden at `now`.
    #[must_use]
    pub fn is_hidden(&self, notice_id: &str, now: DateTime<Utc>) -> bool {
        self.load()
            .get(notice_id.trim())
            .is_some_and(|until| *until > now.timestamp())
    }

    /// Hide `notice_id` until `now + duration`. Blank ids are ignored.
    pub fn hide_for(&self, notice_id: &str, now: DateTime<Utc>, duration: TimeDelta) -> Result<()> {
        let id = notice_id.trim();
        if id.is_empty() {
            return Ok(());
        }

        let mut acks = self.load();
        acks.insert(id.to_string(), (now + duration).timestamp());
        self.save(&acks)?;
        debug!(notice_id = id, "Notice hidden");
        Ok(())
    }

    /// Hide `notice_id` for one day from now.
    pub fn hide_for_day(&self, notice_id: &str) -> Result<()> {
        self.hide_for(notice_id, Utc::now(), TimeDelta::seconds(HIDE_FOR_DAY_SECS))
    }

    /// Whether `notice` should be shown. Forced notices always are.
    #[must_use]
    pub fn should_show(&self, notice: &NoticeInfo, now: DateTime<Utc>) -> bool {
        notice.force || !self.is_hidden(&notice.notice_id, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::NoticeLevel;
    use tempfile::TempDir;

    fn notice(id: &str, force: bool) -> NoticeInfo {
        NoticeInfo {
            notice_id: id.to_string(),
            level: NoticeLevel::Important,
            force,
            title: "Maintenance".to_string(),
            content: "Tonight".to_string(),
        }
    }

    #[test]
    fn test_missing_and_invalid_files_are_empty() {
        let dir = TempDir::new().unwrap();
        let store = NoticeAckStore::new(dir.path().join("notice_ack.json"));
        assert!(store.load().is_empty());

        fs::write(dir.path().join("notice_ack.json"), "[1,2,3]").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_skips_bad_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notice_ack.json");
        fs::write(&path, r#"{"n1": 100, " ": 5, "n2": "soon", " n3 ": 7}"#).unwrap();

        let acks = NoticeAckStore::new(&path).load();
        assert_eq!(acks.len(), 2);
        assert_eq!(acks.get("n1"), Some(&100));
        assert_eq!(acks.get("n3"), Some(&7));
    }

    #[test]
    fn test_hide_for_expires() {
        let dir = TempDir::new().unwrap();
        let store = NoticeAckStore::new(dir.path().join("data/notice_ack.json"));
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        assert!(!store.is_hidden("n1", now));
        store.hide_for("n1", now, TimeDelta::seconds(HIDE_FOR_DAY_SECS)).unwrap();

        assert!(store.is_hidden("n1", now));
        assert!(store.is_hidden(" n1 ", now + TimeDelta::hours(23)));
        assert!(!store.is_hidden("n1", now + TimeDelta::hours(24)));
        assert!(!store.is_hidden("n2", now));
    }

    #[test]
    fn test_blank_id_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notice_ack.json");
        let store = NoticeAckStore::new(&path);

        store.hide_for("  ", Utc::now(), TimeDelta::seconds(HIDE_FOR_DAY_SECS)).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_forced_notice_always_shown() {
        let dir = TempDir::new().unwrap();
        let store = NoticeAckStore::new(dir.path().join("notice_ack.json"));
        let now = Utc::now();

        store.hide_for("n1", now, TimeDelta::seconds(HIDE_FOR_DAY_SECS)).unwrap();
        assert!(!store.should_show(&notice("n1", false), now));
        assert!(store.should_show(&notice("n1", true), now));
        assert!(store.should_show(&notice("n2", false), now));
    }
}
