//! Integration tests for console rendering.

use std::io::Cursor;
use std::path::PathBuf;

use launcher_cli::console::{confirm, format_notice};
use launcher_cli::progress::UpdateProgressView;
use launcher_core::{NoticeInfo, NoticeLevel, UpdateMessage, UpdateOutcome};

fn notice(level: NoticeLevel, title: &str, content: &str) -> NoticeInfo {
    NoticeInfo {
        notice_id: "n1".to_string(),
        level,
        force: false,
        title: title.to_string(),
        content: content.to_string(),
    }
}

#[test]
fn test_format_notice_with_body() {
    let text = format_notice(&notice(
        NoticeLevel::Critical,
        "Server move",
        "Downloads pause tonight.\nPlease update tomorrow.\n",
    ));
    assert_eq!(
        text,
        "[!!] CRITICAL - Server move\n    Downloads pause tonight.\n    Please update tomorrow."
    );
}

#[test]
fn test_format_notice_without_body_or_title() {
    let text = format_notice(&notice(NoticeLevel::Info, "", ""));
    assert_eq!(text, "[i] INFO - (untitled)");
}

#[test]
fn test_confirm_reads_one_line() {
    let mut input = Cursor::new("yes\nno\n");
    let mut output = Vec::new();

    assert!(confirm(&mut input, &mut output, "Install?").unwrap());
    assert!(!confirm(&mut input, &mut output, "Install?").unwrap());
}

#[test]
fn test_progress_view_follows_messages() {
    let view = UpdateProgressView::hidden(false);

    view.handle(&UpdateMessage::Status("Downloading...".to_string()));
    view.handle(&UpdateMessage::Progress(40));
    view.handle(&UpdateMessage::Log("downloaded 1.0 MB".to_string()));

    assert_eq!(view.position(), 40);
    assert_eq!(view.status(), "Downloading...");

    view.handle(&UpdateMessage::Done(Ok(UpdateOutcome::UpToDate {
        version: "1.0.0".to_string(),
        exe_path: PathBuf::from("versions/v1_0_0/CrawlProgram.exe"),
    })));
    assert_eq!(view.position(), 40);
}
