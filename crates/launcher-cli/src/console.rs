//! Prompts and plain-text formatting for the terminal.

use std::io::{self, BufRead, Write};

use launcher_core::{NoticeInfo, NoticeLevel};

/// Ask a yes/no `question` on `output` and read the answer from `input`.
///
/// Only `y` or `yes` (any case) confirm; end of input declines.
pub fn confirm<R, W>(input: &mut R, output: &mut W, question: &str) -> io::Result<bool>
where
    R: BufRead,
    W: Write,
{
    write!(output, "{question} [y/N] ")?;
    output.flush()?;

    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        writeln!(output)?;
        return Ok(false);
    }
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Render a notice as a short block of text.
#[must_use]
pub fn format_notice(notice: &NoticeInfo) -> String {
    let marker = match notice.level {
        NoticeLevel::Critical => "!!",
        NoticeLevel::Important => "!",
        NoticeLevel::Info => "i",
    };
    let title = if notice.title.is_empty() {
        "(untitled)"
    } else {
        notice.title.as_str()
    };

    let mut text = format!("[{marker}] {} - {title}", notice.level);
    if !notice.content.is_empty() {
        text.push('\n');
        for line in notice.content.lines() {
            text.push_str("    ");
            text.push_str(line);
            text.push('\n');
        }
        text.truncate(text.trim_end().len());
    }
    text
}
