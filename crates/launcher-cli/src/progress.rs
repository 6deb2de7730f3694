//! Terminal rendering of update progress.

use std::io::{self, IsTerminal};

use indicatif::{ProgressBar, ProgressStyle};
use launcher_core::UpdateMessage;

const BAR_TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}";

/// Progress bar driven by worker messages.
pub struct UpdateProgressView {
    bar: ProgressBar,
    show_log: bool,
}

impl UpdateProgressView {
    /// A bar on stderr, hidden when stderr is not a terminal.
    ///
    /// With `show_log` every log line of the run is printed above the bar.
    #[must_use]
    pub fn new(show_log: bool) -> Self {
        if !io::stderr().is_terminal() {
            return Self::hidden(show_log);
        }

        let bar = ProgressBar::new(100);
        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars("=> "));
        }
        Self { bar, show_log }
    }

    /// A view that tracks state but draws nothing.
    #[must_use]
    pub fn hidden(show_log: bool) -> Self {
        Self {
            bar: ProgressBar::hidden(),
            show_log,
        }
    }

    /// Apply one message from the worker.
    pub fn handle(&self, message: &UpdateMessage) {
        match message {
            UpdateMessage::Status(status) => self.bar.set_message(status.clone()),
            UpdateMessage::Log(line) => {
                if self.show_log {
                    self.bar.println(format!("  {line}"));
                }
            }
            UpdateMessage::Progress(percent) => self.bar.set_position(u64::from(*percent)),
            UpdateMessage::Done(_) => self.finish(),
        }
    }

    /// Current position, 0 to 100.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Current status text.
    #[must_use]
    pub fn status(&self) -> String {
        self.bar.message()
    }

    /// Remove the bar from the terminal.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
