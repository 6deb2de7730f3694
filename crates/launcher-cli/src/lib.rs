//! CLI library components for the launcher.

pub mod console;
pub mod logging;
pub mod progress;
