//! Self-update core for the program launcher.
//!
//! The launcher keeps every installed release in its own directory under
//! `versions/` and records the active one in `data/current.json`. On start it
//! asks the release server for the latest version and, when the server is
//! ahead, downloads the release archive, unpacks it into a staging directory
//! and swaps it into place before launching the program.
//!
//! # Layout
//!
//! ```text
//! <base>/
//!   data/current.json         {"version", "program_id", "server_url"}
//!   data/notice_ack.json      hidden notices
//!   data/launcher.json        optional settings
//!   downloads_tmp/            archives being downloaded
//!   versions/v1_2_3/          installed releases
//!   versions/_staging/        unpacked releases awaiting promotion
//! ```
//!
//! # Architecture
//!
//! - [`orchestrator`] - the state machine sequencing one run
//! - [`steps`] - download, verify, extract, promote and launch
//! - [`worker`] - runs the orchestrator on a background thread and reports
//!   over a channel
//!
//! # Example
//!
//! ```no_run
//! use launcher_core::{LauncherContext, LauncherPaths, UpdateMessage, UpdateRequest, spawn_update};
//! use std::time::Duration;
//!
//! fn main() -> launcher_core::Result<()> {
//!     let ctx = LauncherContext::load(LauncherPaths::new("."))?;
//!     let mut handle = spawn_update(ctx, UpdateRequest::install())?;
//!
//!     let result = handle.wait_with(Duration::from_secs(600), |message| {
//!         if let UpdateMessage::Progress(p) = message {
//!             println!("{p}%");
//!         }
//!     });
//!     if let Some(Ok(outcome)) = result {
//!         println!("{outcome}");
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod error;
pub mod notice_store;
pub mod paths;
pub mod remote;
pub mod state;
pub mod version;

// Individual steps
pub mod steps;

// Run sequencing
pub mod orchestrator;
pub mod worker;

pub use config::{DEFAULT_EXE_NAME, LauncherContext, LauncherSettings, SupportConfig};
pub use error::{LauncherError, Result};
pub use notice_store::NoticeAckStore;
pub use orchestrator::{
    NoopObserver, UpdateFailure, UpdateObserver, UpdateOrchestrator, UpdateOutcome, UpdateRequest,
    UpdateResult, UpdateStage, run_update,
};
pub use paths::{BaseDirStrategy, LauncherPaths};
pub use remote::{LatestInfo, NoticeInfo, NoticeLevel, RemoteInfoClient};
pub use state::CurrentState;
pub use version::{SemVer, UpdateDirection};
pub use worker::{
    NoticeResult, UpdateHandle, UpdateMessage, UpdateSupervisor, spawn_notice_check, spawn_update,
};

pub use steps::download::{DownloadProgress, format_bytes};
pub use steps::extract::ArchiveType;

/// Version of the launcher itself.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
