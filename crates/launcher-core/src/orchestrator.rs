//! The update state machine.
//!
//! ```text
//! ReadingState -> QueryingRemote -> compare
//!   LocalNewer | UpToDate            -> resolve local exe
//!   UpdateRequired, check only       -> UpdateAvailable
//!   UpdateRequired, auto update      -> Probing -> Downloading -> Verifying
//!                                       -> Staging -> Promoting -> PersistingState
//!                                       -> CleaningUp -> Done
//! ```
//!
//! Every failure carries the last known-good executable so the caller can
//! still offer to run it.

use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use tracing::{debug, info, info_span, warn};

use crate::config::LauncherContext;
use crate::error::{LauncherError, Result};
use crate::remote::{LatestInfo, RemoteInfoClient};
use crate::state::{self, CurrentState};
use crate::steps::download::{self, DownloadProgress};
use crate::steps::extract::{self, ArchiveType};
use crate::steps::promote;
use crate::steps::verify;
use crate::version::{self, UpdateDirection};

/// Share of overall progress taken by the download.
const DOWNLOAD_PROGRESS_SPAN: f64 = 80.0;

/// Receives status, log and progress events from a run.
///
/// Every method has an empty default so observers implement only what they
/// render.
pub trait UpdateObserver {
    /// A new stage started.
    fn on_status(&self, _status: &str) {}
    /// A human-readable log line.
    fn on_log(&self, _line: &str) {}
    /// Overall progress, 0 to 100, never decreasing within a run.
    fn on_progress(&self, _percent: u8) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl UpdateObserver for NoopObserver {}

/// Stages of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStage {
    /// Loading `current.json`.
    ReadingState,
    /// Asking the server for the latest version.
    QueryingRemote,
    /// Checking the asset URL.
    Probing,
    /// Streaming the archive to disk.
    Downloading,
    /// Checking the archive digest.
    Verifying,
    /// Unpacking into staging.
    Staging,
    /// Moving staging into place.
    Promoting,
    /// Writing the new `current.json`.
    PersistingState,
    /// Removing temporary files.
    CleaningUp,
    /// Finished.
    Done,
}

impl UpdateStage {
    /// Overall progress when the stage starts.
    #[must_use]
    pub const fn progress(self) -> u8 {
        match self {
            Self::ReadingState | Self::QueryingRemote | Self::Probing | Self::Downloading => 0,
            Self::Verifying => 80,
            Self::Staging => 85,
            Self::Promoting => 92,
            Self::PersistingState => 96,
            Self::CleaningUp => 98,
            Self::Done => 100,
        }
    }

    /// Status text shown to the user.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ReadingState => "Reading installed version...",
            Self::QueryingRemote => "Checking for the latest version...",
            Self::Probing => "Preparing download...",
            Self::Downloading => "Downloading...",
            Self::Verifying => "Verifying download...",
            Self::Staging => "Extracting...",
            Self::Promoting => "Installing...",
            Self::PersistingState => "Saving version information...",
            Self::CleaningUp => "Cleaning up...",
            Self::Done => "Done",
        }
    }
}

/// What the caller wants from a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateRequest {
    /// Install an available update instead of only reporting it.
    pub auto_update: bool,
}

impl UpdateRequest {
    /// Report an available update without downloading it.
    #[must_use]
    pub const fn check_only() -> Self {
        Self { auto_update: false }
    }

    /// Install an available update.
    #[must_use]
    pub const fn install() -> Self {
        Self { auto_update: true }
    }
}

/// Successful end states of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Local and remote versions match.
    UpToDate {
        /// Installed version.
        version: String,
        /// Executable of the installed version.
        exe_path: PathBuf,
    },
    /// The server is behind the local install; nothing was touched.
    LocalNewer {
        /// Installed version.
        local_version: String,
        /// Version reported by the server.
        remote_version: String,
        /// Executable of the installed version.
        exe_path: PathBuf,
    },
    /// A newer version exists but was not installed.
    UpdateAvailable {
        /// Installed version.
        local_version: String,
        /// Version reported by the server.
        latest_version: String,
        /// Download URL of the release.
        asset_url: Option<String>,
        /// Executable of the installed version, if present.
        exe_path: Option<PathBuf>,
    },
    /// A newer version was installed.
    Installed {
        /// Version that was replaced as current.
        previous_version: String,
        /// Newly installed version.
        version: String,
        /// Executable of the new version.
        exe_path: PathBuf,
    },
}

impl UpdateOutcome {
    /// Executable to launch, if any.
    #[must_use]
    pub fn exe_path(&self) -> Option<&Path> {
        match self {
            Self::UpToDate { exe_path, .. }
            | Self::LocalNewer { exe_path, .. }
            | Self::Installed { exe_path, .. } => Some(exe_path.as_path()),
            Self::UpdateAvailable { exe_path, .. } => exe_path.as_deref(),
        }
    }

    /// Whether an update was found but not installed.
    #[must_use]
    pub fn update_available(&self) -> bool {
        matches!(self, Self::UpdateAvailable { .. })
    }

    /// Version reported by the server.
    #[must_use]
    pub fn latest_version(&self) -> &str {
        match self {
            Self::UpToDate { version, .. } | Self::Installed { version, .. } => version,
            Self::LocalNewer { remote_version, .. } => remote_version,
            Self::UpdateAvailable { latest_version, .. } => latest_version,
        }
    }

    /// Asset URL of an available update.
    #[must_use]
    pub fn asset_url(&self) -> Option<&str> {
        match self {
            Self::UpdateAvailable { asset_url, .. } => asset_url.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpToDate { version, .. } => write!(f, "up to date ({version})"),
            Self::LocalNewer {
                local_version,
                remote_version,
                ..
            } => write!(
                f,
                "local version {local_version} is newer than server version {remote_version}"
            ),
            Self::UpdateAvailable {
                local_version,
                latest_version,
                ..
            } => write!(f, "update available: {local_version} -> {latest_version}"),
            Self::Installed {
                previous_version,
                version,
                ..
            } => write!(f, "installed {version} (was {previous_version})"),
        }
    }
}

/// A failed run.
#[derive(Debug)]
pub struct UpdateFailure {
    /// What went wrong.
    pub error: LauncherError,
    /// Previously installed executable that can still be launched.
    pub fallback_exe: Option<PathBuf>,
}

impl UpdateFailure {
    /// Wraps `error` together with the executable that still works.
    #[must_use]
    pub fn new(error: LauncherError, fallback_exe: Option<PathBuf>) -> Self {
        Self {
            error,
            fallback_exe,
        }
    }
}

impl fmt::Display for UpdateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for UpdateFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Result of one run.
pub type UpdateResult = std::result::Result<UpdateOutcome, UpdateFailure>;

/// Drives one check-and-update run.
pub struct UpdateOrchestrator<'a> {
    ctx: &'a LauncherContext,
    observer: &'a dyn UpdateObserver,
    progress: Cell<Option<u8>>,
}

impl<'a> UpdateOrchestrator<'a> {
    /// Creates an orchestrator reporting to `observer`.
    #[must_use]
    pub fn new(ctx: &'a LauncherContext, observer: &'a dyn UpdateObserver) -> Self {
        Self {
            ctx,
            observer,
            progress: Cell::new(None),
        }
    }

    /// Run to a terminal state. Never panics; a panic inside the run becomes
    /// [`LauncherError::Unexpected`].
    pub fn run(&self, request: UpdateRequest) -> UpdateResult {
        let span = info_span!("update", auto_update = request.auto_update);
        let _guard = span.enter();

        match panic::catch_unwind(AssertUnwindSafe(|| self.run_stages(request))) {
            Ok(result) => {
                match &result {
                    Ok(outcome) => info!(%outcome, "Update run finished"),
                    Err(failure) => warn!(error = %failure.error, "Update run failed"),
                }
                result
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(%message, "Update run panicked");
                let fallback = state::read(&self.ctx.paths.current_json)
                    .ok()
                    .and_then(|local| self.local_exe(&local));
                Err(UpdateFailure::new(
                    LauncherError::Unexpected(message),
                    fallback,
                ))
            }
        }
    }

    fn run_stages(&self, request: UpdateRequest) -> UpdateResult {
        let paths = &self.ctx.paths;
        let settings = &self.ctx.settings;

        self.enter(UpdateStage::ReadingState);
        let local = state::read(&paths.current_json).map_err(|e| UpdateFailure::new(e, None))?;
        self.log(&format!("program_id={}", local.program_id));
        self.log(&format!("local_version={}", local.version));
        self.log(&format!("server_url={}", local.server_url));

        self.recover_current_version(&local);
        let fallback = self.local_exe(&local);
        let fail = |error: LauncherError| UpdateFailure::new(error, fallback.clone());

        self.enter(UpdateStage::QueryingRemote);
        let client = RemoteInfoClient::new().map_err(fail)?;
        let latest = client
            .fetch_latest(&local.server_url, &local.program_id, settings.latest_timeout())
            .map_err(fail)?;
        self.log(&format!("latest_version={}", latest.latest_version));
        self.log(&format!(
            "asset_url={}",
            latest.asset_url.as_deref().unwrap_or("<none>")
        ));
        if latest.program_id != local.program_id {
            warn!(
                local = %local.program_id,
                remote = %latest.program_id,
                "Server answered for a different program id"
            );
        }

        let ordering = version::compare(&local.version, &latest.latest_version).map_err(fail)?;
        match UpdateDirection::from(ordering) {
            UpdateDirection::LocalNewer => {
                self.log(&format!(
                    "server older than local, skipping: local={} server={}",
                    local.version, latest.latest_version
                ));
                let exe_path = self.require_local_exe(&local).map_err(fail)?;
                self.enter(UpdateStage::Done);
                Ok(UpdateOutcome::LocalNewer {
                    local_version: local.version,
                    remote_version: latest.latest_version,
                    exe_path,
                })
            }
            UpdateDirection::UpToDate => {
                self.log(&format!("up to date: {}", local.version));
                let exe_path = self.require_local_exe(&local).map_err(fail)?;
                self.enter(UpdateStage::Done);
                Ok(UpdateOutcome::UpToDate {
                    version: local.version,
                    exe_path,
                })
            }
            UpdateDirection::UpdateRequired if !request.auto_update => {
                self.log(&format!(
                    "update available: {} -> {}",
                    local.version, latest.latest_version
                ));
                Ok(UpdateOutcome::UpdateAvailable {
                    local_version: local.version,
                    latest_version: latest.latest_version,
                    asset_url: latest.asset_url,
                    exe_path: fallback,
                })
            }
            UpdateDirection::UpdateRequired => match self.install(&local, &latest) {
                Ok(exe_path) => Ok(UpdateOutcome::Installed {
                    previous_version: local.version,
                    version: latest.latest_version,
                    exe_path,
                }),
                Err(error) => {
                    self.discard_transient_files();
                    Err(fail(error))
                }
            },
        }
    }

    fn install(&self, local: &CurrentState, latest: &LatestInfo) -> Result<PathBuf> {
        let paths = &self.ctx.paths;
        let settings = &self.ctx.settings;

        let asset_url = latest.asset_url.as_deref().ok_or(LauncherError::AssetMissing)?;

        self.enter(UpdateStage::Probing);
        match download::probe(asset_url, settings.probe_timeout()) {
            Ok(_) => self.log("probe ok"),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(error = %e, "Probe failed, continuing with download");
                self.log(&format!("probe failed (ignored): {e}"));
            }
        }

        self.enter(UpdateStage::Downloading);
        let archive_type = ArchiveType::detect(asset_url);
        let archive = paths.download_path(
            &local.program_id,
            &latest.latest_version,
            archive_type.extension(),
        );
        let bytes = download::download(
            asset_url,
            &archive,
            settings.download_timeout(),
            latest.asset_size,
            |written, total| {
                let fraction = DownloadProgress::new(written, total).fraction();
                self.set_progress((fraction * DOWNLOAD_PROGRESS_SPAN) as u8);
            },
        )?;
        self.log(&format!(
            "downloaded {} to {}",
            download::format_bytes(bytes),
            archive.display()
        ));

        if let Some(expected) = latest.asset_sha256.as_deref() {
            if settings.verify_checksum {
                self.enter(UpdateStage::Verifying);
                verify::verify_file_sha256(&archive, expected)?;
                self.log("sha256 verified");
            } else {
                debug!("Checksum verification disabled");
            }
        }

        self.enter(UpdateStage::Staging);
        let dirname = version::version_to_dirname(&latest.latest_version)?;
        let staging = paths.staging_dir(&local.program_id, &dirname);
        extract::unpack(&archive, &staging)?;
        self.log(&format!("unpacked to {}", staging.display()));

        let exe_name = settings.exe_name.as_str();
        let staged_exe = extract::find_executable(&staging, exe_name).ok_or_else(|| {
            LauncherError::ExeNotFoundInPackage {
                exe_name: exe_name.to_string(),
                dir: staging.clone(),
            }
        })?;
        self.log(&format!("exe found: {}", staged_exe.display()));

        self.enter(UpdateStage::Promoting);
        let target = paths.version_dir(&dirname);
        promote::promote(&staging, &target)?;
        self.log(&format!("promoted to {}", target.display()));

        self.enter(UpdateStage::PersistingState);
        state::write(&paths.current_json, &local.with_version(&latest.latest_version))?;
        self.log(&format!("current.json updated: version={}", latest.latest_version));

        self.enter(UpdateStage::CleaningUp);
        self.discard_transient_files();

        self.enter(UpdateStage::Done);
        extract::find_executable(&target, exe_name).ok_or_else(|| {
            LauncherError::ExeNotFoundInPackage {
                exe_name: exe_name.to_string(),
                dir: target,
            }
        })
    }

    /// Remove `downloads_tmp/` and `versions/_staging/`, reporting leftovers.
    fn discard_transient_files(&self) {
        let paths = &self.ctx.paths;
        let leftovers = promote::cleanup(&[paths.downloads_dir(), paths.staging_root()]);
        if leftovers.is_empty() {
            self.log("cleanup done");
        }
        for path in leftovers {
            self.log(&format!("could not remove {}", path.display()));
        }
    }

    /// Restore the current version directory if a promote was interrupted.
    fn recover_current_version(&self, local: &CurrentState) {
        let Ok(dirname) = version::version_to_dirname(&local.version) else {
            return;
        };
        match promote::recover_interrupted(&self.ctx.paths.version_dir(&dirname)) {
            Ok(true) => self.log(&format!("restored {dirname} from backup")),
            Ok(false) => {}
            Err(e) => self.log(&format!("could not restore {dirname} from backup: {e}")),
        }
    }

    fn local_exe(&self, local: &CurrentState) -> Option<PathBuf> {
        let dirname = version::version_to_dirname(&local.version).ok()?;
        extract::find_executable(
            &self.ctx.paths.version_dir(&dirname),
            &self.ctx.settings.exe_name,
        )
    }

    fn require_local_exe(&self, local: &CurrentState) -> Result<PathBuf> {
        self.local_exe(local)
            .ok_or_else(|| LauncherError::ExeNotFoundLocally {
                exe_name: self.ctx.settings.exe_name.clone(),
                dir: version::version_to_dirname(&local.version)
                    .map(|d| self.ctx.paths.version_dir(&d))
                    .unwrap_or_else(|_| self.ctx.paths.versions_dir.clone()),
            })
    }

    fn enter(&self, stage: UpdateStage) {
        debug!(?stage, "Entering stage");
        self.observer.on_status(stage.label());
        self.set_progress(stage.progress());
    }

    fn log(&self, line: &str) {
        debug!("{line}");
        self.observer.on_log(line);
    }

    fn set_progress(&self, percent: u8) {
        let percent = percent.min(100);
        match self.progress.get() {
            Some(last) if percent <= last => {}
            _ => {
                self.progress.set(Some(percent));
                self.observer.on_progress(percent);
            }
        }
    }
}

/// Check for an update and install it if `request` asks for it.
pub fn run_update(
    ctx: &LauncherContext,
    request: UpdateRequest,
    observer: &dyn UpdateObserver,
) -> UpdateResult {
    UpdateOrchestrator::new(ctx, observer).run(request)
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
