//! Background update thread.
//!
//! A run executes on its own thread and reports back over a channel, so the
//! caller's UI loop never blocks on network or disk I/O. Each run sends
//! exactly one [`UpdateMessage::Done`], even if it panics.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use crate::config::LauncherContext;
use crate::error::{LauncherError, Result};
use crate::orchestrator::{
    UpdateFailure, UpdateObserver, UpdateRequest, UpdateResult, panic_message, run_update,
};
use crate::remote::{NoticeInfo, RemoteInfoClient};

/// Events sent by an update thread.
#[derive(Debug)]
pub enum UpdateMessage {
    /// A new stage started.
    Status(String),
    /// A log line.
    Log(String),
    /// Overall progress, 0 to 100.
    Progress(u8),
    /// The run finished. Always the last message.
    Done(UpdateResult),
}

struct ChannelObserver {
    sender: Sender<UpdateMessage>,
}

impl UpdateObserver for ChannelObserver {
    fn on_status(&self, status: &str) {
        let _ = self.sender.send(UpdateMessage::Status(status.to_string()));
    }

    fn on_log(&self, line: &str) {
        let _ = self.sender.send(UpdateMessage::Log(line.to_string()));
    }

    fn on_progress(&self, percent: u8) {
        let _ = self.sender.send(UpdateMessage::Progress(percent));
    }
}

/// Owner side of a running update thread.
pub struct UpdateHandle {
    receiver: Receiver<UpdateMessage>,
    thread: Option<JoinHandle<()>>,
}

impl UpdateHandle {
    /// Channel carrying the run's messages.
    #[must_use]
    pub fn receiver(&self) -> &Receiver<UpdateMessage> {
        &self.receiver
    }

    /// Whether the thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait up to `timeout` for the run to finish, discarding other messages.
    ///
    /// Returns `None` on timeout; the run keeps going and can be waited on
    /// again.
    pub fn wait(&mut self, timeout: Duration) -> Option<UpdateResult> {
        self.wait_with(timeout, |_| {})
    }

    /// Like [`wait`](Self::wait), passing every other message to `on_message`.
    pub fn wait_with<F>(&mut self, timeout: Duration, mut on_message: F) -> Option<UpdateResult>
    where
        F: FnMut(&UpdateMessage),
    {
        let deadline = Instant::now() + timeout;
        loop {
            match self.receiver.recv_deadline(deadline) {
                Ok(UpdateMessage::Done(result)) => {
                    self.join();
                    return Some(result);
                }
                Ok(message) => on_message(&message),
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => {
                    self.join();
                    return Some(Err(UpdateFailure::new(
                        LauncherError::Unexpected(
                            "update thread exited without a result".to_string(),
                        ),
                        None,
                    )));
                }
            }
        }
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Update thread panicked after reporting");
            }
        }
    }
}

impl std::fmt::Debug for UpdateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateHandle")
            .field("is_finished", &self.is_finished())
            .finish()
    }
}

/// Start an update run on a dedicated thread.
pub fn spawn_update(ctx: LauncherContext, request: UpdateRequest) -> Result<UpdateHandle> {
    spawn_run(ctx, request, run_update)
}

fn spawn_run<R>(ctx: LauncherContext, request: UpdateRequest, run: R) -> Result<UpdateHandle>
where
    R: FnOnce(&LauncherContext, UpdateRequest, &dyn UpdateObserver) -> UpdateResult
        + Send
        + 'static,
{
    let (sender, receiver) = crossbeam_channel::unbounded();

    let thread = thread::Builder::new()
        .name("launcher-update".to_string())
        .spawn(move || {
            let observer = ChannelObserver {
                sender: sender.clone(),
            };
            let result = panic::catch_unwind(AssertUnwindSafe(|| run(&ctx, request, &observer)))
            .unwrap_or_else(|payload| {
                Err(UpdateFailure::new(
                    LauncherError::Unexpected(panic_message(payload.as_ref())),
                    None,
                ))
            });
            let _ = sender.send(UpdateMessage::Done(result));
        })?;

    debug!(auto_update = request.auto_update, "Update thread started");
    Ok(UpdateHandle {
        receiver,
        thread: Some(thread),
    })
}

/// Allows at most one update run at a time.
#[derive(Debug, Default)]
pub struct UpdateSupervisor {
    current: Option<UpdateHandle>,
}

impl UpdateSupervisor {
    /// Creates an idle supervisor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a run is still in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Start a run, or fail with [`LauncherError::Busy`] if one is active.
    pub fn start(
        &mut self,
        ctx: &LauncherContext,
        request: UpdateRequest,
    ) -> Result<&mut UpdateHandle> {
        if self.is_running() {
            return Err(LauncherError::Busy);
        }
        let handle = spawn_update(ctx.clone(), request)?;
        Ok(self.current.insert(handle))
    }

    /// Wait up to `timeout` for the active run's result.
    ///
    /// `None` when idle or on timeout.
    pub fn wait(&mut self, timeout: Duration) -> Option<UpdateResult> {
        self.current.as_mut()?.wait(timeout)
    }

    /// Wait up to `timeout` for the active run, then let go of it.
    ///
    /// Returns `true` if nothing was left running.
    pub fn shutdown(&mut self, timeout: Duration) -> bool {
        let Some(mut handle) = self.current.take() else {
            return true;
        };
        if handle.is_finished() {
            handle.join();
            return true;
        }
        if handle.wait(timeout).is_some() {
            return true;
        }
        warn!(?timeout, "Update thread did not finish in time; detaching");
        false
    }
}

/// Result of a background notice check.
pub type NoticeResult = Result<Option<NoticeInfo>>;

/// Fetch the latest notice on a background thread.
pub fn spawn_notice_check(
    server_url: String,
    program_id: String,
    timeout: Duration,
) -> Result<Receiver<NoticeResult>> {
    let (sender, receiver) = crossbeam_channel::bounded(1);

    thread::Builder::new()
        .name("launcher-notice".to_string())
        .spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                RemoteInfoClient::new()?.fetch_latest_notice(&server_url, &program_id, timeout)
            }))
            .unwrap_or_else(|payload| {
                Err(LauncherError::Unexpected(panic_message(payload.as_ref())))
            });
            let _ = sender.send(result);
        })?;

    Ok(receiver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LauncherSettings;
    use crate::orchestrator::UpdateStage;
    use crate::paths::LauncherPaths;
    use crate::state::{self, CurrentState};
    use std::net::TcpListener;
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_secs(20);

    fn write_state(paths: &LauncherPaths, server_url: &str) {
        state::write(
            &paths.current_json,
            &CurrentState {
                version: "1.0.0".to_string(),
                program_id: "p".to_string(),
                server_url: server_url.to_string(),
            },
        )
        .unwrap();
    }

    #[test]
    fn test_done_is_last_message() {
        let dir = TempDir::new().unwrap();
        let ctx = LauncherContext::new(LauncherPaths::new(dir.path()), LauncherSettings::default());

        let mut handle = spawn_update(ctx, UpdateRequest::install()).unwrap();
        let mut seen = Vec::new();
        let result = handle
            .wait_with(WAIT, |message| seen.push(format!("{message:?}")))
            .unwrap();

        assert!(matches!(
            result,
            Err(UpdateFailure {
                error: LauncherError::StateNotFound(_),
                ..
            })
        ));
        assert!(seen.first().is_some_and(|m| m.starts_with("Status")));
        assert!(handle.is_finished());
        assert!(handle.receiver().try_recv().is_err());
    }

    /// Forwards to the channel observer, then panics on the remote query.
    struct PanicsOnQuery<'a>(&'a dyn UpdateObserver);

    impl UpdateObserver for PanicsOnQuery<'_> {
        fn on_status(&self, status: &str) {
            self.0.on_status(status);
            if status == UpdateStage::QueryingRemote.label() {
                panic!("observer boom");
            }
        }
    }

    /// The run's result and how many further `Done` messages followed it.
    fn drain_after_done(handle: &mut UpdateHandle) -> (UpdateResult, usize) {
        let result = handle.wait(WAIT).unwrap();
        let extra_done = handle
            .receiver()
            .try_iter()
            .filter(|message| matches!(message, UpdateMessage::Done(_)))
            .count();
        (result, extra_done)
    }

    #[test]
    fn test_panic_inside_run_sends_one_done_with_fallback() {
        let dir = TempDir::new().unwrap();
        let paths = LauncherPaths::new(dir.path());
        let exe_dir = paths.version_dir("v1_0_0");
        std::fs::create_dir_all(&exe_dir).unwrap();
        std::fs::write(exe_dir.join("CrawlProgram.exe"), b"bin").unwrap();
        write_state(&paths, "http://127.0.0.1:9");
        let ctx = LauncherContext::new(paths, LauncherSettings::default());

        let mut handle = spawn_run(ctx, UpdateRequest::install(), |ctx, request, observer| {
            run_update(ctx, request, &PanicsOnQuery(observer))
        })
        .unwrap();
        let (result, extra_done) = drain_after_done(&mut handle);

        match result {
            Err(UpdateFailure {
                error: LauncherError::Unexpected(message),
                fallback_exe,
            }) => {
                assert_eq!(message, "observer boom");
                assert_eq!(fallback_exe, Some(exe_dir.join("CrawlProgram.exe")));
            }
            other => panic!("expected Unexpected, got {other:?}"),
        }
        assert_eq!(extra_done, 0);
        assert!(handle.is_finished());
        assert!(handle.receiver().try_recv().is_err());
    }

    #[test]
    fn test_panic_outside_run_still_sends_done() {
        let dir = TempDir::new().unwrap();
        let ctx = LauncherContext::new(LauncherPaths::new(dir.path()), LauncherSettings::default());

        let mut handle = spawn_run(ctx, UpdateRequest::check_only(), |_, _, observer| {
            observer.on_status("starting");
            panic!("worker boom")
        })
        .unwrap();
        let (result, extra_done) = drain_after_done(&mut handle);

        assert!(matches!(
            result,
            Err(UpdateFailure {
                error: LauncherError::Unexpected(ref message),
                fallback_exe: None,
            }) if message == "worker boom"
        ));
        assert_eq!(extra_done, 0);
        assert!(handle.receiver().try_recv().is_err());
    }

    #[test]
    fn test_supervisor_rejects_second_run() {
        // Accepts connections but never answers, so the run stays in flight
        // until the request times out.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let dir = TempDir::new().unwrap();
        let paths = LauncherPaths::new(dir.path());
        write_state(&paths, &url);
        let settings = LauncherSettings {
            latest_timeout_secs: 2,
            ..LauncherSettings::default()
        };
        let ctx = LauncherContext::new(paths, settings);

        let mut supervisor = UpdateSupervisor::new();
        supervisor.start(&ctx, UpdateRequest::check_only()).unwrap();
        assert!(supervisor.is_running());
        assert!(matches!(
            supervisor.start(&ctx, UpdateRequest::check_only()),
            Err(LauncherError::Busy)
        ));

        let result = supervisor.wait(WAIT).unwrap();
        assert!(matches!(
            result,
            Err(UpdateFailure {
                error: LauncherError::RemoteUnreachable(_),
                ..
            })
        ));
        assert!(!supervisor.is_running());
        assert!(supervisor.shutdown(Duration::from_millis(10)));
        drop(listener);
    }

    #[test]
    fn test_shutdown_when_idle() {
        let mut supervisor = UpdateSupervisor::new();
        assert!(!supervisor.is_running());
        assert!(supervisor.shutdown(Duration::from_millis(10)));
    }

    #[test]
    fn test_notice_check_reports_unreachable_server() {
        let receiver = spawn_notice_check(
            "http://127.0.0.1:9".to_string(),
            "p".to_string(),
            Duration::from_secs(2),
        )
        .unwrap();

        let result = receiver.recv_timeout(WAIT).unwrap();
        assert!(matches!(result, Err(LauncherError::RemoteUnreachable(_))));
    }
}
