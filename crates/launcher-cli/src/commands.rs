use std::io;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use tracing::{debug, info, info_span, warn};

use launcher_cli::console::{confirm, format_notice};
use launcher_cli::progress::UpdateProgressView;
use launcher_core::steps::launch;
use launcher_core::{
    BaseDirStrategy, CurrentState, LauncherContext, LauncherError, LauncherPaths, NoticeAckStore,
    NoticeInfo, UpdateFailure, UpdateOutcome, UpdateRequest, UpdateResult, UpdateSupervisor,
    spawn_notice_check, state,
};

use crate::cli::{NoticeArgs, RunArgs};
use crate::summary::{StatusReport, print_status};

/// How often the console is refreshed while a run is in flight.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Extra time granted to the notice thread beyond its request timeout.
const NOTICE_GRACE: Duration = Duration::from_secs(1);

pub fn load_context(base_dir: Option<&Path>) -> Result<LauncherContext> {
    let strategy = base_dir.map_or_else(BaseDirStrategy::detect, |dir| {
        BaseDirStrategy::Explicit(dir.to_path_buf())
    });
    let paths = LauncherPaths::from_strategy(&strategy).context("resolve base directory")?;
    paths
        .ensure_dirs()
        .with_context(|| format!("prepare {}", paths.base_dir.display()))?;
    debug!(base_dir = %paths.base_dir.display(), "Base directory resolved");
    LauncherContext::load(paths).context("load launcher settings")
}

pub fn run_launch(ctx: &LauncherContext, args: &RunArgs, show_log: bool) -> Result<i32> {
    let span = info_span!("launch", yes = args.yes, no_launch = args.no_launch);
    let _guard = span.enter();

    show_pending_notice(ctx);

    let mut supervisor = UpdateSupervisor::new();
    let request = if args.yes {
        UpdateRequest::install()
    } else {
        UpdateRequest::check_only()
    };
    let mut result = run_with_progress(&mut supervisor, ctx, request, show_log)?;

    let question = match &result {
        Ok(UpdateOutcome::UpdateAvailable {
            local_version,
            latest_version,
            ..
        }) => Some(format!(
            "Version {latest_version} is available (installed: {local_version}). Install now?"
        )),
        _ => None,
    };
    if let Some(question) = question {
        let accepted = confirm(&mut io::stdin().lock(), &mut io::stdout(), &question)
            .context("read answer")?;
        if accepted {
            result = run_with_progress(&mut supervisor, ctx, UpdateRequest::install(), show_log)?;
        }
    }

    let update_failed = result.is_err();
    let exe = match &result {
        Ok(outcome) => {
            report_outcome(outcome);
            outcome.exe_path().map(Path::to_path_buf)
        }
        Err(failure) => {
            report_failure(failure);
            failure.fallback_exe.clone()
        }
    };

    if args.no_launch {
        return Ok(i32::from(update_failed));
    }

    let exe = exe.ok_or_else(|| anyhow!("no installed program to start"))?;
    if update_failed {
        println!("Starting the previously installed version.");
    }
    info!(exe = %exe.display(), wait = args.wait, "Starting program");
    let code = launch::run(&exe, None, args.wait)
        .with_context(|| format!("start {}", exe.display()))?;

    Ok(match code {
        Some(code) => code,
        // Killed by a signal while we waited.
        None if args.wait => 1,
        None => 0,
    })
}

pub fn run_check(ctx: &LauncherContext, show_log: bool) -> Result<i32> {
    let mut supervisor = UpdateSupervisor::new();
    let result = run_with_progress(&mut supervisor, ctx, UpdateRequest::check_only(), show_log)?;

    match result {
        Ok(outcome) => {
            print_check(&outcome);
            Ok(0)
        }
        Err(failure) => {
            report_failure(&failure);
            Ok(1)
        }
    }
}

pub fn run_notice(ctx: &LauncherContext, args: &NoticeArgs) -> Result<i32> {
    let local = state::read(&ctx.paths.current_json).context("read installed state")?;
    let Some(notice) = fetch_notice(ctx, &local).context("fetch notice")? else {
        println!("No notices.");
        return Ok(0);
    };

    println!("{}", format_notice(&notice));

    if args.hide_today {
        if notice.force {
            println!("This notice cannot be hidden.");
        } else {
            NoticeAckStore::new(ctx.paths.notice_ack_json())
                .hide_for_day(&notice.notice_id)
                .context("save notice acknowledgement")?;
            println!("Hidden for one day.");
        }
    }
    Ok(0)
}

pub fn run_status(ctx: &LauncherContext) -> Result<i32> {
    let report = StatusReport {
        state: state::read(&ctx.paths.current_json),
        installed: ctx
            .paths
            .installed_versions()
            .context("list installed versions")?,
    };
    print_status(ctx, &report);
    Ok(i32::from(report.state.is_err()))
}

fn run_with_progress(
    supervisor: &mut UpdateSupervisor,
    ctx: &LauncherContext,
    request: UpdateRequest,
    show_log: bool,
) -> Result<UpdateResult> {
    let view = UpdateProgressView::new(show_log);
    let handle = supervisor.start(ctx, request).context("start update")?;

    loop {
        if let Some(result) = handle.wait_with(POLL_INTERVAL, |message| view.handle(message)) {
            view.finish();
            return Ok(result);
        }
    }
}

fn fetch_notice(
    ctx: &LauncherContext,
    local: &CurrentState,
) -> launcher_core::Result<Option<NoticeInfo>> {
    let timeout = ctx.settings.notice_timeout();
    let receiver =
        spawn_notice_check(local.server_url.clone(), local.program_id.clone(), timeout)?;
    receiver.recv_timeout(timeout + NOTICE_GRACE).unwrap_or_else(|_| {
        Err(LauncherError::RemoteUnreachable(
            "notice check timed out".to_string(),
        ))
    })
}

/// Print the latest notice unless the user hid it. Never fails the launch.
fn show_pending_notice(ctx: &LauncherContext) {
    let Ok(local) = state::read(&ctx.paths.current_json) else {
        return;
    };

    match fetch_notice(ctx, &local) {
        Ok(Some(notice)) => {
            let store = NoticeAckStore::new(ctx.paths.notice_ack_json());
            if store.should_show(&notice, Utc::now()) {
                println!("{}", format_notice(&notice));
                println!();
            } else {
                debug!(notice_id = %notice.notice_id, "Notice hidden by acknowledgement");
            }
        }
        Ok(None) => {}
        Err(error) => warn!(%error, "Notice check failed"),
    }
}

fn print_check(outcome: &UpdateOutcome) {
    match outcome {
        UpdateOutcome::UpToDate { version, .. } => {
            println!("Installed: {version}");
            println!("Latest:    {version}");
            println!("Up to date.");
        }
        UpdateOutcome::LocalNewer {
            local_version,
            remote_version,
            ..
        } => {
            println!("Installed: {local_version}");
            println!("Latest:    {remote_version}");
            println!("The installed version is newer than the server's; nothing to do.");
        }
        UpdateOutcome::UpdateAvailable {
            local_version,
            latest_version,
            asset_url,
            ..
        } => {
            println!("Installed: {local_version}");
            println!("Latest:    {latest_version}");
            if let Some(url) = asset_url {
                println!("Package:   {url}");
            }
            println!("An update is available. Run `launcher update` to install it.");
        }
        UpdateOutcome::Installed { .. } => println!("{outcome}"),
    }
}

fn report_outcome(outcome: &UpdateOutcome) {
    match outcome {
        UpdateOutcome::UpdateAvailable {
            local_version,
            latest_version,
            ..
        } => println!("Skipped {latest_version}; keeping {local_version}."),
        UpdateOutcome::Installed {
            previous_version,
            version,
            ..
        } => println!("Updated {previous_version} -> {version}."),
        UpdateOutcome::UpToDate { .. } | UpdateOutcome::LocalNewer { .. } => {
            info!(%outcome, "No update needed");
        }
    }
}

fn report_failure(failure: &UpdateFailure) {
    warn!(error = %failure.error, "Update failed");
    eprintln!("error: {}", failure.error.user_message());
    eprintln!("  cause: {}", failure.error);
    if failure.error.is_retryable() {
        eprintln!("  The problem may be temporary; try again later.");
    }
}
