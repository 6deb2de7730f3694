//! Starting the installed program.

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::info;

use crate::error::{LauncherError, Result};

#[cfg(windows)]
const DETACHED_PROCESS: u32 = 0x0000_0008;
#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// Start `exe_path` as an independent process.
///
/// The working directory defaults to the executable's parent. With `wait`
/// the call blocks and returns the exit code; otherwise it returns `None`
/// as soon as the process is spawned, and the program keeps running after
/// the launcher exits.
pub fn run(exe_path: &Path, workdir: Option<&Path>, wait: bool) -> Result<Option<i32>> {
    if !exe_path.is_file() {
        return Err(LauncherError::LaunchFailed(format!(
            "exe not found: {}",
            exe_path.display()
        )));
    }

    let cwd = workdir
        .or_else(|| exe_path.parent())
        .unwrap_or_else(|| Path::new("."));

    let mut command = Command::new(exe_path);
    command.current_dir(cwd);

    if wait {
        info!(exe = %exe_path.display(), "Running and waiting for exit");
        let status = command
            .status()
            .map_err(|e| LauncherError::LaunchFailed(format!("run failed: {e}")))?;
        return Ok(status.code());
    }

    detach(&mut command);
    command
        .spawn()
        .map_err(|e| LauncherError::LaunchFailed(format!("run failed: {e}")))?;
    info!(exe = %exe_path.display(), "Launched");
    Ok(None)
}

fn detach(command: &mut Command) {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }
}
