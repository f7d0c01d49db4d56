// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OS process plumbing: spawn a job, wait for it, terminate it.
//!
//! Each job runs as the leader of its own process group so termination
//! reaches anything it forked.

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use jsd_core::JobSpec;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("Working directory {0} was not found")]
    WorkingDirNotFound(PathBuf),

    #[error("cannot open input file {path}: {source}")]
    Input { path: PathBuf, source: io::Error },

    #[error("cannot create output file {path}: {source}")]
    Output { path: PathBuf, source: io::Error },

    #[error("failed to spawn {program}: {source}")]
    Spawn { program: String, source: io::Error },
}

/// How a job's process ended.
#[derive(Debug, Clone, Copy)]
pub struct Exit {
    pub status: ExitStatus,
    /// A kill was requested before the exit was observed
    pub killed: bool,
}

/// Build the command for `spec`, opening its redirect files.
///
/// Standard error goes to the same file as standard output; without an
/// output file both are discarded. This touches the filesystem and may
/// block.
pub fn prepare(spec: &JobSpec) -> Result<Command, SpawnError> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args).envs(&spec.env).process_group(0).kill_on_drop(true);

    if let Some(cwd) = &spec.cwd {
        if !cwd.is_dir() {
            return Err(SpawnError::WorkingDirNotFound(cwd.clone()));
        }
        cmd.current_dir(cwd);
    }

    let stdin = match &spec.stdin {
        Some(path) => Stdio::from(
            File::open(path).map_err(|source| SpawnError::Input { path: path.clone(), source })?,
        ),
        None => Stdio::null(),
    };
    cmd.stdin(stdin);

    match &spec.stdout {
        Some(path) => {
            let output = |source| SpawnError::Output { path: path.clone(), source };
            let file = File::create(path).map_err(output)?;
            let err_file = file.try_clone().map_err(output)?;
            cmd.stdout(Stdio::from(file)).stderr(Stdio::from(err_file));
        }
        None => {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
    }

    Ok(cmd)
}

/// Start a prepared command.
pub fn spawn(cmd: &mut Command, program: &str) -> Result<Child, SpawnError> {
    cmd.spawn().map_err(|source| SpawnError::Spawn { program: program.to_string(), source })
}

/// Wait for `child` to exit.
///
/// When `kill` fires first the process group gets SIGTERM. Whatever is left
/// of the group after `grace`, leader or not, gets SIGKILL.
pub async fn wait(
    child: &mut Child,
    kill: &CancellationToken,
    grace: Duration,
) -> io::Result<Exit> {
    tokio::select! {
        status = child.wait() => return Ok(Exit { status: status?, killed: false }),
        _ = kill.cancelled() => {}
    }

    // Read before the leader is reaped; the group id outlives it
    let group = child.id().map(|pid| Pid::from_raw(pid as i32));
    let deadline = Instant::now() + grace;

    signal_group(group, Signal::SIGTERM);
    let status = match tokio::time::timeout_at(deadline, child.wait()).await {
        Ok(status) => status?,
        Err(_) => {
            warn!(pid = child.id(), "process ignored SIGTERM, sending SIGKILL");
            signal_group(group, Signal::SIGKILL);
            child.wait().await?
        }
    };

    while group_alive(group) {
        if Instant::now() >= deadline {
            warn!(pgid = ?group, "process group outlived its leader, sending SIGKILL");
            signal_group(group, Signal::SIGKILL);
            break;
        }
        tokio::time::sleep(GROUP_POLL).await;
    }
    Ok(Exit { status, killed: true })
}

const GROUP_POLL: Duration = Duration::from_millis(20);

fn signal_group(group: Option<Pid>, signal: Signal) {
    let Some(pgid) = group else {
        return;
    };
    debug!(%pgid, %signal, "signalling process group");
    if let Err(e) = killpg(pgid, signal) {
        debug!(%pgid, %signal, error = %e, "signal not delivered");
    }
}

/// A group id is not handed out again while any member is left.
fn group_alive(group: Option<Pid>) -> bool {
    group.is_some_and(|pgid| killpg(pgid, None).is_ok())
}

/// Human-readable reason for a non-zero exit.
pub fn describe(status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => format!("exited with code {code}"),
        (None, Some(sig)) => format!("terminated by signal {sig}"),
        (None, None) => "exited abnormally".to_string(),
    }
}
