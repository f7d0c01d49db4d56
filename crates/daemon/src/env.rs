// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;
use crate::scheduler::SchedulerConfig;

pub use jsd_wire::PROTOCOL_VERSION;

/// Resolve state directory: JSD_STATE_DIR > XDG_STATE_HOME/jsd > ~/.local/state/jsd
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("JSD_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("jsd"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/jsd"))
}

fn millis(var: &str) -> Option<Duration> {
    std::env::var(var).ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

fn positive(var: &str) -> Option<usize> {
    std::env::var(var).ok().and_then(|s| s.trim().parse::<usize>().ok()).filter(|n| *n > 0)
}

/// Default IPC timeout
pub fn ipc_timeout() -> Duration {
    millis("JSD_IPC_TIMEOUT_MS").unwrap_or(Duration::from_secs(5))
}

/// TCP port for remote connections. When set, the daemon listens on this port
/// in addition to the Unix socket.
pub fn tcp_port() -> Option<u16> {
    std::env::var("JSD_TCP_PORT").ok().and_then(|s| s.parse::<u16>().ok())
}

/// Auth token for TCP connections, validated in the Hello handshake.
pub fn auth_token() -> Option<String> {
    std::env::var("JSD_AUTH_TOKEN").ok().filter(|s| !s.is_empty())
}

/// Concurrency budget. Unset, zero or unparsable means every available core.
pub fn cores() -> usize {
    positive("JSD_CORES").unwrap_or_else(available_cores)
}

pub fn available_cores() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Admission capacity (default `cores + 1`).
pub fn queue_capacity(cores: usize) -> usize {
    positive("JSD_QUEUE_CAPACITY").unwrap_or(cores + 1)
}

/// Delay between SIGTERM and SIGKILL (default 5s).
pub fn kill_grace() -> Duration {
    millis("JSD_KILL_GRACE_MS").unwrap_or(SchedulerConfig::DEFAULT_KILL_GRACE)
}

/// Scheduler settings from the environment.
pub fn scheduler_config() -> SchedulerConfig {
    let cores = cores();
    SchedulerConfig::new(cores).queue_capacity(queue_capacity(cores)).kill_grace(kill_grace())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
