// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;

use fs2::FileExt;
use tokio::net::{TcpListener, UnixListener};
use tracing::info;

use crate::env::PROTOCOL_VERSION;
use crate::registry::JobRegistry;
use crate::scheduler::Scheduler;

use super::{Config, DaemonState, LifecycleError, StartupResult};

/// Start the daemon
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // On LockFailed the files belong to the running daemon.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    // 1. Create state directory (needed for socket, lock, etc.)
    std::fs::create_dir_all(&config.state_dir)?;

    // 2. Lock before touching anything the running daemon may own
    let lock_file = acquire_lock(&config.lock_path)?;

    // 3. Write version file
    std::fs::write(&config.version_path, PROTOCOL_VERSION)?;

    // 4. Remove stale socket and bind
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    let tcp = match config.tcp_port {
        Some(port) => {
            let tcp = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await.map_err(|e| {
                LifecycleError::BindFailed(format!("127.0.0.1:{port}").into(), e)
            })?;
            info!(port, "listening on TCP");
            Some(tcp)
        }
        None => None,
    };

    // 5. Bring up the scheduler with its own registry (LAST - nothing to undo after)
    let registry = Arc::new(JobRegistry::new());
    let scheduler = Scheduler::new(config.scheduler.clone(), registry);
    scheduler.start()?;

    info!(
        cores = config.scheduler.cores,
        capacity = config.scheduler.queue_capacity,
        "Daemon started"
    );

    Ok(StartupResult {
        daemon: DaemonState {
            config: config.clone(),
            lock_file,
            scheduler,
        },
        listener,
        tcp,
    })
}

/// Lock `path` exclusively and write our PID into it.
///
/// Opened without truncation: a failed attempt must leave the running
/// daemon's PID intact.
fn acquire_lock(path: &Path) -> Result<File, LifecycleError> {
    let mut file = OpenOptions::new().write(true).create(true).truncate(false).open(path)?;
    file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(file)
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    for path in [&config.socket_path, &config.version_path, &config.lock_path] {
        let _ = std::fs::remove_file(path);
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
