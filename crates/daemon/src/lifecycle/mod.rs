// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, signals.

mod startup;
pub use startup::startup;

use std::fs::File;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::net::{TcpListener, UnixListener};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::scheduler::{Scheduler, SchedulerConfig};
use crate::service::ServiceError;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/jsd)
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to version file
    pub version_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Also listen on 127.0.0.1 at this port
    pub tcp_port: Option<u16>,
    /// Token TCP clients must present in `Hello`
    pub auth_token: Option<String>,
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = crate::env::state_dir()?;
        let mut config = Self::for_state_dir(state_dir, crate::env::scheduler_config());
        config.tcp_port = crate::env::tcp_port();
        config.auth_token = crate::env::auth_token();
        Ok(config)
    }

    /// Configuration rooted at `state_dir`, Unix socket only.
    pub fn for_state_dir(state_dir: impl Into<PathBuf>, scheduler: SchedulerConfig) -> Self {
        let state_dir = state_dir.into();
        Self {
            socket_path: state_dir.join("daemon.sock"),
            lock_path: state_dir.join("daemon.pid"),
            version_path: state_dir.join("daemon.version"),
            log_path: state_dir.join("daemon.log"),
            tcp_port: None,
            auth_token: None,
            scheduler,
            state_dir,
        }
    }
}

/// Daemon state during operation.
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub scheduler: Scheduler,
}

/// Result of daemon startup: the daemon state plus the sockets to serve.
pub struct StartupResult {
    pub daemon: DaemonState,
    pub listener: UnixListener,
    pub tcp: Option<TcpListener>,
}

impl DaemonState {
    /// Drain the scheduler, then remove the socket, PID and version files.
    ///
    /// The lock is released when `self` is dropped.
    pub async fn shutdown(&mut self) {
        info!("Shutting down daemon...");

        self.scheduler.shutdown().await;

        remove_if_exists(&self.config.socket_path, "socket");
        remove_if_exists(&self.config.lock_path, "PID");
        remove_if_exists(&self.config.version_path, "version");

        info!("Daemon shutdown complete");
    }
}

fn remove_if_exists(path: &Path, what: &str) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove {} file: {}", what, e);
        }
    }
}

/// Returns a token cancelled on the first SIGTERM or SIGINT.
pub fn install_signal_handler() -> Result<CancellationToken, LifecycleError> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let token = CancellationToken::new();
    let fired = token.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down"),
        }
        fired.cancel();
    });

    Ok(token)
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Failed to start scheduler: {0}")]
    Service(#[from] ServiceError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
