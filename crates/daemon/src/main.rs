// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `jsdd`: the job scheduling daemon.
//!
//! Prints `READY` on stdout once the socket accepts connections, then runs
//! until a `Shutdown` request, SIGTERM or SIGINT.

use std::process::ExitCode;
use std::sync::Arc;

use jsd_daemon::lifecycle::install_signal_handler;
use jsd_daemon::{logging, startup, Config, LifecycleError, ListenCtx, Listener, StartupResult};
use tokio::sync::Notify;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("jsdd: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = match logging::init(&config.log_path) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("jsdd: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("daemon failed: {e}");
            eprintln!("jsdd: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), LifecycleError> {
    let signals = install_signal_handler()?;
    let StartupResult { mut daemon, listener, tcp } = startup(&config).await?;

    let shutdown = Arc::new(Notify::new());
    let ctx = Arc::new(ListenCtx {
        service: Arc::new(daemon.scheduler.clone()),
        shutdown: Arc::clone(&shutdown),
        auth_token: config.auth_token.clone(),
    });
    let listener = match tcp {
        Some(tcp) => Listener::with_tcp(listener, tcp, ctx),
        None => Listener::new(listener, ctx),
    };
    tokio::spawn(listener.run());
    let reporter = daemon.scheduler.spawn_outcome_reporter();

    println!("READY");
    info!(pid = std::process::id(), socket = %config.socket_path.display(), "daemon ready");

    tokio::select! {
        _ = shutdown.notified() => info!("shutdown requested by client"),
        _ = signals.cancelled() => {}
    }

    daemon.shutdown().await;
    let _ = reporter.await;
    Ok(())
}
