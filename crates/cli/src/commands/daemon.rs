// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `jsd daemon` - Daemon management commands

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};

use super::reachable_client;
use crate::client::DaemonClient;
use crate::output::{format_or_json, OutputFormat};

/// How long `daemon start` waits for the socket to answer.
const START_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon (background unless --foreground)
    Start {
        /// Number of jobs allowed to run at once
        #[arg(long)]
        cores: Option<usize>,
        /// Maximum number of queued plus running jobs
        #[arg(long)]
        capacity: Option<usize>,
        /// Run in foreground (useful for debugging)
        #[arg(long)]
        foreground: bool,
    },
    /// Stop the daemon after killing its jobs
    Stop,
    /// Check daemon status
    Status,
}

pub async fn daemon(args: DaemonArgs, format: OutputFormat) -> Result<()> {
    match args.command {
        DaemonCommand::Start { cores, capacity, foreground } => {
            start(cores, capacity, foreground).await
        }
        DaemonCommand::Stop => stop().await,
        DaemonCommand::Status => status(format).await,
    }
}

fn daemon_command(cores: Option<usize>, capacity: Option<usize>) -> Command {
    let mut cmd = Command::new(find_jsdd_binary());
    if let Some(cores) = cores {
        cmd.env("JSD_CORES", cores.to_string());
    }
    if let Some(capacity) = capacity {
        cmd.env("JSD_QUEUE_CAPACITY", capacity.to_string());
    }
    cmd
}

async fn start(cores: Option<usize>, capacity: Option<usize>, foreground: bool) -> Result<()> {
    if let Ok(client) = DaemonClient::connect() {
        if let Ok(status) = client.status().await {
            println!("Daemon already running (uptime: {})", format_uptime(status.uptime_secs));
            return Ok(());
        }
    }

    if foreground {
        let status = daemon_command(cores, capacity).status()?;
        if !status.success() {
            return Err(anyhow!("Daemon exited with status: {}", status));
        }
        return Ok(());
    }

    let mut child = daemon_command(cores, capacity)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| anyhow!("failed to launch jsdd: {}", e))?;

    let client = DaemonClient::connect().map_err(|e| anyhow!("{}", e))?;
    let deadline = Instant::now() + START_TIMEOUT;
    loop {
        if let Some(status) = child.try_wait()? {
            return Err(anyhow!("Daemon exited during startup ({}); see its log", status));
        }
        if client.ping().await.is_ok() {
            println!("Daemon started");
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(anyhow!(
                "Daemon did not answer on {} within {}s",
                client.socket_path().display(),
                START_TIMEOUT.as_secs()
            ));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn stop() -> Result<()> {
    let client = reachable_client().await?;
    match client.shutdown().await {
        Ok(()) => {}
        // The daemon may exit before the response is flushed.
        Err(e) if e.is_not_running() => {}
        Err(e) => return Err(anyhow!("Failed to stop daemon: {}", e)),
    }

    let deadline = Instant::now() + START_TIMEOUT;
    while client.socket_path().exists() && Instant::now() < deadline {
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    println!("Daemon stopped");
    Ok(())
}

async fn status(format: OutputFormat) -> Result<()> {
    let client = reachable_client().await?;
    let status = client.status().await?;
    let version = client.hello().await.unwrap_or_else(|_| "unknown".to_string());

    let obj = serde_json::json!({
        "status": "running",
        "version": version,
        "uptime_secs": status.uptime_secs,
        "uptime": format_uptime(status.uptime_secs),
        "cores": status.cores,
        "capacity": status.capacity,
        "jobs": status.jobs,
    });
    format_or_json(format, &obj, || {
        let jobs = status.jobs;
        println!("Status: running");
        println!("Version: {}", version);
        println!("Uptime: {}", format_uptime(status.uptime_secs));
        println!("Cores: {} (capacity {})", status.cores, status.capacity);
        println!(
            "Jobs: {} running, {} scheduled, {} finished",
            jobs.running,
            jobs.scheduled,
            jobs.total() - jobs.active()
        );
    })
}

pub(crate) fn format_uptime(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    match (hours, mins) {
        (0, 0) => format!("{}s", secs),
        (0, _) => format!("{}m {}s", mins, secs),
        _ => format!("{}h {}m {}s", hours, mins, secs),
    }
}

/// `jsdd` next to this executable, else whatever `PATH` finds.
fn find_jsdd_binary() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("jsdd")))
        .filter(|sibling| sibling.exists())
        .unwrap_or_else(|| PathBuf::from("jsdd"))
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
