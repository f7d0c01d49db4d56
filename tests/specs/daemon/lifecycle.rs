// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle specs
//!
//! Start, single-instance locking, status, shutdown and restart.

use crate::prelude::*;
use jsd_daemon::{startup, Config, LifecycleError, SchedulerConfig};

#[tokio::test(flavor = "multi_thread")]
async fn answers_ping_and_hello() {
    let daemon = Daemon::start(2).await;

    assert_eq!(daemon.send(Request::Ping).await, Response::Pong);
    let hello = Request::Hello { version: jsd_wire::PROTOCOL_VERSION.to_string(), token: None };
    assert_eq!(
        daemon.send(hello).await,
        Response::Hello { version: jsd_wire::PROTOCOL_VERSION.to_string() }
    );
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn writes_pid_version_and_socket() {
    let daemon = Daemon::start(1).await;
    let config = daemon.config();

    assert!(config.socket_path.exists());
    let pid = std::fs::read_to_string(&config.lock_path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());
    let version = std::fs::read_to_string(&config.version_path).unwrap();
    assert_eq!(version.trim(), jsd_wire::PROTOCOL_VERSION);
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn second_daemon_on_same_state_dir_is_refused() {
    let daemon = Daemon::start(1).await;

    let again = Config::for_state_dir(daemon.dir(), SchedulerConfig::new(1));
    let err = startup(&again).await.err().unwrap();
    assert!(matches!(err, LifecycleError::LockFailed(_)), "{err:?}");

    // The first daemon keeps its files and keeps answering
    assert!(daemon.config().socket_path.exists());
    assert_eq!(daemon.send(Request::Ping).await, Response::Pong);
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn status_reports_budget_and_counts() {
    let daemon = Daemon::start(2).await;
    let id = daemon.submit(JobSpec::new("true")).await;
    daemon.wait_for(id, JobStatus::Completed).await;

    let Response::Status { cores, capacity, jobs, .. } = daemon.send(Request::Status).await else {
        panic!("expected status");
    };
    assert_eq!(cores, 2);
    assert_eq!(capacity, 3);
    assert_eq!(jobs.completed, 1);
    assert_eq!(jobs.active(), 0);
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_removes_files_and_allows_restart() {
    let daemon = Daemon::start(1).await;
    let config = daemon.config().clone();
    let dir = daemon.stop().await;

    assert!(!config.socket_path.exists());
    assert!(!config.lock_path.exists());
    assert!(!config.version_path.exists());

    let daemon = Daemon::start_in(dir, SchedulerConfig::new(1).kill_grace(GRACE)).await;
    assert_eq!(daemon.send(Request::Ping).await, Response::Pong);
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_kills_running_jobs() {
    let daemon = Daemon::start(2).await;
    let a = daemon.submit(sleep(30)).await;
    let b = daemon.submit(sleep(30)).await;
    daemon.wait_for(a, JobStatus::Running).await;
    daemon.wait_for(b, JobStatus::Running).await;

    let started = Instant::now();
    assert_eq!(daemon.send(Request::Shutdown).await, Response::ShutDown);
    assert!(started.elapsed() < TIMEOUT);

    for record in daemon.list().await {
        assert_eq!(record.status, JobStatus::Killed, "{record:?}");
        assert!(record.pid.is_none());
    }
    daemon.stop().await;
}
