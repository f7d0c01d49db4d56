// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kill specs
//!
//! Killing running and scheduled jobs, killall, and SIGKILL escalation.

use crate::prelude::*;

#[tokio::test(flavor = "multi_thread")]
async fn kill_running_job() {
    let daemon = Daemon::start(1).await;
    let id = daemon.submit(sleep(30)).await;
    daemon.wait_for(id, JobStatus::Running).await;

    let response = daemon.send(Request::Kill { id }).await;
    assert_eq!(response, Response::Killed { id, status: JobStatus::Running });

    let record = daemon.wait_for(id, JobStatus::Killed).await;
    assert!(record.pid.is_none());
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn kill_unknown_job_is_an_error() {
    let daemon = Daemon::start(1).await;

    let response = daemon.send(Request::Kill { id: JobId(404) }).await;
    assert!(
        matches!(response, Response::Error { kind: ErrorKind::NoSuchJob, .. }),
        "{response:?}"
    );
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn kill_scheduled_job_cancels_it() {
    let daemon = Daemon::start(1).await;
    let busy = daemon.submit(sleep(30)).await;
    daemon.wait_for(busy, JobStatus::Running).await;
    let waiting = daemon.submit(JobSpec::new("true")).await;

    let response = daemon.send(Request::Kill { id: waiting }).await;
    assert_eq!(response, Response::Killed { id: waiting, status: JobStatus::Scheduled });
    daemon.wait_for(waiting, JobStatus::Cancelled).await;

    // Freeing the worker must not resurrect the cancelled job
    daemon.send(Request::Kill { id: busy }).await;
    daemon.wait_for(busy, JobStatus::Killed).await;
    let record = daemon.job(waiting).await;
    assert_eq!(record.status, JobStatus::Cancelled);
    assert!(record.started_at_ms.is_none());
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn kill_finished_job_leaves_it_alone() {
    let daemon = Daemon::start(1).await;
    let id = daemon.submit(JobSpec::new("true")).await;
    daemon.wait_for(id, JobStatus::Completed).await;

    let response = daemon.send(Request::Kill { id }).await;
    assert_eq!(response, Response::Killed { id, status: JobStatus::Completed });
    assert_eq!(daemon.job(id).await.status, JobStatus::Completed);
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn killall_signals_every_running_job() {
    let daemon = Daemon::start(2).await;
    let a = daemon.submit(sleep(30)).await;
    let b = daemon.submit(sleep(30)).await;
    daemon.wait_for(a, JobStatus::Running).await;
    daemon.wait_for(b, JobStatus::Running).await;

    let response = daemon.send(Request::KillAll).await;
    assert_eq!(response, Response::KilledAll { signalled: vec![a, b] });

    daemon.wait_for(a, JobStatus::Killed).await;
    daemon.wait_for(b, JobStatus::Killed).await;
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn job_ignoring_sigterm_is_killed_after_grace() {
    let daemon = Daemon::start(1).await;
    let ready = daemon.dir().join("ready");
    let script = format!("trap '' TERM; touch {}; sleep 30", ready.display());
    let id = daemon.submit(sh(&script)).await;

    daemon.wait_for(id, JobStatus::Running).await;
    let deadline = Instant::now() + TIMEOUT;
    while !ready.exists() {
        assert!(Instant::now() < deadline, "trap was never installed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let killed_at = Instant::now();
    daemon.send(Request::Kill { id }).await;
    let record = daemon.wait_for(id, JobStatus::Killed).await;

    assert!(killed_at.elapsed() >= GRACE);
    assert!(record.pid.is_none());
    daemon.stop().await;
}
