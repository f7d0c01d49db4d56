// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admission specs
//!
//! Backpressure at capacity, the concurrency budget, and submissions that
//! race a shutdown.

use crate::prelude::*;
use jsd_daemon::SchedulerConfig;

fn tight(cores: usize, capacity: usize) -> SchedulerConfig {
    SchedulerConfig::new(cores).queue_capacity(capacity).kill_grace(GRACE)
}

#[tokio::test(flavor = "multi_thread")]
async fn submit_blocks_until_capacity_frees() {
    let daemon = Daemon::start_with(tight(1, 1)).await;
    let first = daemon.submit(sleep(30)).await;
    daemon.wait_for(first, JobStatus::Running).await;

    let pending = daemon.send_detached(Request::Submit { spec: JobSpec::new("true") });
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!pending.is_finished());
    // The blocked submission already holds an id
    let jobs = daemon.list().await;
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[1].status, JobStatus::Scheduled);

    daemon.send(Request::Kill { id: first }).await;
    let Response::Submitted { id, status } = pending.await.unwrap() else {
        panic!("expected submission");
    };
    assert_eq!(status, JobStatus::Scheduled);
    assert!(id > first);
    daemon.wait_for(id, JobStatus::Completed).await;
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn killed_queued_job_gives_back_its_slot() {
    let daemon = Daemon::start_with(tight(1, 2)).await;
    let busy = daemon.submit(sleep(30)).await;
    daemon.wait_for(busy, JobStatus::Running).await;
    let waiting = daemon.submit(JobSpec::new("true")).await;
    daemon.send(Request::Kill { id: waiting }).await;

    let admitted = tokio::time::timeout(Duration::from_secs(2), daemon.submit(sleep(30)))
        .await
        .expect("submit should not wait behind a cancelled job");
    assert_eq!(daemon.job(admitted).await.status, JobStatus::Scheduled);
    assert_eq!(daemon.job(waiting).await.status, JobStatus::Cancelled);
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn running_jobs_never_exceed_cores() {
    let daemon = Daemon::start(2).await;

    let mut ids = Vec::new();
    for _ in 0..6 {
        ids.push(daemon.submit(sh("sleep 0.2")).await);
    }

    let deadline = Instant::now() + TIMEOUT;
    loop {
        let jobs = daemon.list().await;
        let running = jobs.iter().filter(|r| r.status == JobStatus::Running).count();
        assert!(running <= 2, "{running} running at once");
        if jobs.iter().all(|r| r.status == JobStatus::Completed) {
            break;
        }
        assert!(Instant::now() < deadline, "jobs did not finish: {jobs:?}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_cancels_blocked_submission() {
    let daemon = Daemon::start_with(tight(1, 1)).await;
    let first = daemon.submit(sleep(30)).await;
    daemon.wait_for(first, JobStatus::Running).await;

    let pending = daemon.send_detached(Request::Submit { spec: JobSpec::new("true") });
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(daemon.send(Request::Shutdown).await, Response::ShutDown);
    let Response::Submitted { id, status } = pending.await.unwrap() else {
        panic!("expected submission");
    };
    assert_eq!(status, JobStatus::Cancelled);

    assert_eq!(daemon.job(first).await.status, JobStatus::Killed);
    assert_eq!(daemon.job(id).await.status, JobStatus::Cancelled);
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn submit_after_shutdown_is_cancelled() {
    let daemon = Daemon::start(1).await;
    assert_eq!(daemon.send(Request::Shutdown).await, Response::ShutDown);

    let response = daemon.send(Request::Submit { spec: JobSpec::new("true") }).await;
    let Response::Submitted { status, .. } = response else {
        panic!("expected submission, got {response:?}");
    };
    assert_eq!(status, JobStatus::Cancelled);
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn second_start_is_rejected() {
    let daemon = Daemon::start(1).await;

    let response = daemon.send(Request::Start).await;
    assert!(
        matches!(response, Response::Error { kind: ErrorKind::AlreadyStarted, .. }),
        "{response:?}"
    );
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn prune_forgets_finished_jobs_only() {
    let daemon = Daemon::start(1).await;
    let done = daemon.submit(JobSpec::new("true")).await;
    daemon.wait_for(done, JobStatus::Completed).await;
    let live = daemon.submit(sleep(30)).await;
    daemon.wait_for(live, JobStatus::Running).await;

    assert_eq!(daemon.send(Request::Prune).await, Response::Pruned { pruned: vec![done] });
    let ids: Vec<JobId> = daemon.list().await.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![live]);
    daemon.stop().await;
}
