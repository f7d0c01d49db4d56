// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job execution specs
//!
//! What a submitted program sees and how its exit is recorded.

use crate::prelude::*;

#[tokio::test(flavor = "multi_thread")]
async fn output_file_receives_stdout_and_stderr() {
    let daemon = Daemon::start(2).await;
    let out = daemon.dir().join("out.txt");

    let id = daemon.submit(sh("echo to-stdout; echo to-stderr >&2").stdout(out.clone())).await;
    let record = daemon.wait_for(id, JobStatus::Completed).await;

    assert_eq!(record.exit_code, Some(0));
    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.contains("to-stdout"), "{text}");
    assert!(text.contains("to-stderr"), "{text}");
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn input_env_and_workdir_reach_the_process() {
    let daemon = Daemon::start(1).await;
    let input = daemon.dir().join("in.txt");
    let out = daemon.dir().join("out.txt");
    let workdir = daemon.dir().join("work");
    std::fs::write(&input, "from-stdin\n").unwrap();
    std::fs::create_dir(&workdir).unwrap();

    let spec = sh("cat; echo \"$GREETING\"; pwd")
        .env("GREETING", "hello")
        .stdin(input)
        .stdout(out.clone())
        .cwd(workdir.clone());
    let id = daemon.submit(spec).await;
    daemon.wait_for(id, JobStatus::Completed).await;

    let text = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "from-stdin");
    assert_eq!(lines[1], "hello");
    assert!(lines[2].ends_with("/work"), "{text}");
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn nonzero_exit_is_failed_with_code() {
    let daemon = Daemon::start(1).await;

    let id = daemon.submit(sh("exit 4")).await;
    let record = daemon.wait_for(id, JobStatus::Failed).await;

    assert_eq!(record.exit_code, Some(4));
    assert!(record.pid.is_none());
    assert!(record.ended_at_ms.is_some());
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn spawn_failure_is_failed_without_a_pid() {
    let daemon = Daemon::start(1).await;

    let id = daemon.submit(JobSpec::new("/nonexistent/jsd-no-such-program")).await;
    let record = daemon.wait_for(id, JobStatus::Failed).await;

    assert!(record.pid.is_none());
    assert!(record.started_at_ms.is_none());
    let cause = record.failure.unwrap();
    assert!(cause.contains("failed to spawn"), "{cause}");
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_workdir_is_a_spawn_failure() {
    let daemon = Daemon::start(1).await;
    let missing = daemon.dir().join("nowhere");

    let id = daemon.submit(JobSpec::new("true").cwd(missing)).await;
    let record = daemon.wait_for(id, JobStatus::Failed).await;

    let cause = record.failure.unwrap();
    assert!(cause.contains("was not found"), "{cause}");
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_program_is_an_invalid_request() {
    let daemon = Daemon::start(1).await;

    let response = daemon.send(Request::Submit { spec: JobSpec::new("  ") }).await;
    assert!(
        matches!(response, Response::Error { kind: ErrorKind::InvalidRequest, .. }),
        "{response:?}"
    );
    assert!(daemon.list().await.is_empty());
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn ids_follow_submission_order() {
    let daemon = Daemon::start(2).await;

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(daemon.submit(JobSpec::new("true")).await);
    }
    assert!(ids.windows(2).all(|w| w[0] < w[1]), "{ids:?}");

    for id in &ids {
        daemon.wait_for(*id, JobStatus::Completed).await;
    }
    let listed: Vec<JobId> = daemon.list().await.iter().map(|r| r.id).collect();
    assert_eq!(listed, ids);
    daemon.stop().await;
}
