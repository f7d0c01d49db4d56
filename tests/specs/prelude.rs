// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for the specs.

use std::path::Path;
use std::sync::Arc;

pub use std::time::{Duration, Instant};

pub use jsd_core::{JobId, JobRecord, JobSpec, JobStatus};
use jsd_daemon::{startup, Config, DaemonState, ListenCtx, Listener, SchedulerConfig, StartupResult};
pub use jsd_wire::{ErrorKind, Request, Response};
use tempfile::TempDir;
use tokio::net::UnixStream;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Kill grace short enough to keep escalation specs fast.
pub const GRACE: Duration = Duration::from_millis(300);

/// A running daemon plus the state directory it owns.
pub struct Daemon {
    dir: TempDir,
    config: Config,
    state: Option<DaemonState>,
}

impl Daemon {
    pub async fn start(cores: usize) -> Self {
        Self::start_with(SchedulerConfig::new(cores).kill_grace(GRACE)).await
    }

    pub async fn start_with(scheduler: SchedulerConfig) -> Self {
        Self::start_in(tempfile::tempdir().unwrap(), scheduler).await
    }

    pub async fn start_in(dir: TempDir, scheduler: SchedulerConfig) -> Self {
        let config = Config::for_state_dir(dir.path(), scheduler);
        let StartupResult { daemon, listener, .. } = startup(&config).await.unwrap();

        let ctx = Arc::new(ListenCtx {
            service: Arc::new(daemon.scheduler.clone()),
            shutdown: Arc::new(Notify::new()),
            auth_token: None,
        });
        tokio::spawn(Listener::new(listener, ctx).run());

        Self { dir, config, state: Some(daemon) }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub async fn send(&self, request: Request) -> Response {
        send(&self.config.socket_path, request).await
    }

    /// Send a request from its own task, for requests expected to block.
    pub fn send_detached(&self, request: Request) -> JoinHandle<Response> {
        let socket = self.config.socket_path.clone();
        tokio::spawn(async move { send(&socket, request).await })
    }

    pub async fn submit(&self, spec: JobSpec) -> JobId {
        match self.send(Request::Submit { spec }).await {
            Response::Submitted { id, status: JobStatus::Scheduled } => id,
            other => panic!("submission not accepted: {other:?}"),
        }
    }

    pub async fn list(&self) -> Vec<JobRecord> {
        match self.send(Request::List).await {
            Response::Jobs { jobs } => jobs,
            other => panic!("expected job list, got {other:?}"),
        }
    }

    pub async fn job(&self, id: JobId) -> JobRecord {
        self.list().await.into_iter().find(|r| r.id == id).unwrap()
    }

    /// Poll until job `id` reaches `status`.
    pub async fn wait_for(&self, id: JobId, status: JobStatus) -> JobRecord {
        let deadline = Instant::now() + TIMEOUT;
        loop {
            let record = self.job(id).await;
            if record.status == status {
                return record;
            }
            assert!(
                Instant::now() < deadline,
                "job {id} stuck in {} waiting for {status}",
                record.status
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Shut down through the socket, then remove the daemon's files.
    /// Returns the state directory for a restart.
    pub async fn stop(mut self) -> TempDir {
        assert_eq!(self.send(Request::Shutdown).await, Response::ShutDown);
        if let Some(mut state) = self.state.take() {
            state.shutdown().await;
        }
        self.dir
    }
}

/// One request per connection. The answer to a blocked `Submit` or a
/// draining `Shutdown` may take longer than [`TIMEOUT`].
pub async fn send(socket: &Path, request: Request) -> Response {
    let mut stream = UnixStream::connect(socket).await.unwrap();
    jsd_wire::write_request(&mut stream, &request, TIMEOUT).await.unwrap();
    let bytes = jsd_wire::read_message(&mut stream).await.unwrap();
    jsd_wire::decode(&bytes).unwrap()
}

pub fn sh(script: &str) -> JobSpec {
    JobSpec::new("sh").arg("-c").arg(script)
}

pub fn sleep(secs: u32) -> JobSpec {
    JobSpec::new("sleep").arg(secs.to_string())
}
