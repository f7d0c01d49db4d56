// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduling daemon core: the execution engine and job registry composed
//! behind the service operations.
//!
//! The `running` map holds one kill token per `Running` job. Spawning a
//! process, the `Running` transition and the insertion into the map happen
//! under its lock, as do removal and the terminal transition. `kill`,
//! `killall` and `shutdown` take the same lock, so none of them can miss a
//! job that is starting or see one that is half finished.
//!
//! Jobs are queued in the engine keyed by their id, so a job killed while
//! still queued gives its admission slot back at once.

pub mod process;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsd_core::{Clock, JobCounts, JobId, JobRecord, JobSpec, JobStatus, SystemClock, Transition};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{Engine, EngineError, Outcome, Task};
use crate::registry::JobRegistry;
use crate::service::ServiceError;

/// Concurrency budget and termination policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Jobs allowed to run at once
    pub cores: usize,
    /// Jobs admitted (queued plus running) before `submit` waits
    pub queue_capacity: usize,
    /// Delay between SIGTERM and SIGKILL
    pub kill_grace: Duration,
}

impl SchedulerConfig {
    pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

    pub fn new(cores: usize) -> Self {
        let cores = cores.max(1);
        Self { cores, queue_capacity: cores + 1, kill_grace: Self::DEFAULT_KILL_GRACE }
    }

    jsd_core::setters! {
        set {
            queue_capacity: usize,
            kill_grace: Duration,
        }
    }
}

/// Successful outcome of a job task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub id: JobId,
    pub status: JobStatus,
    pub exit_code: Option<i32>,
}

/// A job whose process could not be spawned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("job {id}: {cause}")]
pub struct JobFailure {
    pub id: JobId,
    pub cause: String,
}

pub type JobOutcome = Outcome<JobReport, JobFailure>;

/// Result of a submission. `status` is `Cancelled` when the daemon was
/// shutting down and the job will never run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub id: JobId,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub uptime: Duration,
    pub cores: usize,
    pub capacity: usize,
    pub jobs: JobCounts,
}

struct Inner<C: Clock> {
    config: SchedulerConfig,
    engine: Engine<JobReport, JobFailure>,
    registry: Arc<JobRegistry>,
    running: Mutex<HashMap<JobId, CancellationToken>>,
    clock: C,
    started_at: Instant,
    /// Fired once a shutdown has fully drained
    stopped: CancellationToken,
}

/// Scheduling daemon. Clones share the same state.
pub struct Scheduler<C: Clock = SystemClock> {
    inner: Arc<Inner<C>>,
}

impl<C: Clock> Clone for Scheduler<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl Scheduler<SystemClock> {
    pub fn new(config: SchedulerConfig, registry: Arc<JobRegistry>) -> Self {
        Self::with_clock(config, registry, SystemClock)
    }
}

impl<C: Clock> Scheduler<C> {
    pub fn with_clock(config: SchedulerConfig, registry: Arc<JobRegistry>, clock: C) -> Self {
        let engine = Engine::new(config.cores, config.queue_capacity);
        let started_at = clock.now();
        Self {
            inner: Arc::new(Inner {
                config,
                engine,
                registry,
                running: Mutex::new(HashMap::new()),
                clock,
                started_at,
                stopped: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.inner.registry
    }

    /// Bring up the engine's worker loops.
    pub fn start(&self) -> Result<(), ServiceError> {
        self.inner.engine.start("jobs", 0).map_err(|e| match e {
            EngineError::AlreadyStarted => ServiceError::AlreadyStarted,
            EngineError::Cancelled | EngineError::Rejected => ServiceError::ShuttingDown,
        })
    }

    /// Register and enqueue a job, waiting while the engine is full.
    ///
    /// If this future is dropped while waiting, the job is cancelled.
    pub async fn submit(&self, spec: JobSpec) -> Submission {
        let inner = &self.inner;
        let id = inner.registry.insert(spec.clone(), inner.clock.epoch_ms());
        info!(job_id = %id, program = %spec.program, "job submitted");

        let mut guard = CancelOnDrop { inner: inner.as_ref(), id, armed: true };
        let task = Self::job_task(Arc::clone(inner), id, spec);
        let result = inner.engine.submit_keyed(id.0, task).await;
        guard.armed = false;

        match result {
            // Killed while waiting for a slot
            Ok(()) if inner.status_of(id) == Some(JobStatus::Cancelled) => {
                inner.engine.discard(id.0);
                Submission { id, status: JobStatus::Cancelled }
            }
            Ok(()) => Submission { id, status: JobStatus::Scheduled },
            Err(e) => {
                info!(job_id = %id, "{e}");
                inner.cancel_if_scheduled(id);
                Submission { id, status: JobStatus::Cancelled }
            }
        }
    }

    fn job_task(inner: Arc<Inner<C>>, id: JobId, spec: JobSpec) -> Task<JobReport, JobFailure> {
        Box::new(move |token| Box::pin(async move { inner.run_job(id, spec, token).await }))
    }

    /// Copies of every job record, ordered by id.
    pub fn list(&self) -> Vec<JobRecord> {
        self.inner.registry.snapshot()
    }

    /// Request termination of one job. Returns its status when the request
    /// was handled.
    ///
    /// A running job is signalled, a scheduled one is cancelled before it
    /// ever starts, a finished one is left alone.
    pub fn kill(&self, id: JobId) -> Result<JobStatus, ServiceError> {
        let inner = &self.inner;
        let running = inner.running.lock();
        if let Some(token) = running.get(&id) {
            info!(job_id = %id, "kill requested");
            token.cancel();
            return Ok(JobStatus::Running);
        }

        let record = inner.registry.get(id).ok_or(ServiceError::NoSuchJob(id))?;
        if record.status == JobStatus::Scheduled {
            info!(job_id = %id, "cancelled before start");
            inner.cancel_if_scheduled(id);
            inner.engine.discard(id.0);
        }
        Ok(record.status)
    }

    /// Request termination of every running job. Returns the ids signalled.
    pub fn killall(&self) -> Vec<JobId> {
        let running = self.inner.running.lock();
        let mut ids: Vec<JobId> = running.keys().copied().collect();
        for token in running.values() {
            token.cancel();
        }
        drop(running);

        ids.sort();
        info!(count = ids.len(), "killall");
        ids
    }

    /// Stop admission, terminate running jobs and wait until every job is
    /// terminal and the workers have exited.
    ///
    /// Idempotent; concurrent callers all wait for the same drain.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        {
            let running = inner.running.lock();
            if !inner.engine.is_cancelled() {
                info!(running = running.len(), "shutting down scheduler");
            }
            inner.engine.cancel_batch();
            for token in running.values() {
                token.cancel();
            }
        }

        inner.registry.cancel_scheduled(inner.clock.epoch_ms());
        inner.engine.join().await;
        // Anything whose submit raced the cancellation
        inner.registry.cancel_scheduled(inner.clock.epoch_ms());

        if !inner.stopped.is_cancelled() {
            inner.stopped.cancel();
            info!("scheduler stopped");
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.engine.is_cancelled()
    }

    /// Wait until a shutdown has completed.
    pub async fn join(&self) {
        self.inner.stopped.cancelled().await;
    }

    /// Drop terminal records. Returns the ids removed.
    pub fn prune(&self) -> Vec<JobId> {
        let pruned = self.inner.registry.prune_terminal();
        info!(count = pruned.len(), "pruned terminal jobs");
        pruned
    }

    pub fn status(&self) -> SchedulerStatus {
        let inner = &self.inner;
        SchedulerStatus {
            uptime: inner.clock.now().saturating_duration_since(inner.started_at),
            cores: inner.engine.workers(),
            capacity: inner.engine.capacity(),
            jobs: inner.registry.counts(),
        }
    }

    /// Next job outcome from the completion channel.
    pub async fn consume(&self) -> JobOutcome {
        self.inner.engine.consume().await
    }

    /// Log every outcome until the batch is cancelled.
    pub fn spawn_outcome_reporter(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            loop {
                match scheduler.consume().await {
                    Outcome::Completed(report) => info!(
                        job_id = %report.id,
                        status = %report.status,
                        exit_code = report.exit_code,
                        "job finished"
                    ),
                    Outcome::Failed(failure) => {
                        warn!(job_id = %failure.id, cause = %failure.cause, "job failed to start")
                    }
                    Outcome::Panicked(message) => warn!(%message, "job task panicked"),
                    Outcome::Interrupted => break,
                }
            }
            debug!("outcome reporter stopped");
        })
    }
}

impl<C: Clock> Inner<C> {
    fn status_of(&self, id: JobId) -> Option<JobStatus> {
        self.registry.get(id).map(|r| r.status)
    }

    fn cancel_if_scheduled(&self, id: JobId) {
        let cancel = Transition::Cancel { at_ms: self.clock.epoch_ms() };
        if let Err(e) = self.registry.transition(id, cancel) {
            debug!(job_id = %id, error = %e, "cancel skipped");
        }
    }

    /// Report for a dequeued job that was cancelled or killed first.
    fn skip(&self, id: JobId) -> JobReport {
        self.cancel_if_scheduled(id);
        debug!(job_id = %id, "skipping job that will not run");
        JobReport { id, status: JobStatus::Cancelled, exit_code: None }
    }

    async fn run_job(
        &self,
        id: JobId,
        spec: JobSpec,
        token: CancellationToken,
    ) -> Result<JobReport, JobFailure> {
        if token.is_cancelled() || self.status_of(id) != Some(JobStatus::Scheduled) {
            return Ok(self.skip(id));
        }
        // Opening redirect files can block, so it stays outside the lock
        let prepared = process::prepare(&spec);

        let mut child = {
            let mut running = self.running.lock();
            if token.is_cancelled() || self.status_of(id) != Some(JobStatus::Scheduled) {
                return Ok(self.skip(id));
            }

            match prepared.and_then(|mut cmd| process::spawn(&mut cmd, &spec.program)) {
                Ok(child) => {
                    let pid = child.id().unwrap_or_default();
                    let at_ms = self.clock.epoch_ms();
                    if let Err(e) = self.registry.transition(id, Transition::Start { pid, at_ms }) {
                        warn!(job_id = %id, error = %e, "failed to record start");
                    }
                    running.insert(id, token.clone());
                    info!(job_id = %id, pid, "job started");
                    child
                }
                Err(e) => {
                    let cause = e.to_string();
                    warn!(job_id = %id, %cause, "spawn failed");
                    let at_ms = self.clock.epoch_ms();
                    let fail = Transition::Fail { exit_code: None, cause: cause.clone(), at_ms };
                    if let Err(e) = self.registry.transition(id, fail) {
                        warn!(job_id = %id, error = %e, "failed to record spawn failure");
                    }
                    return Err(JobFailure { id, cause });
                }
            }
        };

        let exit = process::wait(&mut child, &token, self.config.kill_grace).await;
        let at_ms = self.clock.epoch_ms();
        let transition = match exit {
            Ok(exit) if exit.killed => Transition::Kill { exit_code: exit.status.code(), at_ms },
            Ok(exit) if exit.status.success() => Transition::Complete { at_ms },
            Ok(exit) => Transition::Fail {
                exit_code: exit.status.code(),
                cause: process::describe(exit.status),
                at_ms,
            },
            Err(e) => Transition::Fail { exit_code: None, cause: format!("wait failed: {e}"), at_ms },
        };

        let mut running = self.running.lock();
        running.remove(&id);
        let record = self.registry.transition(id, transition);
        drop(running);

        match record {
            Ok(record) => {
                info!(
                    job_id = %id,
                    status = %record.status,
                    exit_code = record.exit_code,
                    "job exited"
                );
                Ok(JobReport { id, status: record.status, exit_code: record.exit_code })
            }
            Err(e) => {
                warn!(job_id = %id, error = %e, "failed to record exit");
                Err(JobFailure { id, cause: e.to_string() })
            }
        }
    }
}

/// Cancels the job if `submit` is dropped before the engine accepted it.
struct CancelOnDrop<'a, C: Clock> {
    inner: &'a Inner<C>,
    id: JobId,
    armed: bool,
}

impl<C: Clock> Drop for CancelOnDrop<'_, C> {
    fn drop(&mut self) {
        if self.armed {
            debug!(job_id = %self.id, "submit abandoned");
            self.inner.cancel_if_scheduled(self.id);
        }
    }
}

#[cfg(test)]
#[path = "../scheduler_tests.rs"]
mod tests;
