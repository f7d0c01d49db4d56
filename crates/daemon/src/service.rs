// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service contract exposed to transports.
//!
//! The listener only talks to the daemon through these traits, so any
//! transport (Unix socket, TCP, in-process) sees the same operations.

use async_trait::async_trait;
use jsd_core::{Clock, JobId, JobRecord, JobSpec, JobStatus};
use jsd_wire::ErrorKind;
use thiserror::Error;

use crate::scheduler::{Scheduler, SchedulerStatus, Submission};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("no such job: {0}")]
    NoSuchJob(JobId),

    #[error("daemon already started")]
    AlreadyStarted,

    #[error("daemon is shutting down")]
    ShuttingDown,
}

impl ServiceError {
    /// Wire category for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::NoSuchJob(_) => ErrorKind::NoSuchJob,
            ServiceError::AlreadyStarted => ErrorKind::AlreadyStarted,
            ServiceError::ShuttingDown => ErrorKind::ShuttingDown,
        }
    }
}

/// Job operations every transport exposes.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Bring up the execution engine.
    async fn start(&self) -> Result<(), ServiceError>;

    /// Register a job; waits while the engine is full.
    async fn submit(&self, spec: JobSpec) -> Result<Submission, ServiceError>;

    async fn list(&self) -> Vec<JobRecord>;

    async fn kill(&self, id: JobId) -> Result<JobStatus, ServiceError>;

    async fn killall(&self) -> Vec<JobId>;

    /// Stop admission and wait for every job to finish. Idempotent.
    async fn shutdown(&self);
}

/// Daemon housekeeping on top of the job operations.
#[async_trait]
pub trait DaemonService: JobService {
    async fn status(&self) -> SchedulerStatus;

    async fn prune(&self) -> Vec<JobId>;
}

#[async_trait]
impl<C: Clock> JobService for Scheduler<C> {
    async fn start(&self) -> Result<(), ServiceError> {
        Scheduler::start(self)
    }

    async fn submit(&self, spec: JobSpec) -> Result<Submission, ServiceError> {
        Ok(Scheduler::submit(self, spec).await)
    }

    async fn list(&self) -> Vec<JobRecord> {
        Scheduler::list(self)
    }

    async fn kill(&self, id: JobId) -> Result<JobStatus, ServiceError> {
        Scheduler::kill(self, id)
    }

    async fn killall(&self) -> Vec<JobId> {
        Scheduler::killall(self)
    }

    async fn shutdown(&self) {
        Scheduler::shutdown(self).await
    }
}

#[async_trait]
impl<C: Clock> DaemonService for Scheduler<C> {
    async fn status(&self) -> SchedulerStatus {
        Scheduler::status(self)
    }

    async fn prune(&self) -> Vec<JobId> {
        Scheduler::prune(self)
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
