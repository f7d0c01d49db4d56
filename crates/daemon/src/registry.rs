// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job registry: the single source of truth for job status.
//!
//! Records live behind one `RwLock`; every mutation happens under the write
//! lock, so readers only ever see records between transitions.

use std::collections::BTreeMap;

use jsd_core::{
    JobCounts, JobId, JobIdGen, JobRecord, JobSpec, JobStatus, Transition, TransitionError,
};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no such job: {0}")]
    NoSuchJob(JobId),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Concurrency-safe map from job id to record.
#[derive(Debug, Default)]
pub struct JobRegistry {
    ids: JobIdGen,
    records: RwLock<BTreeMap<JobId, JobRecord>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new `Scheduled` record under a fresh id.
    pub fn insert(&self, spec: JobSpec, at_ms: u64) -> JobId {
        let id = self.ids.next();
        self.records.write().insert(id, JobRecord::new(id, spec, at_ms));
        id
    }

    /// Apply a transition and return the updated record.
    pub fn transition(&self, id: JobId, transition: Transition) -> Result<JobRecord, RegistryError> {
        let mut records = self.records.write();
        let record = records.get_mut(&id).ok_or(RegistryError::NoSuchJob(id))?;
        record.apply(transition)?;
        debug!(job_id = %id, status = %record.status, "job transitioned");
        Ok(record.clone())
    }

    pub fn get(&self, id: JobId) -> Option<JobRecord> {
        self.records.read().get(&id).cloned()
    }

    /// Point-in-time copy of every record, ordered by id.
    pub fn snapshot(&self) -> Vec<JobRecord> {
        self.records.read().values().cloned().collect()
    }

    /// Move every `Scheduled` record to `Cancelled`. Returns the ids moved.
    pub fn cancel_scheduled(&self, at_ms: u64) -> Vec<JobId> {
        let mut records = self.records.write();
        let mut cancelled = Vec::new();
        for record in records.values_mut().filter(|r| r.status == JobStatus::Scheduled) {
            if record.apply(Transition::Cancel { at_ms }).is_ok() {
                cancelled.push(record.id);
            }
        }
        cancelled
    }

    /// Drop every terminal record. Returns the ids removed.
    pub fn prune_terminal(&self) -> Vec<JobId> {
        let mut records = self.records.write();
        let pruned: Vec<JobId> =
            records.values().filter(|r| r.is_terminal()).map(|r| r.id).collect();
        for id in &pruned {
            records.remove(id);
        }
        pruned
    }

    pub fn counts(&self) -> JobCounts {
        self.records.read().values().map(|r| r.status).collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
