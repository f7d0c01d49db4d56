// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job specification, status and the record state machine.

use crate::id::JobId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Caller-supplied description of an external command. Carries no identity;
/// the daemon assigns a [`JobId`] on acceptance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Executable path or name resolved through `PATH`
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory; `None` inherits the daemon's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Environment overrides applied on top of the daemon's environment
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// File piped to standard input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin: Option<PathBuf>,
    /// File receiving standard output and standard error; `None` discards both
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<PathBuf>,
}

impl JobSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            stdin: None,
            stdout: None,
        }
    }

    crate::setters! {
        set { args: Vec<String> }
        option { cwd: PathBuf, stdin: PathBuf, stdout: PathBuf }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Program and arguments joined by spaces, for display.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Lifecycle status of a job.
///
/// `Scheduled` and `Running` are the only non-terminal states. Status only
/// moves forward: nothing ever returns to `Scheduled` or `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Scheduled,
    Running,
    Completed,
    Failed,
    Killed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Scheduled | JobStatus::Running)
    }

    /// Whether a record in `self` may move to `next`.
    pub fn can_move_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Scheduled, Running | Failed | Cancelled) | (Running, Completed | Failed | Killed)
        )
    }
}

crate::simple_display! {
    JobStatus {
        Scheduled => "scheduled",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Killed => "killed",
        Cancelled => "cancelled",
    }
}

/// Number of records per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub scheduled: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub killed: usize,
    pub cancelled: usize,
}

impl JobCounts {
    pub fn record(&mut self, status: JobStatus) {
        let slot = match status {
            JobStatus::Scheduled => &mut self.scheduled,
            JobStatus::Running => &mut self.running,
            JobStatus::Completed => &mut self.completed,
            JobStatus::Failed => &mut self.failed,
            JobStatus::Killed => &mut self.killed,
            JobStatus::Cancelled => &mut self.cancelled,
        };
        *slot += 1;
    }

    /// Scheduled plus running.
    pub fn active(&self) -> usize {
        self.scheduled + self.running
    }

    pub fn total(&self) -> usize {
        self.active() + self.completed + self.failed + self.killed + self.cancelled
    }
}

impl FromIterator<JobStatus> for JobCounts {
    fn from_iter<I: IntoIterator<Item = JobStatus>>(iter: I) -> Self {
        let mut counts = JobCounts::default();
        for status in iter {
            counts.record(status);
        }
        counts
    }
}

/// A requested status change, with the data the target status requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Process spawned
    Start { pid: u32, at_ms: u64 },
    /// Process exited with code 0
    Complete { at_ms: u64 },
    /// Non-zero exit, death by a foreign signal, or spawn failure
    Fail { exit_code: Option<i32>, cause: String, at_ms: u64 },
    /// Process exited after a kill was requested
    Kill { exit_code: Option<i32>, at_ms: u64 },
    /// Job will never run
    Cancel { at_ms: u64 },
}

impl Transition {
    pub fn target(&self) -> JobStatus {
        match self {
            Transition::Start { .. } => JobStatus::Running,
            Transition::Complete { .. } => JobStatus::Completed,
            Transition::Fail { .. } => JobStatus::Failed,
            Transition::Kill { .. } => JobStatus::Killed,
            Transition::Cancel { .. } => JobStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("job {id}: cannot move from {from} to {to}")]
    Invalid { id: JobId, from: JobStatus, to: JobStatus },
}

/// Daemon-owned bookkeeping for one submitted job.
///
/// Copies of this struct are what `list` hands out; the process handle
/// itself never leaves the daemon. `pid` is set exactly while `Running`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub spec: JobSpec,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub submitted_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl JobRecord {
    pub fn new(id: JobId, spec: JobSpec, submitted_at_ms: u64) -> Self {
        Self {
            id,
            spec,
            status: JobStatus::Scheduled,
            pid: None,
            submitted_at_ms,
            started_at_ms: None,
            ended_at_ms: None,
            exit_code: None,
            failure: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a transition. On error the record is left untouched.
    pub fn apply(&mut self, transition: Transition) -> Result<(), TransitionError> {
        let to = transition.target();
        if !self.status.can_move_to(to) {
            return Err(TransitionError::Invalid { id: self.id, from: self.status, to });
        }

        match transition {
            Transition::Start { pid, at_ms } => {
                self.pid = Some(pid);
                self.started_at_ms = Some(at_ms);
            }
            Transition::Complete { at_ms } => {
                self.finish(at_ms);
                self.exit_code = Some(0);
            }
            Transition::Fail { exit_code, cause, at_ms } => {
                self.finish(at_ms);
                self.exit_code = exit_code;
                self.failure = Some(cause);
            }
            Transition::Kill { exit_code, at_ms } => {
                self.finish(at_ms);
                self.exit_code = exit_code;
            }
            Transition::Cancel { at_ms } => self.finish(at_ms),
        }
        self.status = to;
        Ok(())
    }

    fn finish(&mut self, at_ms: u64) {
        self.pid = None;
        self.ended_at_ms = Some(at_ms);
    }

    /// Run time so far (or total, once ended). `None` until started.
    pub fn elapsed_ms(&self, now_ms: u64) -> Option<u64> {
        let started = self.started_at_ms?;
        Some(self.ended_at_ms.unwrap_or(now_ms).saturating_sub(started))
    }

    /// Internal consistency of status and the fields that go with it.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            JobStatus::Scheduled => self.pid.is_none() && self.ended_at_ms.is_none(),
            JobStatus::Running => {
                self.pid.is_some() && self.started_at_ms.is_some() && self.ended_at_ms.is_none()
            }
            JobStatus::Completed => {
                self.pid.is_none() && self.ended_at_ms.is_some() && self.exit_code == Some(0)
            }
            JobStatus::Failed => {
                self.pid.is_none() && self.ended_at_ms.is_some() && self.failure.is_some()
            }
            JobStatus::Killed | JobStatus::Cancelled => {
                self.pid.is_none() && self.ended_at_ms.is_some()
            }
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
