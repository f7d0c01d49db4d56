// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use jsd_core::{JobCounts, JobId, JobRecord, JobStatus};
use serde::{Deserialize, Serialize};

/// Response from daemon to CLI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Generic success
    Ok,

    /// Health check response
    Pong,

    /// Version handshake response
    Hello { version: String },

    /// Job accepted. `status` is `cancelled` when the daemon was already
    /// shutting down and the job will never run.
    Submitted { id: JobId, status: JobStatus },

    /// Job records, ordered by id
    Jobs { jobs: Vec<JobRecord> },

    /// Kill handled; `status` is the job's status when the request arrived
    Killed { id: JobId, status: JobStatus },

    /// Jobs that were signalled by a killall
    KilledAll { signalled: Vec<JobId> },

    /// Shutdown finished: every job is terminal and the engine has stopped
    ShutDown,

    /// Daemon status
    Status { uptime_secs: u64, cores: usize, capacity: usize, jobs: JobCounts },

    /// Terminal records removed by a prune
    Pruned { pruned: Vec<JobId> },

    /// Error response
    Error { kind: ErrorKind, message: String },
}

/// Error categories callers need to tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoSuchJob,
    AlreadyStarted,
    ShuttingDown,
    Unauthorized,
    InvalidRequest,
    Internal,
}

jsd_core::simple_display! {
    ErrorKind {
        NoSuchJob => "no such job",
        AlreadyStarted => "already started",
        ShuttingDown => "shutting down",
        Unauthorized => "unauthorized",
        InvalidRequest => "invalid request",
        Internal => "internal error",
    }
}

impl Response {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Response::Error { kind, message: message.into() }
    }
}
