// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use jsd_core::{JobId, JobSpec};
use serde::{Deserialize, Serialize};

/// Request from CLI to daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Version handshake
    Hello {
        version: String,
        /// Auth token for TCP connections (ignored for Unix socket)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },

    /// Bring up the execution engine (no-op error if already up)
    Start,

    /// Submit a job; blocks while the admission queue is full
    Submit { spec: JobSpec },

    /// Snapshot of all job records
    List,

    /// Terminate one job
    Kill { id: JobId },

    /// Terminate every running job
    KillAll,

    /// Stop admission, terminate running jobs, and wait for the drain
    Shutdown,

    /// Get daemon status
    Status,

    /// Drop terminal job records
    Prune,
}

impl Request {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Ping => "ping",
            Request::Hello { .. } => "hello",
            Request::Start => "start",
            Request::Submit { .. } => "submit",
            Request::List => "list",
            Request::Kill { .. } => "kill",
            Request::KillAll => "killall",
            Request::Shutdown => "shutdown",
            Request::Status => "status",
            Request::Prune => "prune",
        }
    }
}
