// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client: one request per connection over the Unix socket.

use std::path::{Path, PathBuf};
use std::time::Duration;

use jsd_core::{JobId, JobRecord, JobSpec, JobStatus};
use jsd_wire::{self as wire, ErrorKind, ProtocolError, Request, Response};
use thiserror::Error;
use tokio::net::UnixStream;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Connecting, sending or receiving failed; the daemon is treated as absent.
    #[error("daemon unreachable: {0}")]
    Unreachable(String),

    /// The daemon answered with an error.
    #[error("{message}")]
    Rejected { kind: ErrorKind, message: String },

    #[error("unexpected response from daemon: {0}")]
    UnexpectedResponse(String),
}

impl ClientError {
    pub fn is_not_running(&self) -> bool {
        matches!(self, ClientError::Unreachable(_))
    }
}

impl From<ProtocolError> for ClientError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::ConnectionClosed | ProtocolError::Timeout | ProtocolError::Io(_) => {
                ClientError::Unreachable(e.to_string())
            }
            // A daemon answered, just not in a form we understand
            ProtocolError::Json(_) | ProtocolError::MessageTooLarge { .. } => {
                ClientError::UnexpectedResponse(e.to_string())
            }
        }
    }
}

fn unexpected(response: Response) -> ClientError {
    match response {
        Response::Error { kind, message } => ClientError::Rejected { kind, message },
        other => ClientError::UnexpectedResponse(format!("{other:?}")),
    }
}

/// Summary returned by [`DaemonClient::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonStatus {
    pub uptime_secs: u64,
    pub cores: usize,
    pub capacity: usize,
    pub jobs: jsd_core::JobCounts,
}

pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl DaemonClient {
    /// Client for the daemon of the configured state directory.
    pub fn connect() -> Result<Self, ClientError> {
        let state_dir =
            jsd_daemon::env::state_dir().map_err(|e| ClientError::Unreachable(e.to_string()))?;
        Ok(Self::at(state_dir.join("daemon.sock"), jsd_daemon::env::ipc_timeout()))
    }

    pub fn at(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self { socket_path: socket_path.into(), timeout }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Send one request and read its response.
    ///
    /// `Submit` and `Shutdown` may legitimately take as long as the daemon
    /// needs, so only the connect and write are bounded for them.
    pub async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        let mut stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| ClientError::Unreachable("connect timed out".to_string()))?
            .map_err(|e| ClientError::Unreachable(e.to_string()))?;

        wire::write_request(&mut stream, request, self.timeout).await?;
        let response = match request {
            Request::Submit { .. } | Request::Shutdown => {
                let bytes = wire::read_message(&mut stream).await?;
                wire::decode(&bytes)?
            }
            _ => wire::read_response(&mut stream, self.timeout).await?,
        };
        Ok(response)
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        match self.send(&Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn hello(&self) -> Result<String, ClientError> {
        let request = Request::Hello { version: jsd_wire::PROTOCOL_VERSION.to_string(), token: None };
        match self.send(&request).await? {
            Response::Hello { version } => Ok(version),
            other => Err(unexpected(other)),
        }
    }

    pub async fn status(&self) -> Result<DaemonStatus, ClientError> {
        match self.send(&Request::Status).await? {
            Response::Status { uptime_secs, cores, capacity, jobs } => {
                Ok(DaemonStatus { uptime_secs, cores, capacity, jobs })
            }
            other => Err(unexpected(other)),
        }
    }

    pub async fn submit(&self, spec: JobSpec) -> Result<(JobId, JobStatus), ClientError> {
        match self.send(&Request::Submit { spec }).await? {
            Response::Submitted { id, status } => Ok((id, status)),
            other => Err(unexpected(other)),
        }
    }

    pub async fn list(&self) -> Result<Vec<JobRecord>, ClientError> {
        match self.send(&Request::List).await? {
            Response::Jobs { jobs } => Ok(jobs),
            other => Err(unexpected(other)),
        }
    }

    pub async fn kill(&self, id: JobId) -> Result<JobStatus, ClientError> {
        match self.send(&Request::Kill { id }).await? {
            Response::Killed { status, .. } => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    pub async fn killall(&self) -> Result<Vec<JobId>, ClientError> {
        match self.send(&Request::KillAll).await? {
            Response::KilledAll { signalled } => Ok(signalled),
            other => Err(unexpected(other)),
        }
    }

    pub async fn prune(&self) -> Result<Vec<JobId>, ClientError> {
        match self.send(&Request::Prune).await? {
            Response::Pruned { pruned } => Ok(pruned),
            other => Err(unexpected(other)),
        }
    }

    /// Ask the daemon to shut down; returns once it has drained.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(&Request::Shutdown).await? {
            Response::ShutDown => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
