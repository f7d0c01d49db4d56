// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! The Listener runs in a spawned task, accepting connections and serving
//! one request per connection against the daemon's service.

use std::sync::Arc;

use jsd_wire::{self as wire, ErrorKind, ProtocolError, Request, Response};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::env::{ipc_timeout, PROTOCOL_VERSION};
use crate::service::DaemonService;

/// Shared daemon context for all request handlers.
pub struct ListenCtx {
    pub service: Arc<dyn DaemonService>,
    /// Notified once a `Shutdown` request has fully drained the daemon
    pub shutdown: Arc<Notify>,
    /// When set, TCP clients must present this token in the Hello handshake.
    pub auth_token: Option<String>,
}

/// Listener task for accepting socket connections.
pub struct Listener {
    unix: UnixListener,
    tcp: Option<TcpListener>,
    ctx: Arc<ListenCtx>,
}

/// Errors from connection handling.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Source of a connection (for auth decisions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionSource {
    /// Local Unix socket, trusted
    Unix,
    /// Remote TCP, must authenticate in Hello
    Tcp,
}

impl Listener {
    /// Create a new listener with Unix socket only.
    pub fn new(unix: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { unix, tcp: None, ctx }
    }

    /// Create a new listener with both Unix socket and TCP.
    pub fn with_tcp(unix: UnixListener, tcp: TcpListener, ctx: Arc<ListenCtx>) -> Self {
        Self { unix, tcp: Some(tcp), ctx }
    }

    /// Accept connections forever, one task per connection.
    pub async fn run(self) {
        loop {
            let accepted = match &self.tcp {
                Some(tcp) => tokio::select! {
                    result = self.unix.accept() => result.map(|(s, _)| Stream::Unix(s)),
                    result = tcp.accept() => result.map(|(s, addr)| {
                        debug!("TCP connection from {}", addr);
                        Stream::Tcp(s)
                    }),
                },
                None => self.unix.accept().await.map(|(s, _)| Stream::Unix(s)),
            };

            match accepted {
                Ok(stream) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        let result = match stream {
                            Stream::Unix(s) => {
                                let (reader, writer) = s.into_split();
                                handle_connection(reader, writer, ConnectionSource::Unix, &ctx)
                                    .await
                            }
                            Stream::Tcp(s) => {
                                let (reader, writer) = s.into_split();
                                handle_connection(reader, writer, ConnectionSource::Tcp, &ctx)
                                    .await
                            }
                        };
                        if let Err(e) = result {
                            log_connection_error(e);
                        }
                    });
                }
                Err(e) => error!("accept error: {}", e),
            }
        }
    }
}

enum Stream {
    Unix(tokio::net::UnixStream),
    Tcp(tokio::net::TcpStream),
}

fn log_connection_error(e: ConnectionError) {
    match e {
        ConnectionError::Protocol(ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected")
        }
        ConnectionError::Protocol(ProtocolError::Timeout) => warn!("Connection timeout"),
        _ => error!("Connection error: {}", e),
    }
}

/// Handle a single client connection.
///
/// The handler is raced against client disconnect detection; if the client
/// goes away first the handler is dropped. A dropped `Submit` cancels its
/// job, and `Shutdown` runs detached so it always completes.
async fn handle_connection<R, W>(
    mut reader: R,
    mut writer: W,
    source: ConnectionSource,
    ctx: &ListenCtx,
) -> Result<(), ConnectionError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut request = wire::read_request(&mut reader, ipc_timeout()).await?;

    // TCP connections must authenticate via Hello as the first request; the
    // request after it on the same connection is then served normally.
    if source == ConnectionSource::Tcp {
        let rejection = match &request {
            Request::Hello { token, .. } => match (&ctx.auth_token, token) {
                (Some(expected), Some(provided)) if provided == expected => None,
                (Some(_), _) => Some("unauthorized"),
                (None, _) => None,
            },
            _ => Some("TCP connections must start with Hello"),
        };
        if let Some(message) = rejection {
            let response = Response::error(ErrorKind::Unauthorized, message);
            let _ = wire::write_response(&mut writer, &response, ipc_timeout()).await;
            return Ok(());
        }

        let hello = Response::Hello { version: PROTOCOL_VERSION.to_string() };
        wire::write_response(&mut writer, &hello, ipc_timeout()).await?;
        request = match wire::read_request(&mut reader, ipc_timeout()).await {
            Ok(next) => next,
            // Handshake only
            Err(ProtocolError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
    }

    // Polling requests at debug level, mutations at info
    match request {
        Request::Ping | Request::Hello { .. } | Request::Status | Request::List => {
            debug!(request = request.name(), "received request")
        }
        _ => info!(request = ?request, "received request"),
    }

    let response = tokio::select! {
        response = handle_request(request, ctx) => response,
        _ = detect_client_disconnect(&mut reader) => {
            debug!("Client disconnected, dropping handler");
            return Ok(());
        }
    };

    debug!("Sending response: {:?}", response);
    wire::write_response(&mut writer, &response, ipc_timeout()).await?;
    Ok(())
}

/// Resolves when the client closes its end (or sends anything unexpected).
async fn detect_client_disconnect<R: AsyncRead + Unpin>(reader: &mut R) {
    let mut buf = [0u8; 1];
    let _ = reader.read(&mut buf).await;
}

/// Handle a single request and return a response.
async fn handle_request(request: Request, ctx: &ListenCtx) -> Response {
    let service = &ctx.service;
    match request {
        Request::Ping => Response::Pong,

        // Auth was checked at the transport layer
        Request::Hello { .. } => Response::Hello { version: PROTOCOL_VERSION.to_string() },

        Request::Start => match service.start().await {
            Ok(()) => Response::Ok,
            Err(e) => Response::error(e.kind(), e.to_string()),
        },

        Request::Submit { spec } => {
            if spec.program.trim().is_empty() {
                return Response::error(ErrorKind::InvalidRequest, "program must not be empty");
            }
            match service.submit(spec).await {
                Ok(submission) => {
                    Response::Submitted { id: submission.id, status: submission.status }
                }
                Err(e) => Response::error(e.kind(), e.to_string()),
            }
        }

        Request::List => Response::Jobs { jobs: service.list().await },

        Request::Kill { id } => match service.kill(id).await {
            Ok(status) => Response::Killed { id, status },
            Err(e) => Response::error(e.kind(), e.to_string()),
        },

        Request::KillAll => Response::KilledAll { signalled: service.killall().await },

        Request::Shutdown => {
            let service = Arc::clone(&ctx.service);
            let notify = Arc::clone(&ctx.shutdown);
            let drained = tokio::spawn(async move {
                service.shutdown().await;
                notify.notify_one();
            });
            match drained.await {
                Ok(()) => Response::ShutDown,
                Err(e) => Response::error(ErrorKind::Internal, e.to_string()),
            }
        }

        Request::Status => {
            let status = service.status().await;
            Response::Status {
                uptime_secs: status.uptime.as_secs(),
                cores: status.cores,
                capacity: status.capacity,
                jobs: status.jobs,
            }
        }

        Request::Prune => Response::Pruned { pruned: service.prune().await },
    }
}

#[cfg(test)]
#[path = "../listener_tests.rs"]
mod tests;
