// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod daemon;
pub mod job;

use crate::client::DaemonClient;
use crate::exit_error::ExitError;

/// Client for a daemon that has just answered a ping.
///
/// Any failure to reach it becomes the "not running" exit.
pub(crate) async fn reachable_client() -> anyhow::Result<DaemonClient> {
    let client = DaemonClient::connect().map_err(|_| ExitError::not_running())?;
    match client.ping().await {
        Ok(()) => Ok(client),
        Err(e) if e.is_not_running() => Err(ExitError::not_running().into()),
        Err(e) => Err(e.into()),
    }
}
