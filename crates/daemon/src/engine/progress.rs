// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress reporting hook for the execution engine.

use tracing::{debug, info};

/// Observer notified as the engine starts and finishes tasks.
///
/// Purely informational; nothing the engine does depends on it.
pub trait ProgressObserver: Send + Sync {
    fn started(&self, label: &str, total: usize);
    fn finished(&self, label: &str, done: usize, total: usize);
}

/// Reports progress through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn started(&self, label: &str, total: usize) {
        info!(label, total, "batch started");
    }

    fn finished(&self, label: &str, done: usize, total: usize) {
        if total > 0 {
            debug!(label, done, total, "{done}/{total} finished");
        } else {
            debug!(label, done, "{done} finished");
        }
    }
}
