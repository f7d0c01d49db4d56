// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identifiers.
//!
//! Ids are assigned by the daemon on acceptance. They increase monotonically
//! and are never reused for the lifetime of a daemon, even after the job's
//! process has been reaped.

use serde::{Deserialize, Serialize};
use std::num::ParseIntError;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Daemon-assigned job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(JobId)
    }
}

impl From<u64> for JobId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Monotonic id sequence. Cheap to share behind `&`.
#[derive(Debug)]
pub struct JobIdGen {
    next: AtomicU64,
}

impl JobIdGen {
    /// Sequence whose first id is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self { next: AtomicU64::new(first) }
    }

    pub fn next(&self) -> JobId {
        JobId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for JobIdGen {
    fn default() -> Self {
        Self::starting_at(0)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
