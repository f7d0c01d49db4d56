// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jsd-core: Core types for the job scheduling daemon (jsd)

pub mod macros;

pub mod clock;
pub mod id;
pub mod job;
pub mod time_fmt;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use id::{JobId, JobIdGen};
pub use job::{JobCounts, JobRecord, JobSpec, JobStatus, Transition, TransitionError};
pub use time_fmt::{format_elapsed, format_elapsed_ms};
