// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job scheduling daemon library
//!
//! The execution engine, job registry and scheduler, plus the socket
//! listener and lifecycle used by the `jsdd` binary.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod engine;
pub mod env;
pub mod lifecycle;
pub mod listener;
pub mod logging;
pub mod registry;
pub mod scheduler;
pub mod service;

pub use engine::{Engine, EngineError, Outcome, Phase, Task};
pub use lifecycle::{startup, Config, DaemonState, LifecycleError, StartupResult};
pub use listener::{ListenCtx, Listener};
pub use registry::{JobRegistry, RegistryError};
pub use scheduler::{
    JobFailure, JobOutcome, JobReport, Scheduler, SchedulerConfig, SchedulerStatus, Submission,
};
pub use service::{DaemonService, JobService, ServiceError};
