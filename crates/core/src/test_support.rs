// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::job::JobSpec;

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for the job state machine.
pub mod strategies {
    use crate::job::{JobStatus, Transition};
    use proptest::prelude::*;

    pub fn arb_job_status() -> impl Strategy<Value = JobStatus> {
        prop_oneof![
            Just(JobStatus::Scheduled),
            Just(JobStatus::Running),
            Just(JobStatus::Completed),
            Just(JobStatus::Failed),
            Just(JobStatus::Killed),
            Just(JobStatus::Cancelled),
        ]
    }

    pub fn arb_transition() -> impl Strategy<Value = Transition> {
        prop_oneof![
            (1u32..100_000, any::<u32>())
                .prop_map(|(pid, at)| Transition::Start { pid, at_ms: u64::from(at) }),
            any::<u32>().prop_map(|at| Transition::Complete { at_ms: u64::from(at) }),
            (any::<Option<i32>>(), "[a-z ]{0,12}", any::<u32>()).prop_map(
                |(exit_code, cause, at)| Transition::Fail { exit_code, cause, at_ms: u64::from(at) }
            ),
            (any::<Option<i32>>(), any::<u32>())
                .prop_map(|(exit_code, at)| Transition::Kill { exit_code, at_ms: u64::from(at) }),
            any::<u32>().prop_map(|at| Transition::Cancel { at_ms: u64::from(at) }),
        ]
    }
}

// ── Job spec fixtures ─────────────────────────────────────────────────

/// `sh -c <script>`
pub fn sh(script: &str) -> JobSpec {
    JobSpec::new("sh").arg("-c").arg(script)
}

/// Exits 0 immediately.
pub fn true_spec() -> JobSpec {
    JobSpec::new("true")
}

/// Exits with the given code.
pub fn exit_spec(code: i32) -> JobSpec {
    sh(&format!("exit {code}"))
}

/// Sleeps for `secs` seconds; used to hold a worker busy.
pub fn sleep_spec(secs: u64) -> JobSpec {
    JobSpec::new("sleep").arg(secs.to_string())
}

/// Ignores SIGTERM, so only SIGKILL ends it.
pub fn stubborn_spec(secs: u64) -> JobSpec {
    sh(&format!("trap '' TERM; sleep {secs}"))
}

/// A program that cannot be spawned.
pub fn missing_program_spec() -> JobSpec {
    JobSpec::new("/nonexistent/jsd-test-program")
}
