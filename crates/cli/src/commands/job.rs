// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job commands: `submit`, `list`, `kill`, `killall`, `prune`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use jsd_core::{JobId, JobSpec, JobStatus};

use super::reachable_client;
use crate::exit_error::ExitError;
use crate::output::{format_or_json, handle_list, now_ms, write_jobs, OutputFormat};

pub const NO_JOBS: &str = "There are no running processes.";
pub const BAD_ID: &str = "Process ID must be a number.";

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// File piped to the program's standard input
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// File receiving standard output and standard error
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Working directory (defaults to the current directory)
    #[arg(short = 'w', long = "workdir", value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Environment variable for the program (repeatable)
    #[arg(short = 'e', long = "env", value_name = "KEY=VAL", value_parser = parse_env_var)]
    pub env: Vec<(String, String)>,

    /// Program followed by its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true, value_name = "PROGRAM")]
    pub command: Vec<String>,
}

fn parse_env_var(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

impl SubmitArgs {
    /// Build the job spec. Relative paths are resolved against `cwd`, since
    /// the daemon runs with its own working directory.
    pub fn into_spec(self, cwd: &Path) -> JobSpec {
        let mut words = self.command.into_iter();
        let program = words.next().unwrap_or_default();
        JobSpec {
            program,
            args: words.collect(),
            cwd: Some(self.workdir.map_or_else(|| cwd.to_path_buf(), |w| absolutize(&w, cwd))),
            env: self.env.into_iter().collect::<BTreeMap<_, _>>(),
            stdin: self.input.map(|p| absolutize(&p, cwd)),
            stdout: self.output.map(|p| absolutize(&p, cwd)),
        }
    }
}

pub async fn submit(args: SubmitArgs, format: OutputFormat) -> Result<()> {
    let client = reachable_client().await?;
    let spec = args.into_spec(&std::env::current_dir()?);
    let (id, status) = client.submit(spec).await?;

    if status == JobStatus::Cancelled {
        return Err(ExitError::new(
            1,
            format!("Job {} was cancelled before it could run.", id),
        )
        .into());
    }
    let obj = serde_json::json!({ "id": id, "status": status });
    format_or_json(format, &obj, || println!("{}", id))
}

pub async fn list(all: bool, format: OutputFormat) -> Result<()> {
    let client = reachable_client().await?;
    let mut jobs = client.list().await?;
    if !all {
        jobs.retain(|job| !job.is_terminal());
    }

    let colorize = crate::color::should_colorize();
    handle_list(format, &jobs, NO_JOBS, |items, out| {
        write_jobs(out, items, now_ms(), colorize);
    })
}

pub fn parse_job_id(raw: &str) -> Result<JobId, ExitError> {
    raw.parse::<JobId>().map_err(|_| ExitError::new(1, BAD_ID))
}

pub async fn kill(raw_id: &str, format: OutputFormat) -> Result<()> {
    let client = reachable_client().await?;
    let id = parse_job_id(raw_id)?;
    let status = client.kill(id).await?;

    let obj = serde_json::json!({ "id": id, "status": status });
    format_or_json(format, &obj, || match status {
        JobStatus::Running => println!("Killing job {}", id),
        JobStatus::Scheduled => println!("Cancelled job {} before it started", id),
        done => println!("Job {} already {}", id, done),
    })
}

pub async fn killall(format: OutputFormat) -> Result<()> {
    let client = reachable_client().await?;
    let signalled = client.killall().await?;

    let obj = serde_json::json!({ "signalled": signalled });
    format_or_json(format, &obj, || match signalled.len() {
        0 => println!("{}", NO_JOBS),
        n => println!("Killing {} job(s)", n),
    })
}

pub async fn prune(format: OutputFormat) -> Result<()> {
    let client = reachable_client().await?;
    let pruned = client.prune().await?;

    let obj = serde_json::json!({ "pruned": pruned });
    format_or_json(format, &obj, || {
        for id in &pruned {
            println!("Pruned job {}", id);
        }
        println!("\n{} job(s) pruned", pruned.len());
    })
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
