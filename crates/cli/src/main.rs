// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jsd: command-line client for the job scheduling daemon

mod client;
mod color;
mod commands;
mod exit_error;
mod output;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::daemon::DaemonArgs;
use commands::job::SubmitArgs;
use exit_error::ExitError;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "jsd", version, about = "Run commands through the job scheduling daemon")]
#[command(styles = color::styles())]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the daemon process
    Daemon(DaemonArgs),
    /// Submit a program to run
    Submit(SubmitArgs),
    /// List jobs (running and scheduled unless --all)
    List {
        /// Include finished jobs
        #[arg(long)]
        all: bool,
    },
    /// Kill a job by id
    Kill {
        /// Job id
        id: String,
    },
    /// Kill every running job
    Killall,
    /// Forget finished jobs
    Prune,
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = cli.output;
    match cli.command {
        Commands::Daemon(args) => commands::daemon::daemon(args, format).await,
        Commands::Submit(args) => commands::job::submit(args, format).await,
        Commands::List { all } => commands::job::list(all, format).await,
        Commands::Kill { id } => commands::job::kill(&id, format).await,
        Commands::Killall => commands::job::killall(format).await,
        Commands::Prune => commands::job::prune(format).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<ExitError>() {
            Some(exit) => {
                if !exit.message.is_empty() {
                    eprintln!("{}", exit.message);
                }
                ExitCode::from(u8::try_from(exit.code).unwrap_or(1))
            }
            None => {
                eprintln!("Error: {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
