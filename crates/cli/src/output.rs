// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

use clap::ValueEnum;
use jsd_core::JobRecord;
use serde::Serialize;

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;

#[derive(Clone, Copy, Debug, Default, PartialEq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Format a timestamp as relative time (e.g., "5s", "2m", "1h", "3d")
pub fn format_time_ago(epoch_ms: u64, now_ms: u64) -> String {
    if epoch_ms == 0 {
        return "-".to_string();
    }
    jsd_core::format_elapsed(now_ms.saturating_sub(epoch_ms) / 1000)
}

/// Print a list in the requested format, or `empty_msg` for an empty text listing.
pub fn handle_list<T: Serialize>(
    format: OutputFormat,
    items: &[T],
    empty_msg: &str,
    render_text: impl FnOnce(&[T], &mut dyn Write),
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items)?);
        }
        OutputFormat::Text => {
            if items.is_empty() {
                println!("{}", empty_msg);
            } else {
                render_text(items, &mut std::io::stdout());
            }
        }
    }
    Ok(())
}

/// Format-branch helper for non-list commands.
pub fn format_or_json<T: Serialize>(
    format: OutputFormat,
    data: &T,
    text_fn: impl FnOnce(),
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
        OutputFormat::Text => {
            text_fn();
        }
    }
    Ok(())
}

const HEADERS: [&str; 5] = ["ID", "STATUS", "PID", "TIME", "COMMAND"];

/// Render job records as an aligned table. The last column is left unpadded.
pub fn write_jobs(out: &mut dyn Write, jobs: &[JobRecord], now_ms: u64, colorize: bool) {
    let rows: Vec<[String; 5]> = jobs
        .iter()
        .map(|job| {
            [
                job.id.to_string(),
                job.status.to_string(),
                job.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
                job.elapsed_ms(now_ms)
                    .map(jsd_core::format_elapsed_ms)
                    .unwrap_or_else(|| format_time_ago(job.submitted_at_ms, now_ms)),
                job.spec.command_line(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let pad = |cells: [&str; 5], status: Option<String>| {
        let mut line = String::new();
        for (i, cell) in cells.iter().enumerate() {
            if i == cells.len() - 1 {
                line.push_str(cell);
                break;
            }
            let shown = match (i, &status) {
                (1, Some(painted)) => painted.as_str(),
                _ => *cell,
            };
            line.push_str(shown);
            line.push_str(&" ".repeat(widths[i] - cell.len() + 2));
        }
        line
    };

    let _ = writeln!(out, "{}", pad(HEADERS, None));
    for (job, row) in jobs.iter().zip(&rows) {
        let cells = [&*row[0], &*row[1], &*row[2], &*row[3], &*row[4]];
        let status = colorize.then(|| crate::color::status(job.status, true));
        let _ = writeln!(out, "{}", pad(cells, status));
    }
}
