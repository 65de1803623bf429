use anyhow::{Context, Result};
use crossterm::style::{StyledContent, Stylize};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::mpsc::Receiver;

use msort::apply::placed_pb_paths;
use msort::progress::RunEvent;
use msort::report::report_code;
use msort::row::{Row, RowStatus};
use msort::run::RunOutcome;

fn status_label(status: RowStatus) -> StyledContent<String> {
    let label = format!("{:<20}", status.to_string());
    match status {
        RowStatus::Pending => label.dark_grey(),
        RowStatus::OkPlanned => label.green(),
        RowStatus::Done => label.green().bold(),
        RowStatus::FailedApply => label.red().bold(),
        RowStatus::PlannedProblemFolder => label.yellow(),
    }
}

fn display_target(target: Option<&Path>) -> String {
    target
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// One line per row, plus the per-file problems under quarantined folders
pub fn print_rows(rows: &[Row]) {
    for row in rows {
        println!(
            "{} {:<5} {} -> {}",
            status_label(row.status),
            row.action.to_string(),
            row.source_path().display(),
            display_target(row.target_path())
        );
        if !row.message.is_empty() {
            println!("{:>27}{}", "", row.message.as_str().dark_grey());
        }
        if let Some(reason) = &row.problem_reason {
            println!("{:>27}{}", "", reason.as_str().yellow());
        }

        if row.is_problem_folder() {
            for item in &row.problem_items {
                println!("{:>29}{}: {}", "", item.file_name, report_code(&item.report).red());
            }
        }
        if row.status == RowStatus::Done {
            for pb in placed_pb_paths(row) {
                println!("{:>29}{}", "", pb.display().to_string().dark_grey());
            }
        }
    }
}

pub fn print_outcome(outcome: &RunOutcome) {
    let summary = outcome.summary().to_string();
    if outcome.is_cancelled() {
        println!("{}", summary.yellow().bold());
    } else {
        println!("{}", summary.bold());
    }
}

/// Print whatever progress the worker has sent so far
pub fn drain_events(events: &Receiver<RunEvent>) {
    for event in events.try_iter() {
        let line = event.format();
        match event {
            RunEvent::FolderPlanned { quarantined: true, .. } => eprintln!("{}", line.yellow()),
            RunEvent::RowUpdated { row, .. } if row.status == RowStatus::FailedApply => {
                eprintln!("{}", line.red())
            }
            RunEvent::Finished { .. } => {}
            _ => eprintln!("{}", line.dark_grey()),
        }
    }
}

/// Ask a yes/no question on the terminal. Anything but y/yes is a no.
pub fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt.bold());
    io::stdout().flush().context("Failed to flush stdout")?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read answer")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
