use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{info, warn};

use msort::config::{expand_path, get_default_music_dir, SorterConfig};
use msort::progress::RunEvent;
use msort::row::{Row, RowCounts};
use msort::run::{RunController, RunHandle, RunOutcome};

use crate::tui;

pub mod run;
pub mod scan;

/// Options shared by `scan` and `run`
#[derive(Clone, Debug, clap::Args)]
pub struct SortArgs {
    /// Folder to read music from (defaults to $XDG_MUSIC_DIR or ~/Music)
    #[arg(long)]
    pub source: Option<String>,
    /// Root of the organised library
    #[arg(long)]
    pub target: Option<String>,
    /// Move files instead of copying them
    #[arg(long = "move")]
    pub move_mode: bool,
    /// Longest target path accepted before a folder is quarantined
    #[arg(long)]
    pub soft_max: Option<usize>,
    /// Write the final rows as JSON to this file
    #[arg(long)]
    pub report: Option<String>,
}

impl SortArgs {
    /// Environment config overlaid with the command line
    pub fn to_config(&self) -> Result<SorterConfig> {
        let mut config = SorterConfig::from_env()?;
        let source = self.source.clone().unwrap_or_else(get_default_music_dir);
        config.source = expand_path(&source);
        if let Some(target) = &self.target {
            config.target = expand_path(target);
        }
        config.move_mode = self.move_mode;
        if let Some(soft_max) = self.soft_max {
            config.path_soft_max = soft_max;
        }
        Ok(config)
    }

    pub fn report_path(&self) -> Option<PathBuf> {
        self.report.as_deref().map(expand_path)
    }
}

/// Wait for a run to finish, printing progress as it arrives.
/// Ctrl-C asks the run to stop at its next safe point.
pub fn wait_for_run(
    rt: &Runtime,
    controller: &RunController,
    handle: RunHandle,
    events: &Receiver<RunEvent>,
) -> Result<RunOutcome> {
    rt.block_on(async {
        let mut worker = tokio::task::spawn_blocking(move || handle.join());
        let mut ticker = tokio::time::interval(Duration::from_millis(100));
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut cancel_sent = false;

        loop {
            tokio::select! {
                joined = &mut worker => {
                    tui::drain_events(events);
                    let outcome = joined.context("Run worker task failed")??;
                    return Ok::<RunOutcome, anyhow::Error>(outcome);
                }
                signal = &mut ctrl_c, if !cancel_sent => {
                    signal.context("Failed to listen for Ctrl-C")?;
                    warn!("Ctrl-C received, stopping after the current item");
                    controller.cancel();
                    cancel_sent = true;
                }
                _ = ticker.tick() => tui::drain_events(events),
            }
        }
    })
}

#[derive(Serialize)]
struct JsonRow<'a> {
    #[serde(flatten)]
    row: &'a Row,
    /// `fileName<TAB>report` lines for quarantined folders
    problem_items_text: Option<String>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: &'a str,
    counts: RowCounts,
    rows: Vec<JsonRow<'a>>,
}

pub fn write_json_report(path: &Path, summary: &str, rows: &[Row]) -> Result<()> {
    let report = JsonReport {
        summary,
        counts: RowCounts::of(rows),
        rows: rows
            .iter()
            .map(|row| JsonRow {
                row,
                problem_items_text: row.problem_items_text(),
            })
            .collect(),
    };
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, json).with_context(|| format!("Failed to write report {}", path.display()))?;
    info!("📝 Report written to {}", path.display());
    Ok(())
}
