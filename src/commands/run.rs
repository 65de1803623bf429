use anyhow::{Context, Result};
use std::fs;
use tokio::runtime::Runtime;
use tracing::{info, warn};

use msort::metadata::LoftyTagReader;
use msort::row::has_pending_work;
use msort::run::{RunController, RunOutcome};

use super::{wait_for_run, write_json_report, SortArgs};
use crate::tui;

fn finish(args: &SortArgs, controller: &RunController, outcome: RunOutcome) -> Result<RunOutcome> {
    if let Some(path) = args.report_path() {
        write_json_report(&path, outcome.summary(), &controller.rows())?;
    }
    Ok(outcome)
}

/// Scan, show the plan, then apply it
pub fn run_library(rt: &Runtime, args: &SortArgs, assume_yes: bool) -> Result<RunOutcome> {
    run_with_confirm(rt, args, |prompt| Ok(assume_yes || tui::confirm(prompt)?))
}

fn run_with_confirm<F>(rt: &Runtime, args: &SortArgs, confirm: F) -> Result<RunOutcome>
where
    F: FnOnce(&str) -> Result<bool>,
{
    let config = args.to_config()?;
    if config.target.as_os_str().is_empty() {
        anyhow::bail!("--target is required for run");
    }

    let controller = RunController::new(config, LoftyTagReader);
    let events = controller.subscribe();

    let handle = controller.start_scan()?;
    let outcome = wait_for_run(rt, &controller, handle, &events)?;
    let rows = controller.rows();
    tui::print_rows(&rows);
    tui::print_outcome(&outcome);

    if outcome.is_cancelled() || !has_pending_work(&rows) {
        return finish(args, &controller, outcome);
    }

    let target = controller.config().target.clone();
    if args.move_mode && !controller.move_mode() {
        warn!("Problem folders found, files will be copied instead of moved");
    }
    let verb = if controller.move_mode() { "Move" } else { "Copy" };
    if !confirm(&format!("{} into {}?", verb, target.display()))? {
        info!("Nothing applied");
        return finish(args, &controller, outcome);
    }

    fs::create_dir_all(&target)
        .with_context(|| format!("Failed to create target folder {}", target.display()))?;

    let handle = controller.start_apply()?;
    let outcome = wait_for_run(rt, &controller, handle, &events)?;
    tui::print_rows(&controller.rows());
    tui::print_outcome(&outcome);

    finish(args, &controller, outcome)
}
