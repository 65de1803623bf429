use anyhow::Result;
use tokio::runtime::Runtime;
use tracing::info;

use msort::metadata::LoftyTagReader;
use msort::run::{RunController, RunOutcome};

use super::{wait_for_run, write_json_report, SortArgs};
use crate::tui;

/// Plan only: nothing on disk changes
pub fn scan_library(rt: &Runtime, args: &SortArgs) -> Result<RunOutcome> {
    let config = args.to_config()?;
    info!(
        "🔍 Planning {} -> {}",
        config.source.display(),
        config.target.display()
    );

    let controller = RunController::new(config, LoftyTagReader);
    let events = controller.subscribe();
    let handle = controller.start_scan()?;
    let outcome = wait_for_run(rt, &controller, handle, &events)?;

    let rows = controller.rows();
    tui::print_rows(&rows);
    tui::print_outcome(&outcome);

    if let Some(path) = args.report_path() {
        write_json_report(&path, outcome.summary(), &rows)?;
    }
    Ok(outcome)
}
