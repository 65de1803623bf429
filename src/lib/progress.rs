use std::path::PathBuf;
use std::sync::mpsc;

use crate::row::Row;

/// Progress events emitted by a run worker.
/// The display side consumes them; the worker never waits on it.
#[derive(Debug, Clone)]
pub enum RunEvent {
    ScanStarted {
        source: PathBuf,
        folders: usize,
    },
    /// One source folder went through tag reading and planning
    FolderPlanned {
        folder: PathBuf,
        planned_rows: usize,
        quarantined: bool,
    },
    /// A scan replaced the current rows
    RowsPublished {
        count: usize,
    },
    ApplyStarted {
        rows: usize,
    },
    RowUpdated {
        index: usize,
        row: Box<Row>,
    },
    Finished {
        summary: String,
        cancelled: bool,
    },
}

impl RunEvent {
    /// Format the event as a single log line
    pub fn format(&self) -> String {
        match self {
            RunEvent::ScanStarted { source, folders } => {
                format!("Scanning {} ({} folder(s) with audio)", source.display(), folders)
            }
            RunEvent::FolderPlanned {
                folder,
                planned_rows,
                quarantined,
            } => {
                if *quarantined {
                    format!("QUARANTINED: {}", folder.display())
                } else {
                    format!("PLANNED: {} ({} row(s))", folder.display(), planned_rows)
                }
            }
            RunEvent::RowsPublished { count } => format!("Published {} row(s)", count),
            RunEvent::ApplyStarted { rows } => format!("Applying {} row(s)", rows),
            RunEvent::RowUpdated { row, .. } => {
                format!("{}: {} ({})", row.status, row.file_name, row.message)
            }
            RunEvent::Finished { summary, .. } => summary.clone(),
        }
    }
}

/// Sending half handed to a run. Events are dropped once the receiver is gone.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::Sender<RunEvent>>,
}

impl ProgressSink {
    pub fn new(tx: mpsc::Sender<RunEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that discards everything
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn send(&self, event: RunEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
