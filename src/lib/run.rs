//! Owns the row list and runs Scan / Apply on a dedicated worker thread.
//!
//! Only one run is active at a time. Rows are published back into shared
//! state as the worker produces them, so `rows()` can be polled from the
//! display side while a run is in flight.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{info, warn};

use crate::apply::ApplyExecutor;
use crate::config::SorterConfig;
use crate::metadata::TagReader;
use crate::planner::PathPlanner;
use crate::progress::{ProgressSink, RunEvent};
use crate::row::{build_summary, can_move, has_pending_work, Row, RowStatus};
use crate::scanner::Scanner;

/// Cooperative cancellation flag shared between the controller and a worker
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Bail out with `Cancelled` at a safe point
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("run cancelled")]
pub struct Cancelled;

/// Why a run could not be started or joined
#[derive(Debug, Error)]
pub enum RunError {
    #[error("a scan or apply is already running")]
    Busy,

    #[error("move mode is disabled while problems are outstanding")]
    MoveNotAllowed,

    #[error("source folder does not exist: {}", path.display())]
    SourceMissing { path: PathBuf },

    #[error("target folder does not exist: {}", path.display())]
    TargetMissing { path: PathBuf },

    #[error("nothing to apply, run a scan first")]
    NothingToApply,

    #[error("run worker panicked")]
    WorkerPanicked,

    #[error("failed to spawn run worker: {0}")]
    Spawn(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { summary: String },
    Cancelled { summary: String },
}

impl RunOutcome {
    pub fn summary(&self) -> &str {
        match self {
            RunOutcome::Completed { summary } | RunOutcome::Cancelled { summary } => summary,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled { .. })
    }
}

/// A run in flight
#[derive(Debug)]
pub struct RunHandle {
    worker: JoinHandle<RunOutcome>,
}

impl RunHandle {
    /// Block until the worker is done
    pub fn join(self) -> Result<RunOutcome, RunError> {
        self.worker.join().map_err(|_| RunError::WorkerPanicked)
    }
}

#[derive(Debug)]
struct Shared {
    rows: RwLock<Vec<Row>>,
    summary: Mutex<String>,
    busy: AtomicBool,
    move_mode: AtomicBool,
    cancel: Mutex<CancelToken>,
    subscriber: Mutex<Option<mpsc::Sender<RunEvent>>>,
}

impl Shared {
    fn rows(&self) -> Vec<Row> {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn replace_rows(&self, rows: Vec<Row>) {
        *self.rows.write().unwrap_or_else(PoisonError::into_inner) = rows;
    }

    fn update_row(&self, index: usize, row: &Row) {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = rows.get_mut(index) {
            *slot = row.clone();
        }
    }

    fn set_summary(&self, summary: &str) {
        *self.summary.lock().unwrap_or_else(PoisonError::into_inner) = summary.to_string();
    }

    fn progress(&self) -> ProgressSink {
        match &*self.subscriber.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(tx) => ProgressSink::new(tx.clone()),
            None => ProgressSink::silent(),
        }
    }

    fn finish(&self, prefix: &str, cancelled: bool, progress: &ProgressSink) -> RunOutcome {
        let summary = build_summary(prefix, &self.rows());
        info!("{}", summary);
        self.set_summary(&summary);
        progress.send(RunEvent::Finished {
            summary: summary.clone(),
            cancelled,
        });
        if cancelled {
            RunOutcome::Cancelled { summary }
        } else {
            RunOutcome::Completed { summary }
        }
    }
}

/// Clears the busy flag however the worker exits
struct BusyGuard(Arc<Shared>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.busy.store(false, Ordering::SeqCst);
    }
}

pub struct RunController {
    config: SorterConfig,
    reader: Arc<dyn TagReader>,
    shared: Arc<Shared>,
}

impl RunController {
    pub fn new<R: TagReader + 'static>(config: SorterConfig, reader: R) -> Self {
        let shared = Shared {
            rows: RwLock::new(Vec::new()),
            summary: Mutex::new("Ready.".to_string()),
            busy: AtomicBool::new(false),
            move_mode: AtomicBool::new(config.move_mode),
            cancel: Mutex::new(CancelToken::new()),
            subscriber: Mutex::new(None),
        };
        Self {
            config,
            reader: Arc::new(reader),
            shared: Arc::new(shared),
        }
    }

    pub fn config(&self) -> &SorterConfig {
        &self.config
    }

    /// Receive progress events for every later run. Replaces any previous subscriber.
    pub fn subscribe(&self) -> Receiver<RunEvent> {
        let (tx, rx) = mpsc::channel();
        *self
            .shared
            .subscriber
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    pub fn rows(&self) -> Vec<Row> {
        self.shared.rows()
    }

    pub fn summary(&self) -> String {
        self.shared
            .summary
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::SeqCst)
    }

    pub fn can_move(&self) -> bool {
        can_move(&self.shared.rows.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn move_mode(&self) -> bool {
        self.shared.move_mode.load(Ordering::SeqCst)
    }

    pub fn set_move_mode(&self, enabled: bool) -> Result<(), RunError> {
        if enabled && !self.can_move() {
            return Err(RunError::MoveNotAllowed);
        }
        self.shared.move_mode.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    /// Ask the active run to stop at its next safe point
    pub fn cancel(&self) {
        if !self.is_busy() {
            return;
        }
        self.shared
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
        self.shared.set_summary("Cancellation requested…");
        info!("🛑 Cancellation requested");
    }

    fn acquire(&self) -> Result<(BusyGuard, CancelToken), RunError> {
        if self
            .shared
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RunError::Busy);
        }
        let guard = BusyGuard(Arc::clone(&self.shared));
        let token = CancelToken::new();
        *self.shared.cancel.lock().unwrap_or_else(PoisonError::into_inner) = token.clone();
        Ok((guard, token))
    }

    pub fn start_scan(&self) -> Result<RunHandle, RunError> {
        let source = self.config.source.clone();
        if !source.is_dir() {
            return Err(RunError::SourceMissing { path: source });
        }

        let (guard, cancel) = self.acquire()?;
        let shared = Arc::clone(&self.shared);
        let reader = Arc::clone(&self.reader);
        let config = self.config.clone();
        let move_mode = self.move_mode();
        let progress = shared.progress();
        shared.set_summary("Scan in progress…");

        let worker = thread::Builder::new()
            .name("msort-scan".to_string())
            .spawn(move || {
                let _guard = guard;
                let planner = PathPlanner::new(&config.target).with_soft_max(config.path_soft_max);
                let scanner = Scanner::new(reader.as_ref(), planner, move_mode)
                    .with_problems_dir_name(&config.problems_dir_name);

                match scanner.scan(&source, &cancel, &progress) {
                    Ok(rows) => {
                        let count = rows.len();
                        let movable = can_move(&rows);
                        shared.replace_rows(rows);
                        progress.send(RunEvent::RowsPublished { count });
                        if !movable && shared.move_mode.swap(false, Ordering::SeqCst) {
                            warn!("Problems found, switching back to copy mode");
                        }
                        shared.finish("Scan finished", false, &progress)
                    }
                    Err(_) => shared.finish("Scan cancelled", true, &progress),
                }
            })?;

        Ok(RunHandle { worker })
    }

    pub fn start_apply(&self) -> Result<RunHandle, RunError> {
        let target = self.config.target.clone();
        if !target.is_dir() {
            return Err(RunError::TargetMissing { path: target });
        }

        let (guard, cancel) = self.acquire()?;
        let mut rows = self.shared.rows();
        if !has_pending_work(&rows) {
            return Err(RunError::NothingToApply);
        }

        let shared = Arc::clone(&self.shared);
        let move_mode = self.move_mode();
        let progress = shared.progress();
        shared.set_summary("Apply in progress…");

        let worker = thread::Builder::new()
            .name("msort-apply".to_string())
            .spawn(move || {
                let _guard = guard;
                let pending = rows
                    .iter()
                    .filter(|r| {
                        matches!(r.status, RowStatus::OkPlanned | RowStatus::PlannedProblemFolder)
                    })
                    .count();
                progress.send(RunEvent::ApplyStarted { rows: pending });

                let executor = ApplyExecutor::new(move_mode);
                let result = executor.apply(&mut rows, &cancel, |index, row| {
                    shared.update_row(index, row);
                    progress.send(RunEvent::RowUpdated {
                        index,
                        row: Box::new(row.clone()),
                    });
                });

                match result {
                    Ok(stats) => {
                        info!("✅ Applied: {} done, {} failed", stats.done, stats.failed);
                        shared.finish("Apply finished", false, &progress)
                    }
                    Err(_) => shared.finish("Apply cancelled", true, &progress),
                }
            })?;

        Ok(RunHandle { worker })
    }
}
