//! Executes planned rows against the filesystem.
//!
//! Every failure stays on its row. The run moves on to the next one.

use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::directory::{
    copy_dir_recursive, copy_file, move_dir, move_file, resolve_dir_collision,
    resolve_file_collision,
};
use crate::report::{pb_path_for, write_pb_file, ErrorDetail, ProblemReport, Stage};
use crate::row::{FileAction, Row, RowStatus};
use crate::run::{CancelToken, Cancelled};

/// Why a row could not be applied.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("access denied: {source}")]
    AccessDenied {
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: io::Error,
    },

    #[error("too many collisions for {}", path.display())]
    CollisionsExhausted { path: PathBuf },

    #[error("source folder not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("planned target path is missing")]
    MissingTarget,
}

impl From<io::Error> for ApplyError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::PermissionDenied {
            ApplyError::AccessDenied { source: e }
        } else {
            ApplyError::Io { source: e }
        }
    }
}

impl ApplyError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApplyError::AccessDenied { .. } => "AccessDenied",
            ApplyError::Io { .. } => "Io",
            ApplyError::CollisionsExhausted { .. } => "CollisionsExhausted",
            ApplyError::SourceNotFound { .. } => "SourceNotFound",
            ApplyError::MissingTarget => "MissingTarget",
        }
    }

    /// PB code for a failed file row
    pub fn code(&self) -> String {
        match self {
            ApplyError::AccessDenied { .. } => "IO_ERROR:ACCESS_DENIED".to_string(),
            ApplyError::Io { .. }
            | ApplyError::CollisionsExhausted { .. }
            | ApplyError::SourceNotFound { .. } => "IO_ERROR:IO_EXCEPTION".to_string(),
            ApplyError::MissingTarget => "UNEXPECTED_EXCEPTION:MISSING_TARGET".to_string(),
        }
    }

    /// PB code for a failed folder-quarantine row
    pub fn folder_code(&self) -> String {
        format!("IO_ERROR:PROBLEM_FOLDER:{}", self.kind())
    }
}

/// Counts for one apply pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyStats {
    pub done: usize,
    pub failed: usize,
}

pub struct ApplyExecutor {
    move_mode: bool,
}

impl ApplyExecutor {
    pub fn new(move_mode: bool) -> Self {
        Self { move_mode }
    }

    /// Apply every `OkPlanned` row, then every `PlannedProblemFolder` row.
    /// `publish` sees each row right after it changes.
    pub fn apply<F>(
        &self,
        rows: &mut [Row],
        cancel: &CancelToken,
        mut publish: F,
    ) -> Result<ApplyStats, Cancelled>
    where
        F: FnMut(usize, &Row),
    {
        let pick = |status: RowStatus| -> Vec<usize> {
            rows.iter()
                .enumerate()
                .filter(|(_, r)| r.status == status)
                .map(|(i, _)| i)
                .collect()
        };
        let file_rows = pick(RowStatus::OkPlanned);
        let folder_rows = pick(RowStatus::PlannedProblemFolder);

        info!(
            "📦 Applying {} file row(s) and {} problem folder(s) ({})",
            file_rows.len(),
            folder_rows.len(),
            if self.move_mode { "move" } else { "copy" }
        );

        let mut stats = ApplyStats::default();
        for index in file_rows {
            cancel.check()?;
            let row = &mut rows[index];
            self.apply_file_row(row);
            tally(&mut stats, row);
            publish(index, row);
        }
        for index in folder_rows {
            cancel.check()?;
            let row = &mut rows[index];
            self.apply_folder_row(row);
            tally(&mut stats, row);
            publish(index, row);
        }

        Ok(stats)
    }

    fn place_file(&self, row: &Row) -> Result<PathBuf, ApplyError> {
        let target = row.target_path().ok_or(ApplyError::MissingTarget)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let final_target = resolve_file_collision(target)?;
        if self.move_mode {
            move_file(row.source_path(), &final_target)?;
        } else {
            copy_file(row.source_path(), &final_target)?;
        }
        Ok(final_target)
    }

    pub fn apply_file_row(&self, row: &mut Row) {
        row.action = FileAction::for_mode(self.move_mode);
        match self.place_file(row) {
            Ok(final_target) => {
                debug!("{} -> {}", row.source_path().display(), final_target.display());
                row.target_path = Some(final_target);
                row.status = RowStatus::Done;
                row.message = if self.move_mode { "Moved." } else { "Copied." }.to_string();
                row.problem_reason = None;
            }
            Err(e) => {
                let code = e.code();
                warn!("Failed to apply {}: {} ({})", row.source_path().display(), e, code);
                let report = ProblemReport::new(&code, Stage::Apply, row.source_path(), &row.tags)
                    .with_target(row.target_path())
                    .with_error(ErrorDetail::from_error(e.kind(), &e))
                    .render();
                write_pb_file(&pb_path_for(row.source_path()), &report);

                row.status = RowStatus::FailedApply;
                row.message = e.to_string();
                row.problem_reason = Some(code);
            }
        }
        row.touch();
    }

    fn place_folder(&self, row: &Row) -> Result<PathBuf, ApplyError> {
        let target = row.target_path().ok_or(ApplyError::MissingTarget)?;
        let source = row.source_path();
        if !source.is_dir() {
            return Err(ApplyError::SourceNotFound {
                path: source.to_path_buf(),
            });
        }

        let final_dir = resolve_dir_collision(target)?;
        if self.move_mode {
            if let Some(parent) = final_dir.parent() {
                fs::create_dir_all(parent)?;
            }
            move_dir(source, &final_dir)?;
        } else {
            copy_dir_recursive(source, &final_dir)?;
        }

        for item in &row.problem_items {
            write_pb_file(&pb_path_for(&final_dir.join(&item.source_name)), &item.report);
        }

        Ok(final_dir)
    }

    pub fn apply_folder_row(&self, row: &mut Row) {
        row.action = FileAction::for_mode(self.move_mode);
        match self.place_folder(row) {
            Ok(final_dir) => {
                info!(
                    "🚧 Problem folder {} -> {}",
                    row.source_path().display(),
                    final_dir.display()
                );
                row.target_path = Some(final_dir);
                row.status = RowStatus::Done;
                row.message = if self.move_mode {
                    "Problem folder moved."
                } else {
                    "Problem folder copied."
                }
                .to_string();
            }
            Err(e) => {
                warn!("Failed to place problem folder {}: {}", row.source_path().display(), e);
                row.status = RowStatus::FailedApply;
                row.message = e.to_string();
                row.problem_reason = Some(e.folder_code());
            }
        }
        row.touch();
    }
}

fn tally(stats: &mut ApplyStats, row: &Row) {
    match row.status {
        RowStatus::Done => stats.done += 1,
        RowStatus::FailedApply => stats.failed += 1,
        _ => {}
    }
}

/// Where a folder row's per-file diagnostics end up after placement
pub fn placed_pb_paths(row: &Row) -> Vec<PathBuf> {
    let Some(dir) = row.target_path() else {
        return Vec::new();
    };
    row.problem_items
        .iter()
        .map(|item| pb_path_for(&dir.join(&item.source_name)))
        .collect()
}
