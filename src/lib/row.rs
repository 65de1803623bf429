use chrono::{DateTime, Local};
use serde::Serialize;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::metadata::TagSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowStatus {
    Pending,
    OkPlanned,
    Done,
    FailedApply,
    PlannedProblemFolder,
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RowStatus::Pending => "Pending",
            RowStatus::OkPlanned => "OkPlanned",
            RowStatus::Done => "Done",
            RowStatus::FailedApply => "FailedApply",
            RowStatus::PlannedProblemFolder => "PlannedProblemFolder",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileAction {
    None,
    Move,
    Copy,
}

impl FileAction {
    pub fn for_mode(move_mode: bool) -> Self {
        if move_mode {
            FileAction::Move
        } else {
            FileAction::Copy
        }
    }
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileAction::None => "-",
            FileAction::Move => "Move",
            FileAction::Copy => "Copy",
        };
        f.write_str(label)
    }
}

/// A file of a quarantined folder that could not be planned, with its report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProblemItem {
    /// Display name, lossy for names that are not UTF-8
    pub file_name: String,
    /// Name on disk, used to place the `.pb.txt` next to the file
    #[serde(skip)]
    pub source_name: OsString,
    pub report: String,
}

impl ProblemItem {
    pub fn new(source_path: &Path, report: String) -> Self {
        let source_name = source_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        Self {
            file_name: source_name.to_string_lossy().into_owned(),
            source_name,
            report,
        }
    }
}

/// One planned or executed filesystem action.
///
/// Folder-quarantine rows point at directories; every other row points at a file.
#[derive(Debug, Clone, Serialize)]
pub struct Row {
    source_path: PathBuf,
    pub target_path: Option<PathBuf>,
    pub file_name: String,
    pub tags: TagSnapshot,
    pub status: RowStatus,
    pub action: FileAction,
    pub message: String,
    pub problem_reason: Option<String>,
    pub problem_items: Vec<ProblemItem>,
    pub timestamp: DateTime<Local>,
}

impl Row {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        let source_path = source_path.into();
        let file_name = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            source_path,
            target_path: None,
            file_name,
            tags: TagSnapshot::default(),
            status: RowStatus::Pending,
            action: FileAction::None,
            message: String::new(),
            problem_reason: None,
            problem_items: Vec::new(),
            timestamp: Local::now(),
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn target_path(&self) -> Option<&Path> {
        self.target_path.as_deref()
    }

    pub fn is_problem_folder(&self) -> bool {
        !self.problem_items.is_empty() || self.status == RowStatus::PlannedProblemFolder
    }

    pub fn has_problem(&self) -> bool {
        self.problem_reason
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty())
    }

    /// `fileName<TAB>report` lines, as shown for quarantined folders
    pub fn problem_items_text(&self) -> Option<String> {
        if self.problem_items.is_empty() {
            return None;
        }
        let lines: Vec<String> = self
            .problem_items
            .iter()
            .map(|item| format!("{}\t{}", item.file_name, item.report))
            .collect();
        Some(lines.join("\n"))
    }

    pub fn touch(&mut self) {
        self.timestamp = Local::now();
    }
}

/// Move is only allowed once no problem is outstanding
pub fn can_move(rows: &[Row]) -> bool {
    !rows
        .iter()
        .any(|r| r.status == RowStatus::PlannedProblemFolder || r.has_problem())
}

/// Rows an Apply would act on
pub fn has_pending_work(rows: &[Row]) -> bool {
    rows.iter()
        .any(|r| matches!(r.status, RowStatus::OkPlanned | RowStatus::PlannedProblemFolder))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RowCounts {
    pub total: usize,
    pub ok: usize,
    pub problem_folders: usize,
    pub done: usize,
    pub failed: usize,
}

impl RowCounts {
    pub fn of(rows: &[Row]) -> Self {
        let count = |status: RowStatus| rows.iter().filter(|r| r.status == status).count();
        Self {
            total: rows.len(),
            ok: count(RowStatus::OkPlanned),
            problem_folders: count(RowStatus::PlannedProblemFolder),
            done: count(RowStatus::Done),
            failed: count(RowStatus::FailedApply),
        }
    }
}

/// `<prefix> — Total: N | OK: n | Dossiers PROBLÈME: n | Done: n | Failed: n`
pub fn build_summary(prefix: &str, rows: &[Row]) -> String {
    let counts = RowCounts::of(rows);
    format!(
        "{} — Total: {} | OK: {} | Dossiers PROBLÈME: {} | Done: {} | Failed: {}",
        prefix, counts.total, counts.ok, counts.problem_folders, counts.done, counts.failed
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_with(status: RowStatus, reason: Option<&str>) -> Row {
        let mut row = Row::new("/in/a.mp3");
        row.status = status;
        row.problem_reason = reason.map(|r| r.to_string());
        row
    }

    #[test]
    fn test_new_row_takes_file_name() {
        let row = Row::new("/in/Album/01 - Song.flac");
        assert_eq!(row.file_name, "01 - Song.flac");
        assert_eq!(row.status, RowStatus::Pending);
        assert_eq!(row.action, FileAction::None);
        assert!(row.target_path().is_none());
    }

    #[test]
    fn test_can_move() {
        assert!(can_move(&[]));
        assert!(can_move(&[
            row_with(RowStatus::OkPlanned, None),
            row_with(RowStatus::Done, None),
        ]));
        assert!(!can_move(&[
            row_with(RowStatus::OkPlanned, None),
            row_with(RowStatus::PlannedProblemFolder, Some("HAS_AUDIO_ISSUES")),
        ]));
        assert!(!can_move(&[row_with(
            RowStatus::FailedApply,
            Some("IO_ERROR:IO_EXCEPTION")
        )]));
        assert!(can_move(&[row_with(RowStatus::OkPlanned, Some("  "))]));
    }

    #[test]
    fn test_build_summary() {
        let rows = vec![
            row_with(RowStatus::OkPlanned, None),
            row_with(RowStatus::OkPlanned, None),
            row_with(RowStatus::PlannedProblemFolder, Some("X")),
            row_with(RowStatus::Done, None),
            row_with(RowStatus::FailedApply, Some("Y")),
        ];
        assert_eq!(
            build_summary("Scan finished", &rows),
            "Scan finished — Total: 5 | OK: 2 | Dossiers PROBLÈME: 1 | Done: 1 | Failed: 1"
        );
    }

    #[test]
    fn test_problem_items_text() {
        let mut row = Row::new("/in/Album");
        assert_eq!(row.problem_items_text(), None);
        row.problem_items = vec![
            ProblemItem::new(Path::new("/in/Album/a.mp3"), "MISSING_TAG:ARTIST".to_string()),
            ProblemItem::new(Path::new("/in/Album/b.mp3"), "MISSING_TAG:TITLE".to_string()),
        ];
        assert_eq!(
            row.problem_items_text().as_deref(),
            Some("a.mp3\tMISSING_TAG:ARTIST\nb.mp3\tMISSING_TAG:TITLE")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_problem_item_keeps_raw_name() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let raw = OsStr::from_bytes(b"0\xFF2.mp3");
        let item = ProblemItem::new(&Path::new("/in/Album").join(raw), String::new());
        assert_eq!(item.source_name, raw);
        assert_eq!(item.file_name, "0\u{FFFD}2.mp3");
    }

    #[test]
    fn test_has_pending_work() {
        assert!(!has_pending_work(&[row_with(RowStatus::Done, None)]));
        assert!(has_pending_work(&[row_with(RowStatus::PlannedProblemFolder, Some("X"))]));
    }
}
