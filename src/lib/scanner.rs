//! Source tree discovery and per-folder planning.
//!
//! A folder is atomic: if any of its audio files cannot be planned, the
//! whole folder becomes a single quarantine row and none of its files are
//! placed individually.

use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::audio::{is_audio_file, is_sidecar_file};
use crate::metadata::{TagReader, TagSnapshot};
use crate::planner::{classify, PathPlanner};
use crate::progress::{ProgressSink, RunEvent};
use crate::report::{report_code, ErrorDetail, ProblemReport, Stage};
use crate::row::{FileAction, ProblemItem, Row, RowStatus};
use crate::run::{CancelToken, Cancelled};
use crate::sanitize::sanitize_lenient;

/// Directory under the target root that receives quarantined folders
pub const DEFAULT_PROBLEMS_DIR: &str = "_PROBLEMES";

/// A source folder and the audio files directly inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFolder {
    pub path: PathBuf,
    pub audio_files: Vec<PathBuf>,
}

/// Walk `source_root` and group audio files by containing directory,
/// in walk order.
pub fn discover_folders(source_root: &Path) -> Vec<SourceFolder> {
    let mut folders: Vec<SourceFolder> = Vec::new();
    let mut index: FxHashMap<PathBuf, usize> = FxHashMap::default();

    for entry in WalkDir::new(source_root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", source_root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_audio_file(entry.path()) {
            continue;
        }
        let Some(parent) = entry.path().parent() else {
            continue;
        };
        let slot = *index.entry(parent.to_path_buf()).or_insert_with(|| {
            folders.push(SourceFolder {
                path: parent.to_path_buf(),
                audio_files: Vec::new(),
            });
            folders.len() - 1
        });
        folders[slot].audio_files.push(entry.path().to_path_buf());
    }

    folders
}

/// `HAS_AUDIO_ISSUES: CODE (n), CODE (n)` ordered by frequency, then name
pub fn folder_summary(items: &[ProblemItem]) -> String {
    let mut groups: FxHashMap<String, (String, usize)> = FxHashMap::default();
    for item in items {
        let code = report_code(&item.report);
        if code.is_empty() {
            continue;
        }
        groups
            .entry(code.to_lowercase())
            .or_insert_with(|| (code.to_string(), 0))
            .1 += 1;
    }

    let mut grouped: Vec<(String, (String, usize))> = groups.into_iter().collect();
    grouped.sort_by(|(a_key, (_, a_count)), (b_key, (_, b_count))| {
        b_count.cmp(a_count).then_with(|| a_key.cmp(b_key))
    });

    if grouped.is_empty() {
        return "HAS_AUDIO_ISSUES".to_string();
    }
    let parts: Vec<String> = grouped
        .iter()
        .map(|(_, (code, count))| format!("{} ({})", code, count))
        .collect();
    format!("HAS_AUDIO_ISSUES: {}", parts.join(", "))
}

/// Keep the first item per file name
fn dedup_items(items: Vec<ProblemItem>) -> Vec<ProblemItem> {
    let mut seen = rustc_hash::FxHashSet::default();
    items
        .into_iter()
        .filter(|item| seen.insert(item.source_name.clone()))
        .collect()
}

enum FolderPlan {
    Clean(Vec<Row>),
    Quarantined(Row),
}

/// Plans every audio file under a source tree.
pub struct Scanner<'a> {
    reader: &'a dyn TagReader,
    planner: PathPlanner,
    problems_dir: PathBuf,
    move_mode: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(reader: &'a dyn TagReader, planner: PathPlanner, move_mode: bool) -> Self {
        let problems_dir = planner.target_root().join(DEFAULT_PROBLEMS_DIR);
        Self {
            reader,
            planner,
            problems_dir,
            move_mode,
        }
    }

    pub fn with_problems_dir_name(mut self, name: &str) -> Self {
        self.problems_dir = self.planner.target_root().join(name);
        self
    }

    fn action(&self) -> FileAction {
        FileAction::for_mode(self.move_mode)
    }

    /// Plan the whole tree. Normal rows come first in folder order, then
    /// every quarantine row. Nothing is returned when cancelled.
    pub fn scan(
        &self,
        source_root: &Path,
        cancel: &CancelToken,
        progress: &ProgressSink,
    ) -> Result<Vec<Row>, Cancelled> {
        let folders = discover_folders(source_root);
        info!(
            "🔍 Found {} folder(s) with audio under {}",
            folders.len(),
            source_root.display()
        );
        progress.send(RunEvent::ScanStarted {
            source: source_root.to_path_buf(),
            folders: folders.len(),
        });

        let mut normal_rows = Vec::new();
        let mut problem_rows = Vec::new();

        for folder in &folders {
            cancel.check()?;
            match self.plan_folder(folder, cancel)? {
                FolderPlan::Clean(rows) => {
                    progress.send(RunEvent::FolderPlanned {
                        folder: folder.path.clone(),
                        planned_rows: rows.len(),
                        quarantined: false,
                    });
                    normal_rows.extend(rows);
                }
                FolderPlan::Quarantined(row) => {
                    warn!(
                        "Quarantining {}: {}",
                        folder.path.display(),
                        row.problem_reason.as_deref().unwrap_or_default()
                    );
                    progress.send(RunEvent::FolderPlanned {
                        folder: folder.path.clone(),
                        planned_rows: 0,
                        quarantined: true,
                    });
                    problem_rows.push(row);
                }
            }
        }

        info!(
            "✅ Planned {} row(s), {} problem folder(s)",
            normal_rows.len(),
            problem_rows.len()
        );
        normal_rows.extend(problem_rows);
        Ok(normal_rows)
    }

    fn plan_folder(&self, folder: &SourceFolder, cancel: &CancelToken) -> Result<FolderPlan, Cancelled> {
        let mut audio_rows = Vec::new();
        let mut problems = Vec::new();

        for audio_path in &folder.audio_files {
            cancel.check()?;
            match self.plan_file(audio_path) {
                Ok(row) => audio_rows.push(row),
                Err(item) => problems.push(item),
            }
        }

        if !problems.is_empty() {
            return Ok(FolderPlan::Quarantined(self.quarantine_row(folder, problems)));
        }

        // Sidecars follow the album directory of the first planned track
        let album_dir = audio_rows
            .first()
            .and_then(|r| r.target_path())
            .and_then(Path::parent)
            .map(Path::to_path_buf);
        if let Some(album_dir) = album_dir {
            let sidecars = self.plan_sidecars(&folder.path, &album_dir, cancel)?;
            audio_rows.extend(sidecars);
        }

        Ok(FolderPlan::Clean(audio_rows))
    }

    /// Plan one audio file, or explain why it cannot be placed
    fn plan_file(&self, audio_path: &Path) -> Result<Row, ProblemItem> {
        let tags = match self.reader.read_tags(audio_path) {
            Ok(tags) => tags,
            Err(e) => {
                let code = e.code();
                let detail = ErrorDetail::from_error(e.type_name(), &e);
                let report = ProblemReport::new(&code, Stage::Scan, audio_path, &TagSnapshot::default())
                    .with_error(detail)
                    .render();
                debug!("Tag read failed for {}: {}", audio_path.display(), e);
                return Err(ProblemItem::new(audio_path, report));
            }
        };

        if let Some(code) = classify(&tags) {
            let report = ProblemReport::new(code, Stage::Scan, audio_path, &tags).render();
            return Err(ProblemItem::new(audio_path, report));
        }

        let plan = self.planner.plan(audio_path, &tags);
        let Some(target) = plan.usable_path().map(Path::to_path_buf) else {
            let code = plan.problem.as_deref().unwrap_or_default();
            let report = ProblemReport::new(code, Stage::Scan, audio_path, &tags)
                .with_target(plan.path.as_deref())
                .render();
            return Err(ProblemItem::new(audio_path, report));
        };

        debug!("Planned {} -> {}", audio_path.display(), target.display());
        let mut row = Row::new(audio_path);
        row.tags = tags;
        row.target_path = Some(target);
        row.status = RowStatus::OkPlanned;
        row.action = self.action();
        row.message = "OK (planned).".to_string();
        Ok(row)
    }

    fn plan_sidecars(
        &self,
        folder: &Path,
        album_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<Vec<Row>, Cancelled> {
        let mut entries: Vec<PathBuf> = match fs::read_dir(folder) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect(),
            Err(e) => {
                warn!("Could not list sidecars in {}: {}", folder.display(), e);
                return Ok(Vec::new());
            }
        };
        entries.sort();

        let mut rows = Vec::new();
        for path in entries {
            cancel.check()?;
            if is_audio_file(&path) || !is_sidecar_file(&path) {
                continue;
            }
            let Some(name) = path.file_name().map(|n| n.to_os_string()) else {
                continue;
            };
            let mut row = Row::new(&path);
            row.target_path = Some(album_dir.join(name));
            row.status = RowStatus::OkPlanned;
            row.action = self.action();
            row.message = "Sidecar file planned.".to_string();
            rows.push(row);
        }
        Ok(rows)
    }

    fn quarantine_row(&self, folder: &SourceFolder, problems: Vec<ProblemItem>) -> Row {
        let items = dedup_items(problems);
        let mut row = Row::new(&folder.path);
        let folder_name = sanitize_lenient(&row.file_name);
        row.target_path = Some(self.problems_dir.join(folder_name));
        row.status = RowStatus::PlannedProblemFolder;
        row.action = self.action();
        row.message = format!("Problem folder ({} audio file(s)).", items.len());
        row.problem_reason = Some(folder_summary(&items));
        row.problem_items = items;
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{tags, MapTagReader};
    use anyhow::{Context, Result};
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, b"test")?;
        Ok(())
    }

    fn item(file_name: &str, code: &str) -> ProblemItem {
        ProblemItem::new(Path::new(file_name), format!("{}\nTimestamp: now\n", code))
    }

    #[test]
    fn test_discover_groups_by_folder() -> Result<()> {
        let tmp_dir = tempdir()?;
        let root = tmp_dir.path();
        touch(&root.join("A").join("1.mp3"))?;
        touch(&root.join("A").join("2.FLAC"))?;
        touch(&root.join("A").join("cover.jpg"))?;
        touch(&root.join("B").join("CD1").join("1.ogg"))?;
        touch(&root.join("C").join("notes.txt"))?;

        let folders = discover_folders(root);
        assert_eq!(folders.len(), 2);
        assert_eq!(folders[0].path, root.join("A"));
        assert_eq!(
            folders[0].audio_files,
            vec![root.join("A").join("1.mp3"), root.join("A").join("2.FLAC")]
        );
        assert_eq!(folders[1].path, root.join("B").join("CD1"));

        Ok(())
    }

    #[test]
    fn test_folder_summary_orders_by_count_then_code() {
        let items = vec![
            item("a.mp3", "MISSING_TAG:TITLE"),
            item("b.mp3", "MISSING_TAG:ARTIST"),
            item("c.mp3", "MISSING_TAG:TITLE"),
            item("d.mp3", "ARTIST:RESERVED_NAME"),
        ];
        assert_eq!(
            folder_summary(&items),
            "HAS_AUDIO_ISSUES: MISSING_TAG:TITLE (2), ARTIST:RESERVED_NAME (1), MISSING_TAG:ARTIST (1)"
        );
        assert_eq!(folder_summary(&[item("x.mp3", "")]), "HAS_AUDIO_ISSUES");
    }

    #[test]
    fn test_clean_folder_plans_audio_then_sidecars() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("in");
        let target = tmp_dir.path().join("out");
        let album = source.join("Back In Black");
        touch(&album.join("01.mp3"))?;
        touch(&album.join("02.mp3"))?;
        touch(&album.join("cover.jpg"))?;
        touch(&album.join("rip.log"))?;
        touch(&album.join("desktop.ini"))?;

        let reader = MapTagReader::default()
            .with("01.mp3", tags("AC/DC", "Back In Black", "Hells Bells", 1))
            .with("02.mp3", tags("AC/DC", "Back In Black", "Shoot to Thrill", 2));
        let scanner = Scanner::new(&reader, PathPlanner::new(&target), false);
        let rows = scanner.scan(&source, &CancelToken::new(), &ProgressSink::silent())?;

        let album_dir = target.join("ACDC").join("Back In Black");
        let targets: Vec<PathBuf> = rows.iter().filter_map(|r| r.target_path.clone()).collect();
        assert_eq!(
            targets,
            vec![
                album_dir.join("01 - Hells Bells.mp3"),
                album_dir.join("02 - Shoot to Thrill.mp3"),
                album_dir.join("cover.jpg"),
                album_dir.join("rip.log"),
            ]
        );
        assert!(rows.iter().all(|r| r.status == RowStatus::OkPlanned));
        assert!(rows.iter().all(|r| r.action == FileAction::Copy));
        assert_eq!(rows[2].message, "Sidecar file planned.");

        Ok(())
    }

    #[test]
    fn test_one_bad_file_quarantines_whole_folder() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("in");
        let target = tmp_dir.path().join("out");
        let album = source.join("Mixed: Album");
        touch(&album.join("01.mp3"))?;
        touch(&album.join("02.mp3"))?;
        touch(&album.join("03.mp3"))?;
        touch(&album.join("cover.jpg"))?;

        let reader = MapTagReader::default()
            .with("01.mp3", tags("Artist", "Album", "One", 1))
            .with("02.mp3", tags("Artist", "Album", "", 2))
            .with("03.mp3", tags("Artist", "Album", "Three", 3));
        let scanner = Scanner::new(&reader, PathPlanner::new(&target), true);
        let rows = scanner.scan(&source, &CancelToken::new(), &ProgressSink::silent())?;

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.status, RowStatus::PlannedProblemFolder);
        assert_eq!(row.action, FileAction::Move);
        assert_eq!(row.source_path(), album.as_path());
        assert_eq!(
            row.target_path(),
            Some(target.join("_PROBLEMES").join("Mixed Album").as_path())
        );
        assert_eq!(
            row.problem_reason.as_deref(),
            Some("HAS_AUDIO_ISSUES: MISSING_TAG:TITLE (1)")
        );
        assert_eq!(row.problem_items.len(), 1);
        assert_eq!(row.problem_items[0].file_name, "02.mp3");
        assert!(row.problem_items[0].report.starts_with("MISSING_TAG:TITLE\n"));
        assert_eq!(row.message, "Problem folder (1 audio file(s)).");

        Ok(())
    }

    #[test]
    fn test_missing_artist_and_unreadable_file() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("in");
        let target = tmp_dir.path().join("out");
        touch(&source.join("X").join("a.mp3"))?;
        touch(&source.join("X").join("b.mp3"))?;
        touch(&source.join("X").join("c.mp3"))?;

        let reader = MapTagReader::default()
            .with("a.mp3", tags("", "", "X", 1))
            .corrupt("b.mp3");
        let scanner = Scanner::new(&reader, PathPlanner::new(&target), false);
        let rows = scanner.scan(&source, &CancelToken::new(), &ProgressSink::silent())?;

        assert_eq!(rows.len(), 1);
        let reason = rows[0].problem_reason.clone().unwrap_or_default();
        assert!(reason.starts_with("HAS_AUDIO_ISSUES: "));
        assert!(reason.contains("MISSING_TAG:ARTIST (1)"));
        assert!(reason.contains("TAGLIB_EXCEPTION:CORRUPT_FILE (1)"));
        assert!(reason.contains("UNEXPECTED_EXCEPTION:NotFound (1)"));

        let corrupt = &rows[0].problem_items[1];
        assert_eq!(corrupt.file_name, "b.mp3");
        assert!(corrupt.report.contains("Exception:\n  Type: CorruptFile\n"));

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_names_survive_planning() -> Result<()> {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("in");
        let target = tmp_dir.path().join("out");
        let cover = OsStr::from_bytes(b"cov\xFFer.jpg");
        let broken = OsStr::from_bytes(b"\xFE02.mp3");
        touch(&source.join("Clean").join("01.mp3"))?;
        touch(&source.join("Clean").join(cover))?;
        touch(&source.join("Dirty").join(broken))?;

        let reader = MapTagReader::default().with("01.mp3", tags("Artist", "Album", "One", 1));
        let scanner = Scanner::new(&reader, PathPlanner::new(&target), false);
        let rows = scanner.scan(&source, &CancelToken::new(), &ProgressSink::silent())?;

        let sidecar = rows
            .iter()
            .find(|r| r.source_path().file_name() == Some(cover))
            .context("sidecar row")?;
        assert_eq!(
            sidecar.target_path(),
            Some(target.join("Artist").join("Album").join(cover).as_path())
        );

        let quarantined = rows
            .iter()
            .find(|r| r.status == RowStatus::PlannedProblemFolder)
            .context("quarantine row")?;
        assert_eq!(quarantined.problem_items[0].source_name, broken);

        Ok(())
    }

    #[test]
    fn test_problem_rows_come_after_normal_rows() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("in");
        let target = tmp_dir.path().join("out");
        touch(&source.join("A").join("bad.mp3"))?;
        touch(&source.join("B").join("good.mp3"))?;

        let reader = MapTagReader::default()
            .with("bad.mp3", tags("", "Album", "Song", 1))
            .with("good.mp3", tags("Artist", "Album", "Song", 1));
        let scanner = Scanner::new(&reader, PathPlanner::new(&target), false);
        let rows = scanner.scan(&source, &CancelToken::new(), &ProgressSink::silent())?;

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status, RowStatus::OkPlanned);
        assert_eq!(rows[0].file_name, "good.mp3");
        assert_eq!(rows[1].status, RowStatus::PlannedProblemFolder);

        Ok(())
    }

    #[test]
    fn test_too_long_path_is_quarantined_with_target() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("in");
        let target = tmp_dir.path().join("out");
        touch(&source.join("Long").join("1.mp3"))?;

        let reader = MapTagReader::default().with("1.mp3", tags("Artist", "Album", "Song", 1));
        let scanner = Scanner::new(&reader, PathPlanner::new(&target).with_soft_max(10), false)
            .with_problems_dir_name("_QUARANTINE");
        let rows = scanner.scan(&source, &CancelToken::new(), &ProgressSink::silent())?;

        assert_eq!(rows.len(), 1);
        assert!(rows[0]
            .problem_reason
            .as_deref()
            .is_some_and(|r| r.contains("TARGET_PATH_TOO_LONG:")));
        assert!(rows[0].problem_items[0].report.contains("ComputedTargetPath: "));
        assert_eq!(
            rows[0].target_path(),
            Some(target.join("_QUARANTINE").join("Long").as_path())
        );

        Ok(())
    }

    #[test]
    fn test_cancelled_scan_returns_nothing() -> Result<()> {
        let tmp_dir = tempdir()?;
        let source = tmp_dir.path().join("in");
        touch(&source.join("A").join("1.mp3"))?;

        let reader = MapTagReader::default().with("1.mp3", tags("Artist", "Album", "Song", 1));
        let scanner = Scanner::new(&reader, PathPlanner::new(tmp_dir.path().join("out")), false);
        let cancel = CancelToken::new();
        cancel.cancel();

        assert!(scanner.scan(&source, &cancel, &ProgressSink::silent()).is_err());
        Ok(())
    }
}
