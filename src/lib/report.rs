//! Diagnostic blocks written to rows and to `.pb.txt` files.
//!
//! The first line of every block is the PB code. Folder summaries group
//! problems by that line, so it must stay a bare code.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::error::Error;
use std::ffi::OsString;
use std::fmt::{self, Write as _};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::metadata::TagSnapshot;

/// Longest stack trace kept in a report
pub const TRACE_LIMIT: usize = 2000;

/// Extension of on-disk diagnostic files
pub const PB_EXTENSION: &str = "pb.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Scan,
    Apply,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Scan => f.write_str("SCAN"),
            Stage::Apply => f.write_str("APPLY"),
        }
    }
}

/// Error details captured for a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    pub type_name: String,
    pub message: String,
    pub trace: String,
}

impl ErrorDetail {
    /// Capture an error and the chain of its sources. The chain stands in
    /// for a stack trace.
    pub fn from_error<E: Error + ?Sized>(type_name: impl Into<String>, err: &E) -> Self {
        let mut trace = String::new();
        let mut source = err.source();
        while let Some(cause) = source {
            let _ = writeln!(trace, "  caused by: {}", cause);
            source = cause.source();
        }
        Self {
            type_name: type_name.into(),
            message: err.to_string(),
            trace,
        }
    }
}

/// Cut `s` to `max` characters, marking the cut
pub fn truncate(s: &str, max: usize) -> String {
    if s.is_empty() {
        return "(none)".to_string();
    }
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((idx, _)) => format!("{}…(truncated)", &s[..idx]),
    }
}

fn or_empty(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => "(empty)",
    }
}

/// One problem, ready to render.
#[derive(Debug, Clone)]
pub struct ProblemReport<'a> {
    pub code: &'a str,
    pub stage: Stage,
    pub source_path: &'a Path,
    pub computed_target: Option<&'a Path>,
    pub tags: &'a TagSnapshot,
    pub error: Option<ErrorDetail>,
    pub timestamp: DateTime<Local>,
}

impl<'a> ProblemReport<'a> {
    pub fn new(code: &'a str, stage: Stage, source_path: &'a Path, tags: &'a TagSnapshot) -> Self {
        Self {
            code,
            stage,
            source_path,
            computed_target: None,
            tags,
            error: None,
            timestamp: Local::now(),
        }
    }

    pub fn with_target(mut self, target: Option<&'a Path>) -> Self {
        self.computed_target = target;
        self
    }

    pub fn with_error(mut self, error: ErrorDetail) -> Self {
        self.error = Some(error);
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let tags = self.tags;

        let _ = writeln!(out, "{}", self.code);
        let _ = writeln!(out, "Timestamp: {}", self.timestamp.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "Stage: {}", self.stage);
        let _ = writeln!(out, "SourcePath: {}", self.source_path.display());
        if let Some(target) = self.computed_target {
            let _ = writeln!(out, "ComputedTargetPath: {}", target.display());
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Observed tags:");
        let _ = writeln!(out, "  AlbumArtist: {}", or_empty(tags.album_artist.as_deref()));
        let _ = writeln!(out, "  TrackArtist: {}", or_empty(tags.track_artist.as_deref()));
        let _ = writeln!(out, "  Album: {}", or_empty(tags.album.as_deref()));
        let _ = writeln!(out, "  Title: {}", or_empty(tags.title.as_deref()));
        let _ = writeln!(out, "  Track: {}", tags.track);
        let _ = writeln!(out, "  Disc: {}", tags.disc);
        let _ = writeln!(out, "  Year: {}", tags.year);

        if let Some(error) = &self.error {
            let _ = writeln!(out);
            let _ = writeln!(out, "Exception:");
            let _ = writeln!(out, "  Type: {}", error.type_name);
            let _ = writeln!(out, "  Message: {}", error.message);
            let _ = writeln!(out, "  StackTrace:");
            let _ = writeln!(out, "{}", truncate(&error.trace, TRACE_LIMIT));
        }

        out
    }
}

/// The code line of a rendered report
pub fn report_code(report: &str) -> &str {
    report.lines().next().unwrap_or_default().trim()
}

/// `dir/track.flac` -> `dir/track.pb.txt`
pub fn pb_path_for(file: &Path) -> PathBuf {
    let mut name = file.file_stem().map(OsString::from).unwrap_or_default();
    name.push(".");
    name.push(PB_EXTENSION);
    file.with_file_name(name)
}

/// Write a diagnostic file. Failures are logged and swallowed.
pub fn write_pb_file(path: &Path, content: &str) {
    let result = path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|_| fs::write(path, content));
    match result {
        Ok(()) => debug!("Wrote diagnostic {}", path.display()),
        Err(e) => error!("Could not write diagnostic {}: {}", path.display(), e),
    }
}
