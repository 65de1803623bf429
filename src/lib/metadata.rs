use lofty::error::{ErrorKind, LoftyError};
use lofty::file::TaggedFileExt;
use lofty::tag::{Accessor, ItemKey, Tag};
use serde::Serialize;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Tags observed on a single audio file, exactly as read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagSnapshot {
    pub album_artist: Option<String>,
    pub track_artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    pub track: u32,
    pub disc: u32,
    pub year: u32,
}

/// First value that is not blank, trimmed
pub fn first_non_empty<'a>(values: &[Option<&'a str>]) -> Option<&'a str> {
    values
        .iter()
        .flatten()
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

impl TagSnapshot {
    /// Album artist, falling back to the track artist
    pub fn artist(&self) -> Option<&str> {
        first_non_empty(&[self.album_artist.as_deref(), self.track_artist.as_deref()])
    }

    pub fn album(&self) -> Option<&str> {
        first_non_empty(&[self.album.as_deref()])
    }

    pub fn title(&self) -> Option<&str> {
        first_non_empty(&[self.title.as_deref()])
    }
}

/// Failure to read tags from a file.
#[derive(Debug, Error)]
pub enum TagReadError {
    /// The container or tag data could not be parsed
    #[error("corrupt or unsupported audio file: {message}")]
    CorruptFile { message: String },

    #[error("access denied: {source}")]
    AccessDenied {
        #[source]
        source: io::Error,
    },

    #[error("{kind}: {message}")]
    Unexpected { kind: String, message: String },
}

impl TagReadError {
    /// PB code recorded for the file
    pub fn code(&self) -> String {
        match self {
            TagReadError::CorruptFile { .. } => "TAGLIB_EXCEPTION:CORRUPT_FILE".to_string(),
            TagReadError::AccessDenied { .. } => "IO_ERROR:ACCESS_DENIED".to_string(),
            TagReadError::Unexpected { kind, .. } => format!("UNEXPECTED_EXCEPTION:{}", kind),
        }
    }

    /// Short type name used in diagnostic reports
    pub fn type_name(&self) -> &str {
        match self {
            TagReadError::CorruptFile { .. } => "CorruptFile",
            TagReadError::AccessDenied { .. } => "AccessDenied",
            TagReadError::Unexpected { kind, .. } => kind,
        }
    }
}

impl From<io::Error> for TagReadError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::PermissionDenied {
            TagReadError::AccessDenied { source: e }
        } else {
            TagReadError::Unexpected {
                kind: format!("{:?}", e.kind()),
                message: e.to_string(),
            }
        }
    }
}

impl From<LoftyError> for TagReadError {
    fn from(e: LoftyError) -> Self {
        match e.kind() {
            ErrorKind::Io(io_err) => io::Error::new(io_err.kind(), io_err.to_string()).into(),
            _ => TagReadError::CorruptFile {
                message: e.to_string(),
            },
        }
    }
}

/// Reads the tags the planner needs from an audio file.
pub trait TagReader: Send + Sync {
    fn read_tags(&self, path: &Path) -> Result<TagSnapshot, TagReadError>;
}

/// [`TagReader`] backed by lofty
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTagReader;

fn tag_string(tag: &Tag, key: &ItemKey) -> Option<String> {
    tag.get_string(key).map(|s| s.to_string())
}

/// Leading four digits of a year or full recording date ("1980-07-25")
fn parse_year(raw: &str) -> Option<u32> {
    let digits: String = raw.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() >= 4 {
        digits[..4].parse().ok()
    } else {
        digits.parse().ok()
    }
}

fn snapshot_from_tag(tag: &Tag) -> TagSnapshot {
    let year = tag
        .get_string(&ItemKey::Year)
        .or_else(|| tag.get_string(&ItemKey::RecordingDate))
        .and_then(parse_year)
        .unwrap_or(0);

    TagSnapshot {
        album_artist: tag_string(tag, &ItemKey::AlbumArtist),
        track_artist: tag.artist().map(|s| s.into_owned()),
        album: tag.album().map(|s| s.into_owned()),
        title: tag.title().map(|s| s.into_owned()),
        track: tag.track().unwrap_or(0),
        disc: tag.disk().unwrap_or(0),
        year,
    }
}

impl TagReader for LoftyTagReader {
    fn read_tags(&self, path: &Path) -> Result<TagSnapshot, TagReadError> {
        let tagged_file = lofty::read_from_path(path)?;
        let snapshot = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
            .map(snapshot_from_tag)
            .unwrap_or_default();
        Ok(snapshot)
    }
}

/// In-memory reader keyed by file name, for tests
#[cfg(test)]
#[derive(Default)]
pub(crate) struct MapTagReader {
    entries: rustc_hash::FxHashMap<String, Result<TagSnapshot, String>>,
}

#[cfg(test)]
impl MapTagReader {
    pub(crate) fn with(mut self, file_name: &str, tags: TagSnapshot) -> Self {
        self.entries.insert(file_name.to_string(), Ok(tags));
        self
    }

    /// Register a file whose tags fail to parse
    pub(crate) fn corrupt(mut self, file_name: &str) -> Self {
        self.entries
            .insert(file_name.to_string(), Err("bad header".to_string()));
        self
    }
}

#[cfg(test)]
impl TagReader for MapTagReader {
    fn read_tags(&self, path: &Path) -> Result<TagSnapshot, TagReadError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        match self.entries.get(name) {
            Some(Ok(tags)) => Ok(tags.clone()),
            Some(Err(message)) => Err(TagReadError::CorruptFile {
                message: message.clone(),
            }),
            None => Err(TagReadError::Unexpected {
                kind: "NotFound".to_string(),
                message: format!("no tags registered for {}", name),
            }),
        }
    }
}

#[cfg(test)]
pub(crate) fn tags(artist: &str, album: &str, title: &str, track: u32) -> TagSnapshot {
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
    TagSnapshot {
        album_artist: None,
        track_artist: non_empty(artist),
        album: non_empty(album),
        title: non_empty(title),
        track,
        disc: 0,
        year: 0,
    }
}
