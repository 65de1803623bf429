//! Target path computation and the tag checks that run before it.

use std::path::{Path, PathBuf};

use crate::metadata::{first_non_empty, TagSnapshot};
use crate::sanitize::sanitize;

/// Planned paths longer than this (in characters) are refused
pub const DEFAULT_PATH_SOFT_MAX: usize = 245;

/// Artist values that mark a compilation. Compared trimmed and lowercased.
pub const VARIOUS_ARTIST_ALIASES: &[&str] = &[
    "various",
    "various artists",
    "various artist",
    "va",
    "v.a.",
    "v.a",
    "v/a",
    "compilation",
    "compilations",
];

/// Blocking tag problems. A missing album is not one of them: the track
/// goes straight under its artist folder instead.
pub fn classify(tags: &TagSnapshot) -> Option<&'static str> {
    if tags.artist().is_none() {
        Some("MISSING_TAG:ARTIST")
    } else if tags.title().is_none() {
        Some("MISSING_TAG:TITLE")
    } else {
        None
    }
}

pub fn is_various_artists(artist: &str) -> bool {
    let artist = artist.trim().to_lowercase();
    VARIOUS_ARTIST_ALIASES.contains(&artist.as_str())
}

/// Outcome of planning one file. Only a plan without a problem is usable;
/// a too-long path is still returned so it can be reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPlan {
    pub path: Option<PathBuf>,
    pub problem: Option<String>,
}

impl PathPlan {
    fn planned(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            problem: None,
        }
    }

    fn refused(problem: String) -> Self {
        Self {
            path: None,
            problem: Some(problem),
        }
    }

    /// The final target, when nothing is wrong with it
    pub fn usable_path(&self) -> Option<&Path> {
        match self.problem {
            None => self.path.as_deref(),
            Some(_) => None,
        }
    }
}

/// Number of characters in the rendered path
pub fn path_length(path: &Path) -> usize {
    path.to_string_lossy().chars().count()
}

/// Computes `{root}/{artist}/{album}/{[DD-]TT - Title.ext}` targets.
#[derive(Debug, Clone)]
pub struct PathPlanner {
    target_root: PathBuf,
    soft_max: usize,
}

impl PathPlanner {
    pub fn new(target_root: impl Into<PathBuf>) -> Self {
        Self {
            target_root: target_root.into(),
            soft_max: DEFAULT_PATH_SOFT_MAX,
        }
    }

    pub fn with_soft_max(mut self, soft_max: usize) -> Self {
        self.soft_max = soft_max;
        self
    }

    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    /// Track file name for `source_path` once renamed
    pub fn file_name(title: &str, track: u32, disc: u32, source_path: &Path) -> String {
        let ext = source_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let disc_prefix = if disc > 0 {
            format!("{:02}-", disc)
        } else {
            String::new()
        };
        format!("{}{:02} - {}.{}", disc_prefix, track, title, ext)
    }

    pub fn plan(&self, source_path: &Path, tags: &TagSnapshot) -> PathPlan {
        let stem = source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let title_raw = first_non_empty(&[tags.title.as_deref(), Some(stem.as_str())]).unwrap_or("");
        let title = match sanitize(title_raw).into_result() {
            Ok(title) => title,
            Err(reason) => return PathPlan::refused(format!("TITLE:{}", reason)),
        };

        let file_name = Self::file_name(&title, tags.track, tags.disc, source_path);

        let artist_raw = tags.artist().unwrap_or("");
        let artist = match sanitize(artist_raw).into_result() {
            Ok(artist) => artist,
            Err(reason) => return PathPlan::refused(format!("ARTIST:{}", reason)),
        };

        let path = match tags.album() {
            None => self.target_root.join(&artist).join(&file_name),
            Some(album_raw) => {
                let album = match sanitize(album_raw).into_result() {
                    Ok(album) => album,
                    Err(reason) => return PathPlan::refused(format!("ALBUM:{}", reason)),
                };
                // Compilations are detected on the raw artist, not the sanitized one
                if is_various_artists(artist_raw) {
                    self.target_root.join(&album).join(&file_name)
                } else {
                    self.target_root.join(&artist).join(&album).join(&file_name)
                }
            }
        };

        let length = path_length(&path);
        if length > self.soft_max {
            return PathPlan {
                path: Some(path),
                problem: Some(format!("TARGET_PATH_TOO_LONG:{}", length)),
            };
        }

        PathPlan::planned(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tags;

    fn planner() -> PathPlanner {
        PathPlanner::new("/music")
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&tags("", "Album", "Title", 1)), Some("MISSING_TAG:ARTIST"));
        assert_eq!(classify(&tags("", "Album", "", 1)), Some("MISSING_TAG:ARTIST"));
        assert_eq!(classify(&tags("Artist", "Album", "  ", 1)), Some("MISSING_TAG:TITLE"));
        assert_eq!(classify(&tags("Artist", "", "Title", 1)), None);
        assert_eq!(classify(&tags("Artist", "Album", "Title", 1)), None);
    }

    #[test]
    fn test_acdc_example() {
        let plan = planner().plan(
            Path::new("/in/track01.MP3"),
            &tags("AC/DC", "Back In Black", "Hells Bells", 1),
        );
        assert_eq!(plan.problem, None);
        assert_eq!(
            plan.usable_path(),
            Some(Path::new("/music/ACDC/Back In Black/01 - Hells Bells.mp3"))
        );
    }

    #[test]
    fn test_disc_prefix() {
        let mut snapshot = tags("Pink Floyd", "The Wall", "Hey You", 1);
        snapshot.disc = 2;
        let plan = planner().plan(Path::new("/in/x.flac"), &snapshot);
        assert_eq!(
            plan.usable_path(),
            Some(Path::new("/music/Pink Floyd/The Wall/02-01 - Hey You.flac"))
        );
    }

    #[test]
    fn test_missing_album_flattens() {
        let plan = planner().plan(Path::new("/in/x.ogg"), &tags("Björk", "", "Joga", 7));
        assert_eq!(plan.usable_path(), Some(Path::new("/music/Björk/07 - Joga.ogg")));
    }

    #[test]
    fn test_various_artists_drops_artist_folder() {
        for alias in ["Various Artists", "VA", " v/a ", "Compilation"] {
            let plan = planner().plan(Path::new("/in/x.mp3"), &tags(alias, "Now 42", "Song", 3));
            assert_eq!(plan.usable_path(), Some(Path::new("/music/Now 42/03 - Song.mp3")));
        }
        // Without an album the alias is just an artist name
        let plan = planner().plan(Path::new("/in/x.mp3"), &tags("VA", "", "Song", 3));
        assert_eq!(plan.usable_path(), Some(Path::new("/music/VA/03 - Song.mp3")));
    }

    #[test]
    fn test_title_falls_back_to_file_stem() {
        let plan = planner().plan(Path::new("/in/Intro.mp3"), &tags("Artist", "Album", "", 0));
        assert_eq!(
            plan.usable_path(),
            Some(Path::new("/music/Artist/Album/00 - Intro.mp3"))
        );
    }

    #[test]
    fn test_sanitize_failures_are_prefixed() {
        let plan = planner().plan(Path::new("/in/x.mp3"), &tags("Artist", "Album", "???", 1));
        assert_eq!(plan.problem.as_deref(), Some("TITLE:EMPTY_AFTER_SANITIZE"));
        assert_eq!(plan.path, None);

        let plan = planner().plan(Path::new("/in/x.mp3"), &tags("CON", "Album", "Song", 1));
        assert_eq!(plan.problem.as_deref(), Some("ARTIST:RESERVED_NAME"));

        let plan = planner().plan(Path::new("/in/x.mp3"), &tags("Artist", "Bad\u{7}", "Song", 1));
        assert_eq!(plan.problem.as_deref(), Some("ALBUM:INVALID_CHARS"));

        // Artist is sanitized even on the compilation branch
        let plan = planner().plan(Path::new("/in/x.mp3"), &tags("Various", "***", "Song", 1));
        assert_eq!(plan.problem.as_deref(), Some("ALBUM:EMPTY_AFTER_SANITIZE"));
    }

    #[test]
    fn test_too_long_path_is_reported_with_length() {
        let title = "x".repeat(300);
        let plan = planner().plan(Path::new("/in/x.mp3"), &tags("A", "B", &title, 1));
        let path = plan.path.clone().expect("path kept for diagnostics");
        let length = path_length(&path);
        assert!(length > DEFAULT_PATH_SOFT_MAX);
        assert_eq!(plan.problem, Some(format!("TARGET_PATH_TOO_LONG:{}", length)));
        assert_eq!(plan.usable_path(), None);
    }

    #[test]
    fn test_soft_max_is_configurable() {
        let snapshot = tags("Artist", "Album", "Song", 1);
        let source = Path::new("/in/x.mp3");
        // "/music/Artist/Album/01 - Song.mp3" is 33 characters
        assert!(planner().with_soft_max(33).plan(source, &snapshot).usable_path().is_some());
        assert_eq!(
            planner().with_soft_max(32).plan(source, &snapshot).problem.as_deref(),
            Some("TARGET_PATH_TOO_LONG:33")
        );
    }

    #[test]
    fn test_plan_is_deterministic() {
        let snapshot = tags("Massive Attack", "Mezzanine", "Teardrop", 3);
        let source = Path::new("/in/03.flac");
        assert_eq!(planner().plan(source, &snapshot), planner().plan(source, &snapshot));
    }
}
