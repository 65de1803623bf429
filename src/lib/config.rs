use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::planner::DEFAULT_PATH_SOFT_MAX;
use crate::scanner::DEFAULT_PROBLEMS_DIR;

/// Overrides the path-length soft limit
pub const SOFT_MAX_ENV: &str = "MSORT_PATH_SOFT_MAX";
/// Overrides the name of the quarantine directory
pub const PROBLEMS_DIR_ENV: &str = "MSORT_PROBLEMS_DIR";

/// Settings for one controller: where to read, where to write, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SorterConfig {
    pub source: PathBuf,
    pub target: PathBuf,
    /// false = copy, true = move
    pub move_mode: bool,
    pub path_soft_max: usize,
    pub problems_dir_name: String,
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            target: PathBuf::new(),
            move_mode: false,
            path_soft_max: DEFAULT_PATH_SOFT_MAX,
            problems_dir_name: DEFAULT_PROBLEMS_DIR.to_string(),
        }
    }
}

impl SorterConfig {
    /// Defaults overlaid with the `MSORT_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = get(SOFT_MAX_ENV) {
            config.path_soft_max = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be a positive integer, got '{}'", SOFT_MAX_ENV, raw))?;
        }

        if let Some(name) = get(PROBLEMS_DIR_ENV).filter(|n| !n.trim().is_empty()) {
            config.problems_dir_name = name.trim().to_string();
        }

        Ok(config)
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.target = target.into();
        self
    }
}

/// Expand `~` and `$VAR` in a user-supplied path
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).as_ref()),
    }
}

pub fn get_default_music_dir() -> String {
    std::env::var("XDG_MUSIC_DIR").unwrap_or_else(|_| "~/Music".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() -> Result<()> {
        let config = SorterConfig::from_vars(|_| None)?;
        assert_eq!(config.path_soft_max, 245);
        assert_eq!(config.problems_dir_name, "_PROBLEMES");
        assert!(!config.move_mode);
        Ok(())
    }

    #[test]
    fn test_env_overrides() -> Result<()> {
        let config = SorterConfig::from_vars(|key| match key {
            SOFT_MAX_ENV => Some(" 200 ".to_string()),
            PROBLEMS_DIR_ENV => Some("_QUARANTINE".to_string()),
            _ => None,
        })?;
        assert_eq!(config.path_soft_max, 200);
        assert_eq!(config.problems_dir_name, "_QUARANTINE");
        Ok(())
    }

    #[test]
    fn test_invalid_soft_max_is_rejected() {
        let result = SorterConfig::from_vars(|key| (key == SOFT_MAX_ENV).then(|| "lots".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_expand_path_keeps_plain_paths() {
        assert_eq!(expand_path("/srv/music"), PathBuf::from("/srv/music"));
    }
}
