//! Turns raw tag strings into path segments that are safe on every target filesystem.

use serde::Serialize;
use std::fmt;

/// Characters stripped without complaint. They show up in real tags
/// ("AC/DC", "What?") and dropping them keeps the name recognisable.
pub const REMOVABLE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Device names Windows refuses as file or directory names
pub const RESERVED_NAMES: &[&str] = &["CON", "PRN", "AUX", "NUL"];

/// Placeholder returned when nothing usable is left
pub const UNKNOWN: &str = "Unknown";

/// Why a raw value could not become a path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SanitizeReason {
    EmptyValue,
    InvalidChars,
    EmptyAfterSanitize,
    ReservedName,
}

impl SanitizeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SanitizeReason::EmptyValue => "EMPTY_VALUE",
            SanitizeReason::InvalidChars => "INVALID_CHARS",
            SanitizeReason::EmptyAfterSanitize => "EMPTY_AFTER_SANITIZE",
            SanitizeReason::ReservedName => "RESERVED_NAME",
        }
    }
}

impl fmt::Display for SanitizeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`sanitize`]. When `reason` is set, `value` is for diagnostics
/// only and must never be joined into a real path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub value: String,
    pub reason: Option<SanitizeReason>,
}

impl Sanitized {
    fn ok(value: String) -> Self {
        Self { value, reason: None }
    }

    fn rejected(value: impl Into<String>, reason: SanitizeReason) -> Self {
        Self {
            value: value.into(),
            reason: Some(reason),
        }
    }

    /// The clean segment, or the reason it was refused
    pub fn into_result(self) -> Result<String, SanitizeReason> {
        match self.reason {
            None => Ok(self.value),
            Some(reason) => Err(reason),
        }
    }
}

/// Characters no filesystem we target accepts in a name, once the
/// removable set is gone: the ASCII control range, NUL included.
fn is_forbidden(c: char) -> bool {
    (c as u32) < 0x20
}

fn strip_removable(raw: &str) -> String {
    raw.chars().filter(|c| !REMOVABLE_CHARS.contains(c)).collect()
}

fn replace_forbidden(s: &str) -> String {
    s.chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect()
}

/// Sanitize a raw metadata value into a single path segment.
///
/// Rules apply in order: blank input, silent removal of [`REMOVABLE_CHARS`],
/// forbidden characters, empty-after-trim, then reserved device names.
pub fn sanitize(raw: &str) -> Sanitized {
    if raw.trim().is_empty() {
        return Sanitized::rejected(UNKNOWN, SanitizeReason::EmptyValue);
    }

    let stripped = strip_removable(raw);

    if stripped.chars().any(is_forbidden) {
        let partial = replace_forbidden(&stripped);
        let partial = partial.trim();
        let value = if partial.is_empty() { UNKNOWN } else { partial };
        return Sanitized::rejected(value, SanitizeReason::InvalidChars);
    }

    let cleaned = stripped.trim();
    if cleaned.is_empty() {
        return Sanitized::rejected(UNKNOWN, SanitizeReason::EmptyAfterSanitize);
    }

    if RESERVED_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(cleaned))
    {
        return Sanitized::rejected(format!("_{}_", cleaned), SanitizeReason::ReservedName);
    }

    Sanitized::ok(cleaned.to_string())
}

/// Lenient variant for names taken from existing source folders: never
/// fails, replaces what it cannot keep and falls back to [`UNKNOWN`].
pub fn sanitize_lenient(raw: &str) -> String {
    let cleaned = replace_forbidden(&strip_removable(raw));
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        UNKNOWN.to_string()
    } else {
        cleaned.to_string()
    }
}
