use std::path::Path;

/// Audio formats the scanner plans. Anything else is ignored or, if it is
/// a known sidecar, carried along with its album.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "m4a", "aac", "wav", "wma"];

/// Cover art and artwork saved next to the tracks
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tif", "tiff"];

/// Rip logs, cue sheets, playlists and checksums
pub const DOCUMENT_EXTENSIONS: &[&str] = &[
    "cue", "log", "m3u", "m3u8", "nfo", "txt", "pdf", "sfv", "md5",
];

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Check if a file path has a supported audio extension (case-insensitive)
pub fn is_audio_file<P: AsRef<Path>>(path: P) -> bool {
    lowercase_extension(path.as_ref())
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
}

/// Check if a file is a sidecar that travels with its album folder
pub fn is_sidecar_file<P: AsRef<Path>>(path: P) -> bool {
    lowercase_extension(path.as_ref()).is_some_and(|ext| {
        IMAGE_EXTENSIONS.contains(&ext.as_str()) || DOCUMENT_EXTENSIONS.contains(&ext.as_str())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_audio_file() {
        assert!(is_audio_file("test.mp3"));
        assert!(is_audio_file("test.flac"));
        assert!(is_audio_file("test.WMA"));
        assert!(is_audio_file("Some Dir/01 - Track.M4A"));
        assert!(!is_audio_file("test.aiff"));
        assert!(!is_audio_file("test.txt"));
        assert!(!is_audio_file("test"));
    }

    #[test]
    fn test_is_sidecar_file() {
        assert!(is_sidecar_file("cover.jpg"));
        assert!(is_sidecar_file("Folder.PNG"));
        assert!(is_sidecar_file("rip.log"));
        assert!(is_sidecar_file("album.m3u8"));
        assert!(is_sidecar_file("checksums.md5"));
        assert!(!is_sidecar_file("track.mp3"));
        assert!(!is_sidecar_file("desktop.ini"));
        assert!(!is_sidecar_file("noext"));
    }
}
