use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::apply::ApplyError;

/// Highest ` (N)` suffix tried before giving up on a name
pub const MAX_COLLISION_SUFFIX: u32 = 999;

/// Anything at all sits at `path`, broken symlinks included
fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn first_free_suffix<F>(path: &Path, candidate: F) -> Result<PathBuf, ApplyError>
where
    F: Fn(u32) -> PathBuf,
{
    if !occupied(path) {
        return Ok(path.to_path_buf());
    }
    (1..=MAX_COLLISION_SUFFIX)
        .map(candidate)
        .find(|p| !occupied(p))
        .ok_or_else(|| ApplyError::CollisionsExhausted {
            path: path.to_path_buf(),
        })
}

/// First free name among `name.ext`, `name (1).ext` ... `name (999).ext`
pub fn resolve_file_collision(target: &Path) -> Result<PathBuf, ApplyError> {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = target
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    first_free_suffix(target, |n| target.with_file_name(format!("{} ({}){}", stem, n, ext)))
}

/// First free name among `dir`, `dir (1)` ... `dir (999)`
pub fn resolve_dir_collision(target: &Path) -> Result<PathBuf, ApplyError> {
    let name = target
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    first_free_suffix(target, |n| target.with_file_name(format!("{} ({})", name, n)))
}

/// EXDEV on Unix, ERROR_NOT_SAME_DEVICE on Windows
fn is_cross_device(e: &io::Error) -> bool {
    let code = if cfg!(windows) { 17 } else { 18 };
    e.raw_os_error() == Some(code)
}

/// Copy a file without ever replacing an existing destination
pub fn copy_file(source: &Path, destination: &Path) -> io::Result<u64> {
    let mut reader = File::open(source)?;
    let mut writer = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)?;
    let bytes = io::copy(&mut reader, &mut writer)?;
    if let Ok(metadata) = reader.metadata() {
        let _ = fs::set_permissions(destination, metadata.permissions());
    }
    Ok(bytes)
}

/// Rename, falling back to copy + delete across filesystems
pub fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            debug!(
                "Cross-device move, copying {} -> {}",
                source.display(),
                destination.display()
            );
            copy_file(source, destination)?;
            fs::remove_file(source)
        }
        Err(e) => Err(e),
    }
}

/// Copy a directory tree. Files that collide inside `destination` get a
/// suffixed name; subdirectories are merged.
pub fn copy_dir_recursive(source: &Path, destination: &Path) -> Result<(), ApplyError> {
    fs::create_dir_all(destination)?;

    let mut entries: Vec<fs::DirEntry> = fs::read_dir(source)?.collect::<io::Result<_>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let dest = destination.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&path, &dest)?;
        } else {
            let dest = resolve_file_collision(&dest)?;
            copy_file(&path, &dest)?;
        }
    }

    Ok(())
}

/// Move a directory tree, copying then deleting across filesystems
pub fn move_dir(source: &Path, destination: &Path) -> Result<(), ApplyError> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            copy_dir_recursive(source, destination)?;
            fs::remove_dir_all(source)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
