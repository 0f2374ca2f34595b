//! Local filesystem helpers: emptiness checks, stale temp purge, no-clobber promotion.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

pub fn is_empty_dir(path: impl AsRef<Path>) -> io::Result<bool> {
    let path = path.as_ref();
    let mut entries = fs::read_dir(path)?;
    Ok(entries.next().is_none())
}

/// Remove the directory with everything in it, then recreate it empty.
pub fn clear_dir(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    fs::create_dir_all(path)
}

/// Best-effort delete of top-level files in `dir` whose name ends with `suffix`.
///
/// Failures are logged and skipped. Returns the number of files removed.
pub fn purge_with_suffix(dir: &Path, suffix: &str) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("unable to scan {} for stale files: {err}", dir.display());
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.filter_map(|e| e.ok()) {
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(suffix));
        if !is_file || !matches {
            continue;
        }
        let path = entry.path();
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(err) => warn!("unable to remove stale file {}: {err}", path.display()),
        }
    }
    removed
}

const STAGING_SUFFIX: &str = ".promote";

/// Move a finished file to its final name without ever replacing an existing one.
///
/// Same filesystem: hard link + unlink, which fails atomically when `dest`
/// exists. Across filesystems the bytes are first copied to a hidden
/// `.<name>.promote` staging file next to `dest`, so `dest` itself only
/// appears complete. Leftover staging files are removed by [`purge_staging`].
pub fn promote_no_clobber(src: &Path, dest: &Path) -> io::Result<()> {
    if dest.exists() {
        return Err(already_exists(dest));
    }

    match fs::hard_link(src, dest) {
        Ok(()) => return remove_source(src),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => return Err(err),
        Err(_) => {}
    }

    // Hard links unavailable (other device, or filesystem without links).
    let staging = staging_path(dest);
    if let Err(err) = fs::copy(src, &staging).and_then(|_| fs::File::open(&staging)?.sync_all()) {
        let _ = fs::remove_file(&staging);
        return Err(err);
    }
    if dest.exists() {
        let _ = fs::remove_file(&staging);
        return Err(already_exists(dest));
    }
    if let Err(err) = fs::rename(&staging, dest) {
        let _ = fs::remove_file(&staging);
        return Err(err);
    }
    remove_source(src)
}

/// Best-effort removal of staging files a crashed cross-device promotion
/// left in `dir`. Returns the number of files removed.
pub fn purge_staging(dir: &Path) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return 0,
        Err(err) => {
            warn!("unable to scan {} for staging files: {err}", dir.display());
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.filter_map(|e| e.ok()) {
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        let is_staging = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.') && name.ends_with(STAGING_SUFFIX));
        if !is_file || !is_staging {
            continue;
        }
        let path = entry.path();
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(err) => warn!("unable to remove staging file {}: {err}", path.display()),
        }
    }
    removed
}

fn staging_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}{STAGING_SUFFIX}"))
}

pub fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn remove_source(src: &Path) -> io::Result<()> {
    match fs::remove_file(src) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

fn already_exists(dest: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("destination {} already exists", dest.display()),
    )
}
