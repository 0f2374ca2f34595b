//! Retrieve and verify one remote file, all or nothing.
//!
//! Bytes land in `<name>.part` first and are promoted to `<name>` only once
//! the size matches what the server listed, so a final name never holds a
//! partial file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::error::TransferError;
use super::models::{RemoteCleanup, TransferOutcome};
use crate::base_system::file_cleaner::{promote_no_clobber, sibling_with_suffix};
use crate::remote::transport::{RemoteEntry, RemoteFs};

pub const PART_SUFFIX: &str = ".part";

pub struct DownloadTransaction<'a, R: RemoteFs + ?Sized> {
    remote: &'a R,
    job_name: &'a str,
    target_dir: &'a Path,
    delete_remote: bool,
}

impl<'a, R: RemoteFs + ?Sized> DownloadTransaction<'a, R> {
    pub fn new(remote: &'a R, job_name: &'a str, target_dir: &'a Path, delete_remote: bool) -> Self {
        Self {
            remote,
            job_name,
            target_dir,
            delete_remote,
        }
    }

    /// `position` is only used to tag log lines.
    pub fn execute(
        &self,
        entry: &RemoteEntry,
        position: &str,
    ) -> Result<TransferOutcome, TransferError> {
        let job = self.job_name;
        let final_path = self.final_path(entry)?;

        if final_path.exists() {
            debug!(
                "Job {job}: {} already exists; skipping {}",
                final_path.display(),
                entry.path
            );
            return Ok(TransferOutcome::AlreadyPresent);
        }

        let temp_path = sibling_with_suffix(&final_path, PART_SUFFIX);
        if temp_path.exists() {
            warn!("Job {job}: removing stale temp file {}", temp_path.display());
            fs::remove_file(&temp_path)
                .map_err(|e| TransferError::io("remove stale temp", &temp_path, e))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .map_err(|e| TransferError::io("create temp", &temp_path, e))?;

        debug!(
            "Job {job}: {position} 1/3[DOWN] {} -> {}",
            entry.path,
            temp_path.display()
        );
        if let Err(err) = self.fetch_verified(entry, file, &temp_path) {
            discard(&temp_path);
            return Err(err);
        }

        if let Err(err) = promote_no_clobber(&temp_path, &final_path) {
            discard(&temp_path);
            return Err(TransferError::io("promote", &final_path, err));
        }
        debug!(
            "Job {job}: {position} 2/3[CHEK] promoted temp file to {}",
            final_path.display()
        );

        Ok(TransferOutcome::Downloaded {
            remote: self.cleanup_remote(entry, position),
        })
    }

    fn final_path(&self, entry: &RemoteEntry) -> Result<PathBuf, TransferError> {
        let name = entry.name.as_str();
        let unsafe_name = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\');
        if unsafe_name {
            return Err(TransferError::UnsafeName {
                name: name.to_string(),
            });
        }
        Ok(self.target_dir.join(name))
    }

    fn fetch_verified(
        &self,
        entry: &RemoteEntry,
        file: File,
        temp_path: &Path,
    ) -> Result<(), TransferError> {
        let mut reader = self
            .remote
            .open_read(&entry.path)
            .map_err(|source| TransferError::Remote {
                path: entry.path.clone(),
                source,
            })?;

        let mut writer = BufWriter::new(file);
        io::copy(&mut reader, &mut writer).map_err(|source| TransferError::Stream {
            path: entry.path.clone(),
            source,
        })?;
        writer
            .flush()
            .map_err(|e| TransferError::io("flush temp", temp_path, e))?;
        let file = writer
            .into_inner()
            .map_err(|e| TransferError::io("flush temp", temp_path, e.into_error()))?;
        file.sync_all()
            .map_err(|e| TransferError::io("sync temp", temp_path, e))?;
        drop(file);

        let actual = fs::metadata(temp_path)
            .map_err(|e| TransferError::io("stat temp", temp_path, e))?
            .len();
        if actual != entry.size {
            return Err(TransferError::SizeMismatch {
                path: entry.path.clone(),
                expected: entry.size,
                actual,
            });
        }
        Ok(())
    }

    /// Runs only after promotion; a refused delete never affects the local copy.
    fn cleanup_remote(&self, entry: &RemoteEntry, position: &str) -> RemoteCleanup {
        let job = self.job_name;
        if !self.delete_remote {
            debug!(
                "Job {job}: {position} 3/3[KEEP] remote retention requested; leaving {}",
                entry.path
            );
            return RemoteCleanup::Kept;
        }

        match self.remote.delete(&entry.path) {
            Ok(()) => {
                debug!("Job {job}: {position} 3/3[DELE] removed remote file {}", entry.path);
                RemoteCleanup::Deleted
            }
            Err(err) => {
                warn!(
                    "Job {job}: downloaded {} but could not delete it remotely: {err}",
                    entry.path
                );
                RemoteCleanup::DeleteFailed
            }
        }
    }
}

fn discard(temp_path: &Path) {
    match fs::remove_file(temp_path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => {
            warn!("unable to remove temp file {}: {err}", temp_path.display());
        }
        _ => {}
    }
}
