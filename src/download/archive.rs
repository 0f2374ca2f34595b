//! Post-job `.tar.gz` snapshot of a job's local output.
//!
//! The archive is built in a private workspace and moved into the archive
//! folder only when complete. The local folder is emptied only after that
//! move succeeded.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, info, warn};

use super::error::ArchiveError;
use crate::base_system::cancel::CancelToken;
use crate::base_system::context::JobSpec;
use crate::base_system::file_cleaner::{
    clear_dir, is_empty_dir, promote_no_clobber, purge_staging, purge_with_suffix,
};

const ARCHIVE_EXT: &str = ".tar.gz";
const TEMP_EXT: &str = ".tar.gz.tmp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// No archive folder configured, or nothing to archive.
    Skipped,
    Archived(PathBuf),
}

/// Points at which a running archive step honours cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Checkpoint {
    BeforeBuild,
    AfterWrite,
    BeforeClear,
}

pub struct Archiver {
    workspace: PathBuf,
    #[cfg(test)]
    cancel_at: Option<Checkpoint>,
}

impl Archiver {
    /// `workspace` must differ from every job's target and archive folders.
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            #[cfg(test)]
            cancel_at: None,
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn archive(&self, job: &JobSpec, cancel: &CancelToken) -> Result<ArchiveOutcome, ArchiveError> {
        self.archive_with_stamp(job, cancel, &local_timestamp())
    }

    pub(crate) fn archive_with_stamp(
        &self,
        job: &JobSpec,
        cancel: &CancelToken,
        stamp: &str,
    ) -> Result<ArchiveOutcome, ArchiveError> {
        let Some(archive_dir) = job.archive_dir() else {
            return Ok(ArchiveOutcome::Skipped);
        };
        self.checkpoint(Checkpoint::BeforeBuild, job, cancel)?;

        let source = job.local_target();
        if !source.is_dir() {
            warn!(
                "Job {}: local folder {} does not exist; skipping archive",
                job.name,
                source.display()
            );
            return Ok(ArchiveOutcome::Skipped);
        }
        let empty = is_empty_dir(source).map_err(|e| ArchiveError::io("scan source", source, e))?;
        if empty {
            debug!("Job {}: no files to archive in {}", job.name, source.display());
            return Ok(ArchiveOutcome::Skipped);
        }

        fs::create_dir_all(archive_dir)
            .map_err(|e| ArchiveError::io("create archive folder", archive_dir, e))?;
        fs::create_dir_all(&self.workspace)
            .map_err(|e| ArchiveError::io("create workspace", &self.workspace, e))?;
        let purged = purge_with_suffix(&self.workspace, TEMP_EXT);
        if purged > 0 {
            info!("removed {purged} stale temp archive(s) from {}", self.workspace().display());
        }
        let purged = purge_staging(archive_dir);
        if purged > 0 {
            info!("removed {purged} stale staging file(s) from {}", archive_dir.display());
        }

        let file_name = format!("{}_{stamp}{ARCHIVE_EXT}", job.name);
        let temp_path = self.workspace.join(format!("{}_{stamp}{TEMP_EXT}", job.name));
        let final_path = archive_dir.join(&file_name);

        if let Err(err) = self.build_and_promote(job, source, &temp_path, &final_path, cancel) {
            discard(&temp_path);
            return Err(err);
        }
        info!(
            "Job {}: archived {} to {}",
            job.name,
            source.display(),
            final_path.display()
        );

        if let Err(err) = self.checkpoint(Checkpoint::BeforeClear, job, cancel) {
            warn!(
                "Job {}: cancelled after archiving; {} was not cleared",
                job.name,
                source.display()
            );
            return Err(err);
        }
        clear_dir(source).map_err(|e| ArchiveError::io("clear source", source, e))?;
        debug!(
            "Job {}: cleared source folder {} after archiving",
            job.name,
            source.display()
        );

        Ok(ArchiveOutcome::Archived(final_path))
    }

    fn build_and_promote(
        &self,
        job: &JobSpec,
        source: &Path,
        temp_path: &Path,
        final_path: &Path,
        cancel: &CancelToken,
    ) -> Result<(), ArchiveError> {
        self.checkpoint(Checkpoint::BeforeBuild, job, cancel)?;
        if temp_path.exists() {
            fs::remove_file(temp_path)
                .map_err(|e| ArchiveError::io("remove stale temp", temp_path, e))?;
        }

        write_tar_gz(source, &root_name(job, source), temp_path)?;

        self.checkpoint(Checkpoint::AfterWrite, job, cancel)?;
        promote_no_clobber(temp_path, final_path)
            .map_err(|e| ArchiveError::io("move archive", final_path, e))
    }

    fn checkpoint(
        &self,
        at: Checkpoint,
        job: &JobSpec,
        cancel: &CancelToken,
    ) -> Result<(), ArchiveError> {
        #[cfg(test)]
        {
            if self.cancel_at == Some(at) {
                cancel.cancel();
            }
        }
        cancel.checkpoint().map_err(|_| {
            debug!("Job {}: archive cancelled at {at:?}", job.name);
            ArchiveError::Cancelled
        })
    }
}

/// Writes `source` (as `root/...`) into a gzip-compressed tar at `dest`.
fn write_tar_gz(source: &Path, root: &str, dest: &Path) -> Result<(), ArchiveError> {
    let file = File::create_new(dest).map_err(|e| ArchiveError::io("create temp", dest, e))?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::best());
    let mut builder = tar::Builder::new(encoder);
    builder
        .append_dir_all(root, source)
        .map_err(|e| ArchiveError::io("write tar", source, e))?;

    let encoder = builder
        .into_inner()
        .map_err(|e| ArchiveError::io("finish tar", dest, e))?;
    let writer = encoder
        .finish()
        .map_err(|e| ArchiveError::io("finish gzip", dest, e))?;
    let file = writer
        .into_inner()
        .map_err(|e| ArchiveError::io("flush archive", dest, e.into_error()))?;
    file.sync_all()
        .map_err(|e| ArchiveError::io("sync archive", dest, e))
}

fn root_name(job: &JobSpec, source: &Path) -> String {
    source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| job.name.clone())
}

fn discard(temp_path: &Path) {
    if temp_path.exists() {
        if let Err(err) = fs::remove_file(temp_path) {
            warn!("unable to remove temp archive {}: {err}", temp_path.display());
        }
    }
}

/// `yyyyMMddHHmmss` in local time (UTC if the local offset is unavailable).
fn local_timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!(
        "[year][month][day][hour][minute][second]"
    ))
    .unwrap_or_else(|_| now.unix_timestamp().to_string())
}
