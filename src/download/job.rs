use std::fs;
use std::time::Instant;

use tracing::{error, info, warn};

use super::archive::Archiver;
use super::error::ArchiveError;
use super::folder::FolderDownloader;
use super::models::JobResult;
use super::progress::LineSink;
use crate::base_system::cancel::CancelToken;
use crate::base_system::context::JobSpec;
use crate::remote::transport::RemoteFs;

/// Runs one job: every configured folder in order, then the archive step.
pub struct JobExecutor<'a, R: RemoteFs + ?Sized> {
    remote: &'a R,
    archiver: &'a Archiver,
    cancel: &'a CancelToken,
}

impl<'a, R: RemoteFs + ?Sized> JobExecutor<'a, R> {
    pub fn new(remote: &'a R, archiver: &'a Archiver, cancel: &'a CancelToken) -> Self {
        Self {
            remote,
            archiver,
            cancel,
        }
    }

    /// Never fails: folder and archive errors are logged and the job goes on.
    pub fn run(&self, job: &JobSpec, sink: &mut dyn LineSink) -> JobResult {
        let started = Instant::now();
        let mut result = JobResult::new(&job.name);

        if job.remote_folders.is_empty() {
            warn!("Job {} has no remote folders configured; skipping", job.name);
            result.duration = started.elapsed();
            return result;
        }

        let target = job.local_target();
        if let Err(err) = fs::create_dir_all(target) {
            error!(
                "Job {}: unable to create local folder {}: {err}",
                job.name,
                target.display()
            );
            result.duration = started.elapsed();
            return result;
        }
        let matcher = match job.name_matcher() {
            Ok(matcher) => matcher,
            Err(err) => {
                error!("Job {}: {err}", job.name);
                result.duration = started.elapsed();
                return result;
            }
        };

        info!(
            "Job {}: starting {} remote folder(s) into {}",
            job.name,
            job.remote_folders.len(),
            target.display()
        );
        let downloader = FolderDownloader::new(self.remote, job, &matcher, self.cancel);
        for folder in &job.remote_folders {
            if self.cancel.is_cancelled() {
                info!("Job {}: cancelled before folder {folder}", job.name);
                result.interrupted = true;
                break;
            }

            match downloader.run(folder, sink) {
                Ok(folder_result) => {
                    let interrupted = folder_result.interrupted;
                    result.folder_results.push(folder_result);
                    if interrupted {
                        result.interrupted = true;
                        break;
                    }
                }
                Err(err) => error!("Job {}: {err}; skipping folder", job.name),
            }
        }

        if !result.interrupted {
            match self.archiver.archive(job, self.cancel) {
                Ok(_) => {}
                Err(ArchiveError::Cancelled) => {
                    info!("Job {}: archiving cancelled", job.name);
                    result.interrupted = true;
                }
                Err(err) => error!("Job {}: {err}", job.name),
            }
        }

        result.duration = started.elapsed();
        info!(
            "Job {} finished in {:.1}s: {} of {} candidate(s) succeeded, {} failed",
            job.name,
            result.duration.as_secs_f64(),
            result.total_success(),
            result.total_candidates(),
            result.total_failures()
        );
        result
    }
}
