use std::time::Instant;

use globset::GlobMatcher;
use tracing::{debug, error, info};

use super::error::FolderError;
use super::models::FolderResult;
use super::progress::{LineSink, ProgressSampler, format_position};
use super::transaction::DownloadTransaction;
use crate::base_system::cancel::CancelToken;
use crate::base_system::context::JobSpec;
use crate::remote::transport::{RemoteEntry, RemoteFs};

/// Lists one remote folder, filters it, and downloads every candidate in
/// listing order. A failing file is recorded and the loop moves on.
pub struct FolderDownloader<'a, R: RemoteFs + ?Sized> {
    remote: &'a R,
    job: &'a JobSpec,
    matcher: &'a GlobMatcher,
    cancel: &'a CancelToken,
}

impl<'a, R: RemoteFs + ?Sized> FolderDownloader<'a, R> {
    pub fn new(
        remote: &'a R,
        job: &'a JobSpec,
        matcher: &'a GlobMatcher,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            remote,
            job,
            matcher,
            cancel,
        }
    }

    pub fn run(&self, folder: &str, sink: &mut dyn LineSink) -> Result<FolderResult, FolderError> {
        let job = &self.job.name;
        let started = Instant::now();
        let mut result = FolderResult::new(folder);

        debug!("Job {job}: listing {folder}");
        let entries = self
            .remote
            .list(folder)
            .map_err(|source| FolderError::Listing {
                folder: folder.to_string(),
                source,
            })?;
        let listed = entries.len();

        let candidates: Vec<RemoteEntry> = entries
            .into_iter()
            .filter(|entry| self.is_candidate(entry))
            .collect();
        debug!(
            "Job {job}: {folder} has {} candidate files out of {listed} entries matching {}",
            candidates.len(),
            self.job.effective_pattern()
        );

        result.total_candidates = candidates.len();
        if candidates.is_empty() {
            result.duration = started.elapsed();
            return Ok(result);
        }

        let total = candidates.len();
        let mut sampler = ProgressSampler::new(folder, total);
        let transaction = DownloadTransaction::new(
            self.remote,
            job,
            self.job.local_target(),
            self.job.delete_remote_after_success,
        );

        for (index, entry) in candidates.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(
                    "Job {job}: cancelled in {folder} after {}/{total} files",
                    result.processed()
                );
                result.interrupted = true;
                break;
            }

            match transaction.execute(entry, &format_position(index, total)) {
                Ok(_) => result.record_success(),
                Err(err) => {
                    error!("Job {job}: failed to download {}: {err}", entry.path);
                    result.record_failure(&entry.path);
                }
            }

            sampler.emit(index + 1, result.success_count, result.failure_count, sink);
        }

        debug!(
            "Job {job}: {folder} done, {}/{} progress lines",
            sampler.emitted(),
            sampler.target_emissions()
        );
        result.duration = started.elapsed();
        Ok(result)
    }

    fn is_candidate(&self, entry: &RemoteEntry) -> bool {
        entry.is_regular_file && self.matcher.is_match(&entry.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::MemoryRemote;
    use std::fs;
    use std::path::Path;

    fn job_for(dir: &Path, pattern: &str) -> JobSpec {
        let mut job = JobSpec::new("invoices", dir.display().to_string());
        job.remote_folders.push("/in".to_string());
        job.search_pattern = pattern.to_string();
        job
    }

    fn scenario_remote() -> MemoryRemote {
        MemoryRemote::new()
            .with_file("/in", "a.dat", &[1u8; 100])
            .with_dir("/in", "nested")
            .with_file("/in", "b.dat", &[2u8; 200])
            .with_file("/in", "c.dat", &[3u8; 300])
    }

    #[test]
    fn downloads_regular_files_and_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_for(dir.path(), "*");
        let matcher = job.name_matcher().unwrap();
        let cancel = CancelToken::new();
        let remote = scenario_remote();
        let mut lines: Vec<String> = Vec::new();

        let result = FolderDownloader::new(&remote, &job, &matcher, &cancel)
            .run("/in", &mut lines)
            .unwrap();

        assert_eq!(result.total_candidates, 3);
        assert_eq!(result.success_count, 3);
        assert_eq!(result.failure_count, 0);
        assert!(!result.interrupted);
        assert_eq!(fs::read(dir.path().join("b.dat")).unwrap().len(), 200);
        assert!(!dir.path().join("nested").exists());
        assert_eq!(lines, vec!["/in progress 3/3 (~100%) | Success 3 | Fail 0"]);
    }

    #[test]
    fn no_candidates_yields_empty_result_without_progress() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_for(dir.path(), "*.xml");
        let matcher = job.name_matcher().unwrap();
        let cancel = CancelToken::new();
        let remote = scenario_remote();
        let mut lines: Vec<String> = Vec::new();

        let result = FolderDownloader::new(&remote, &job, &matcher, &cancel)
            .run("/in", &mut lines)
            .unwrap();

        assert_eq!(
            (result.total_candidates, result.success_count, result.failure_count),
            (0, 0, 0)
        );
        assert!(lines.is_empty());
        assert_eq!(remote.reads.get(), 0);
    }

    #[test]
    fn pattern_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_for(dir.path(), "A.*");
        let matcher = job.name_matcher().unwrap();
        let cancel = CancelToken::new();
        let remote = scenario_remote();

        let result = FolderDownloader::new(&remote, &job, &matcher, &cancel)
            .run("/in", &mut Vec::<String>::new())
            .unwrap();
        assert_eq!(result.total_candidates, 1);
        assert!(dir.path().join("a.dat").exists());
    }

    #[test]
    fn failures_are_isolated_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_for(dir.path(), "*");
        let matcher = job.name_matcher().unwrap();
        let cancel = CancelToken::new();
        let remote = MemoryRemote::new()
            .with_file("/in", "one", b"1")
            .with_lying_file("/in", "two", &[0u8; 480], 500)
            .with_file("/in", "three", b"333")
            .with_broken_read("/in/three")
            .with_file("/in", "four", b"4444");

        let result = FolderDownloader::new(&remote, &job, &matcher, &cancel)
            .run("/in", &mut Vec::<String>::new())
            .unwrap();

        assert_eq!(result.total_candidates, 4);
        assert_eq!(result.success_count, 2);
        assert_eq!(result.failure_count, 2);
        assert_eq!(result.processed(), result.total_candidates);
        assert_eq!(result.failed_files, vec!["/in/two", "/in/three"]);
        assert!(dir.path().join("four").exists());
        assert!(!dir.path().join("two").exists());
    }

    #[test]
    fn listing_failure_is_reported_as_folder_error() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_for(dir.path(), "*");
        let matcher = job.name_matcher().unwrap();
        let cancel = CancelToken::new();
        let remote = scenario_remote().with_broken_listing("/in");

        let err = FolderDownloader::new(&remote, &job, &matcher, &cancel)
            .run("/in", &mut Vec::<String>::new())
            .unwrap_err();
        assert!(matches!(err, FolderError::Listing { .. }));
    }

    #[test]
    fn second_run_transfers_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_for(dir.path(), "*");
        let matcher = job.name_matcher().unwrap();
        let cancel = CancelToken::new();
        let remote = scenario_remote();
        let downloader = FolderDownloader::new(&remote, &job, &matcher, &cancel);

        downloader.run("/in", &mut Vec::<String>::new()).unwrap();
        let reads_after_first = remote.reads.get();

        let second = downloader.run("/in", &mut Vec::<String>::new()).unwrap();
        assert_eq!(remote.reads.get(), reads_after_first);
        assert_eq!(second.success_count, second.total_candidates);
        assert_eq!(second.failure_count, 0);
    }

    #[test]
    fn cancellation_stops_between_files() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_for(dir.path(), "*");
        let matcher = job.name_matcher().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let remote = scenario_remote();

        let result = FolderDownloader::new(&remote, &job, &matcher, &cancel)
            .run("/in", &mut Vec::<String>::new())
            .unwrap();
        assert!(result.interrupted);
        assert_eq!(result.total_candidates, 3);
        assert_eq!(result.processed(), 0);
        assert_eq!(remote.reads.get(), 0);
    }
}
