//! Result records produced by one run.
//!
//! Created empty when their unit starts, filled in only by the component
//! that owns the unit, and handed upward when it finishes.

use std::time::Duration;

/// What happened to one candidate file that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The final file already exists locally; nothing was transferred.
    AlreadyPresent,
    Downloaded { remote: RemoteCleanup },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCleanup {
    Kept,
    Deleted,
    /// The local copy is safe but the remote delete was refused.
    DeleteFailed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderResult {
    pub folder: String,
    pub total_candidates: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub failed_files: Vec<String>,
    pub duration: Duration,
    /// Set when cancellation stopped the folder before every candidate ran.
    pub interrupted: bool,
}

impl FolderResult {
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            ..Self::default()
        }
    }

    pub fn processed(&self) -> usize {
        self.success_count + self.failure_count
    }

    pub(crate) fn record_success(&mut self) {
        self.success_count += 1;
    }

    pub(crate) fn record_failure(&mut self, remote_path: &str) {
        self.failure_count += 1;
        self.failed_files.push(remote_path.to_string());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobResult {
    pub job_name: String,
    pub duration: Duration,
    pub folder_results: Vec<FolderResult>,
    /// Set when cancellation stopped the job part-way.
    pub interrupted: bool,
}

impl JobResult {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            ..Self::default()
        }
    }

    pub fn total_candidates(&self) -> usize {
        self.folder_results.iter().map(|f| f.total_candidates).sum()
    }

    pub fn total_success(&self) -> usize {
        self.folder_results.iter().map(|f| f.success_count).sum()
    }

    pub fn total_failures(&self) -> usize {
        self.folder_results.iter().map(|f| f.failure_count).sum()
    }
}
