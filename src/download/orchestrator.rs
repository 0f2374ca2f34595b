use std::collections::HashSet;

use tracing::{info, warn};

use super::archive::Archiver;
use super::error::RunError;
use super::job::JobExecutor;
use super::models::JobResult;
use super::progress::LineSink;
use super::report;
use crate::base_system::cancel::CancelToken;
use crate::base_system::context::{JobSpec, validate_jobs};
use crate::remote::transport::SessionFactory;

/// Case-insensitive set of job names. Empty means every job runs.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    names: HashSet<String>,
}

impl JobFilter {
    /// Blank entries are ignored.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        Self { names }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn matches(&self, job_name: &str) -> bool {
        self.is_empty() || self.names.contains(&job_name.trim().to_lowercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// Stopped early; the results gathered so far were still reported.
    Cancelled,
    Fatal,
}

impl RunStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            RunStatus::Completed => 0,
            RunStatus::Fatal => 1,
            RunStatus::Cancelled => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub status: RunStatus,
    pub jobs: Vec<JobResult>,
}

/// Drives one run: selects jobs, owns the remote session, reports at the end.
pub struct Orchestrator<'a, F: SessionFactory> {
    factory: &'a F,
    archiver: &'a Archiver,
    cancel: &'a CancelToken,
}

impl<'a, F: SessionFactory> Orchestrator<'a, F> {
    pub fn new(factory: &'a F, archiver: &'a Archiver, cancel: &'a CancelToken) -> Self {
        Self {
            factory,
            archiver,
            cancel,
        }
    }

    /// Errors only for problems found before any job starts.
    pub fn run(
        &self,
        jobs: &[JobSpec],
        filter: &JobFilter,
        sink: &mut dyn LineSink,
    ) -> Result<RunSummary, RunError> {
        validate_jobs(jobs, self.archiver.workspace())?;

        let selected: Vec<&JobSpec> = jobs.iter().filter(|job| filter.matches(&job.name)).collect();
        if selected.is_empty() {
            warn!("No jobs matched the provided filters");
            return Ok(RunSummary {
                status: RunStatus::Completed,
                jobs: Vec::new(),
            });
        }
        info!("running {} of {} configured job(s)", selected.len(), jobs.len());

        let mut results = Vec::with_capacity(selected.len());
        {
            let session = self.factory.connect().map_err(RunError::Session)?;
            let executor = JobExecutor::new(&session, self.archiver, self.cancel);
            for (index, job) in selected.iter().enumerate() {
                if self.cancel.is_cancelled() {
                    warn!(
                        "cancellation requested; {} job(s) not started",
                        selected.len() - index
                    );
                    break;
                }
                results.push(executor.run(job, sink));
            }
        }

        let interrupted = self.cancel.is_cancelled() || results.iter().any(|r| r.interrupted);
        report::print(&results, sink);

        Ok(RunSummary {
            status: if interrupted {
                RunStatus::Cancelled
            } else {
                RunStatus::Completed
            },
            jobs: results,
        })
    }
}
