//! Global configuration (`Config`), job definitions and startup validation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};

use super::config::{ConfigError, ConfigSpec, FieldMeta};

pub const DEFAULT_SEARCH_PATTERN: &str = "*";
pub const DEFAULT_RETENTION_DAYS: u32 = 30;
const MAX_RETENTION_DAYS: u32 = 3650;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sftp: SftpOptions,
    #[serde(default)]
    pub jobs: Vec<JobSpec>,
    #[serde(default)]
    pub logging: LoggingOptions,
    /// Scratch directory for in-progress archives. Defaults to the system temp dir.
    #[serde(default)]
    pub archive_workspace: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SftpOptions {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub private_key_path: Option<String>,
    #[serde(default)]
    pub private_key_passphrase: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SftpOptions {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            username: String::new(),
            password: None,
            private_key_path: None,
            private_key_passphrase: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// One download job. Immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    #[serde(default)]
    pub remote_folders: Vec<String>,
    #[serde(default)]
    pub local_target_folder: String,
    #[serde(default = "default_search_pattern")]
    pub search_pattern: String,
    #[serde(default)]
    pub delete_remote_after_success: bool,
    #[serde(default)]
    pub archive_folder: Option<String>,
}

impl JobSpec {
    pub fn new(name: impl Into<String>, local_target_folder: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote_folders: Vec::new(),
            local_target_folder: local_target_folder.into(),
            search_pattern: default_search_pattern(),
            delete_remote_after_success: false,
            archive_folder: None,
        }
    }

    pub fn local_target(&self) -> &Path {
        Path::new(&self.local_target_folder)
    }

    pub fn archive_dir(&self) -> Option<&Path> {
        self.archive_folder
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Path::new)
    }

    pub fn effective_pattern(&self) -> &str {
        let trimmed = self.search_pattern.trim();
        if trimmed.is_empty() {
            DEFAULT_SEARCH_PATTERN
        } else {
            trimmed
        }
    }

    /// Compile the job's name pattern into a case-insensitive matcher.
    pub fn name_matcher(&self) -> Result<GlobMatcher, ConfigError> {
        let pattern = self.effective_pattern();
        GlobBuilder::new(pattern)
            .case_insensitive(true)
            .literal_separator(false)
            .build()
            .map(|glob| glob.compile_matcher())
            .map_err(|err| {
                ConfigError::Validation(format!(
                    "job '{}' has an invalid search_pattern '{}': {}",
                    self.name, pattern, err
                ))
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingOptions {
    #[serde(default)]
    pub log_folder: Option<String>,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            log_folder: None,
            retention_days: default_retention_days(),
        }
    }
}

impl LoggingOptions {
    pub fn resolve_folder(&self, base_dir: Option<&Path>) -> PathBuf {
        match self.log_folder.as_deref().map(str::trim) {
            Some(folder) if !folder.is_empty() => PathBuf::from(folder),
            _ => base_dir
                .map(|b| b.join("logs"))
                .unwrap_or_else(|| PathBuf::from("logs")),
        }
    }
}

impl Config {
    pub fn archive_workspace_dir(&self) -> PathBuf {
        match self.archive_workspace.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => default_archive_workspace(),
        }
    }

    /// Startup validation. Everything here must pass before the remote session
    /// is opened.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jobs.is_empty() {
            return Err(ConfigError::Validation(
                "at least one job must be configured".to_string(),
            ));
        }
        validate_jobs(&self.jobs, &self.archive_workspace_dir())?;
        validate_sftp(&self.sftp)?;

        let days = self.logging.retention_days;
        if !(1..=MAX_RETENTION_DAYS).contains(&days) {
            return Err(ConfigError::Validation(format!(
                "logging.retention_days must be between 1 and {MAX_RETENTION_DAYS}, got {days}"
            )));
        }
        Ok(())
    }
}

/// Checks that apply to any job list, whatever its source.
///
/// Zero remote folders is accepted: such a job is skipped at run time.
/// The local folder, the archive folder and the archive `workspace` must not
/// contain one another, since archiving empties the local folder.
pub fn validate_jobs(jobs: &[JobSpec], workspace: &Path) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for job in jobs {
        if job.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "every job must have a name".to_string(),
            ));
        }
        if !seen.insert(job.name.trim().to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "job name '{}' is used more than once",
                job.name
            )));
        }
        if job.local_target_folder.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "job '{}' is missing local_target_folder",
                job.name
            )));
        }
        if job.local_target().is_file() {
            return Err(ConfigError::Validation(format!(
                "job '{}': local_target_folder {} is a file",
                job.name, job.local_target_folder
            )));
        }
        job.name_matcher()?;
        validate_archive_layout(job, workspace)?;
    }
    Ok(())
}

fn validate_archive_layout(job: &JobSpec, workspace: &Path) -> Result<(), ConfigError> {
    let target = job.local_target();
    let overlap = |what: &str, inner: &Path, outer: &Path| {
        ConfigError::Validation(format!(
            "job '{}': {what} {} must not be inside {}",
            job.name,
            inner.display(),
            outer.display()
        ))
    };

    if is_within(workspace, target) {
        return Err(overlap("archive workspace", workspace, target));
    }
    let Some(archive) = job.archive_dir() else {
        return Ok(());
    };
    if is_within(archive, target) {
        return Err(overlap("archive_folder", archive, target));
    }
    if is_within(target, archive) {
        return Err(overlap("local_target_folder", target, archive));
    }
    if is_within(workspace, archive) {
        return Err(overlap("archive workspace", workspace, archive));
    }
    Ok(())
}

/// Lexical containment (equal paths count), after making both paths absolute.
fn is_within(inner: &Path, outer: &Path) -> bool {
    let absolute = |p: &Path| std::path::absolute(p).unwrap_or_else(|_| p.to_path_buf());
    absolute(inner).starts_with(absolute(outer))
}

fn validate_sftp(sftp: &SftpOptions) -> Result<(), ConfigError> {
    if sftp.host.trim().is_empty() {
        return Err(ConfigError::Validation("sftp.host is required".to_string()));
    }
    if sftp.username.trim().is_empty() {
        return Err(ConfigError::Validation(
            "sftp.username is required".to_string(),
        ));
    }
    let has_password = sftp.password.as_deref().is_some_and(|p| !p.is_empty());
    let has_key = sftp
        .private_key_path
        .as_deref()
        .is_some_and(|p| !p.trim().is_empty());
    if !has_password && !has_key {
        return Err(ConfigError::Validation(
            "at least one authentication method must be configured (password or private key)"
                .to_string(),
        ));
    }
    Ok(())
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 4] = [
            FieldMeta {
                name: "sftp",
                description: "SFTP server connection\nauthentication: private_key_path (optional passphrase) and/or password",
            },
            FieldMeta {
                name: "jobs",
                description: "Download jobs, run in order. Example:\n  - name: invoices\n    remote_folders: [/outbound/invoices]\n    local_target_folder: /data/invoices\n    search_pattern: \"*.xml\"\n    delete_remote_after_success: false\n    archive_folder: /data/archive",
            },
            FieldMeta {
                name: "logging",
                description: "Log folder (default: logs next to config) and retention in days (1-3650)",
            },
            FieldMeta {
                name: "archive_workspace",
                description: "Scratch folder for building archives (default: system temp dir)",
            },
        ];
        &FIELDS
    }
}

pub fn default_archive_workspace() -> PathBuf {
    std::env::temp_dir()
        .join("sftp-downloader")
        .join("archive-temp")
}

fn default_port() -> u16 {
    22
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_search_pattern() -> String {
    DEFAULT_SEARCH_PATTERN.to_string()
}

fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}
