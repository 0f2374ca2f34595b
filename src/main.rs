//! SFTP batch downloader.
//!
//! One invocation runs the configured jobs once: every job lists its remote
//! folders, downloads matching files into its local folder, and optionally
//! archives that folder afterwards.
//!
//! Code layout:
//! - `base_system`: config, logging, cancellation, local file helpers
//! - `remote`: the remote filesystem trait and its SFTP implementation
//! - `download`: the job pipeline and the end-of-run report

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

mod base_system;
mod download;
mod remote;

use base_system::cancel::CancelToken;
use base_system::config::{Loaded, load_or_create};
use base_system::context::Config;
use base_system::logging::{LogOptions, LogSystem};
use download::archive::Archiver;
use download::orchestrator::{JobFilter, Orchestrator, RunStatus};
use download::progress::ConsoleSink;
use remote::sftp::SftpConnector;

#[derive(Debug, Parser)]
#[command(name = "sftp-downloader", version)]
#[command(about = "Download files from SFTP folders into local folders, job by job")]
struct Cli {
    /// Path to the config file (default: config.yml in the data directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding config.yml and logs
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Run only this job (repeatable, case-insensitive)
    #[arg(short = 'j', long = "job", value_name = "NAME")]
    job: Vec<String>,

    /// Comma-separated list of jobs to run
    #[arg(long, value_delimiter = ',', value_name = "NAMES")]
    jobs: Vec<String>,

    /// Log DEBUG to the console as well
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Disable ANSI colors on the console
    #[arg(long, default_value_t = false)]
    no_color: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(status) => ExitCode::from(status.exit_code()),
        Err(err) => {
            // logging is not up yet
            eprintln!("error: {err:#}");
            ExitCode::from(RunStatus::Fatal.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<RunStatus> {
    let data_dir = cli.data_dir.as_deref();
    let loaded = load_config(&cli)?;
    let log = init_logging(&cli, &loaded.config, data_dir)?;
    info!(
        "sftp-downloader v{} (config {}, logs {})",
        env!("CARGO_PKG_VERSION"),
        loaded.path.display(),
        log.log_dir().display()
    );
    if loaded.created {
        warn!(
            "created a default config at {}; edit it and run again",
            loaded.path.display()
        );
    }

    let status = match execute(&cli, &loaded.config) {
        Ok(status) => status,
        Err(err) => {
            error!("{err:#}");
            RunStatus::Fatal
        }
    };
    log.flush();
    Ok(status)
}

fn load_config(cli: &Cli) -> Result<Loaded<Config>> {
    load_or_create::<Config>(cli.config.as_deref(), cli.data_dir.as_deref())
        .context("unable to load configuration")
}

fn execute(cli: &Cli, config: &Config) -> Result<RunStatus> {
    config.validate().context("configuration check failed")?;

    let cancel = CancelToken::new();
    if let Err(err) = cancel.install_ctrlc() {
        warn!("unable to install Ctrl+C handler: {err}");
    }

    let filter = JobFilter::from_names(cli.job.iter().chain(cli.jobs.iter()));
    let archiver = Archiver::new(config.archive_workspace_dir());
    let connector = SftpConnector::new(config.sftp.clone());

    let summary = Orchestrator::new(&connector, &archiver, &cancel)
        .run(&config.jobs, &filter, &mut ConsoleSink)?;
    match summary.status {
        RunStatus::Cancelled => warn!(
            "run cancelled after {} job(s); partial results reported above",
            summary.jobs.len()
        ),
        _ => info!("run finished: {} job(s)", summary.jobs.len()),
    }
    Ok(summary.status)
}

fn init_logging(cli: &Cli, config: &Config, data_dir: Option<&Path>) -> Result<LogSystem> {
    let opts = LogOptions {
        debug: cli.debug,
        use_color: !cli.no_color,
        log_dir: config.logging.resolve_folder(data_dir),
        retention_days: config.logging.retention_days,
    };
    LogSystem::init(opts).context("unable to start logging")
}
