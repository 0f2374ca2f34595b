use std::fs;
use std::io;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use time::UtcOffset;
use time::macros::format_description;
use tracing::error;
use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_appender::rolling::{self, Rotation};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_FILE_PREFIX: &str = "sftp-downloader";
const LOG_FILE_SUFFIX: &str = "log";

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("logging already initialized")]
    AlreadyInitialized,
    #[error("subscriber init failed: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("log file appender init failed: {0}")]
    Appender(#[from] rolling::InitError),
}

#[derive(Clone, Debug)]
pub struct LogOptions {
    pub debug: bool,
    pub use_color: bool,
    pub log_dir: PathBuf,
    /// Number of daily log files kept on disk.
    pub retention_days: u32,
}

/// Owns the non-blocking file writer; dropping it flushes pending lines.
pub struct LogSystem {
    log_dir: PathBuf,
    guard: Mutex<Option<WorkerGuard>>,
}

impl LogSystem {
    /// Console at INFO (DEBUG with `debug`), daily-rolling file at DEBUG.
    pub fn init(options: LogOptions) -> Result<Self, LogError> {
        fs::create_dir_all(&options.log_dir).map_err(|source| LogError::Io {
            path: options.log_dir.clone(),
            source,
        })?;

        let file_appender = rolling::Builder::new()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .filename_suffix(LOG_FILE_SUFFIX)
            .max_log_files(options.retention_days.max(1) as usize)
            .build(&options.log_dir)?;
        let (file_writer, guard) = non_blocking::NonBlockingBuilder::default()
            .lossy(false)
            .finish(file_appender);

        // Must be resolved before any other thread exists, otherwise `time`
        // refuses to read the local offset.
        let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
        let timer = OffsetTime::new(
            offset,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        );

        let console_level = if options.debug {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };

        let console_layer = fmt::layer()
            .with_target(false)
            .with_level(true)
            .with_timer(timer.clone())
            .with_ansi(options.use_color)
            .with_writer(io::stdout)
            .with_filter(console_level);

        let file_layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_timer(timer)
            .with_ansi(false)
            .with_writer(file_writer)
            .with_filter(LevelFilter::DEBUG);

        tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("global subscriber") || msg.contains("already") {
                    LogError::AlreadyInitialized
                } else {
                    LogError::SubscriberInit(e)
                }
            })?;

        install_panic_hook();

        Ok(Self {
            log_dir: options.log_dir,
            guard: Mutex::new(Some(guard)),
        })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Flush and stop the file writer. Later events only reach the console.
    pub fn flush(&self) {
        if let Ok(mut guard) = self.guard.lock() {
            guard.take();
        }
    }
}

impl Drop for LogSystem {
    fn drop(&mut self) {
        self.flush();
    }
}

fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if let Some(location) = info.location() {
            error!("panic at {}:{}: {}", location.file(), location.line(), info);
        } else {
            error!("panic: {info}");
        }
        previous(info);
    }));
}
