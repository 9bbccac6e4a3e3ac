use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Maximum size per log file before rotation (~5 MB)
const MAX_LOG_FILE_SIZE: u64 = 5 * 1024 * 1024;
/// Number of rotated log files to keep
const MAX_LOG_FILES: usize = 5;
const LOG_STEM: &str = "watchdeck";

/// Append-only log file that rotates by size:
/// watchdeck.log → watchdeck.1.log → watchdeck.2.log → …
pub struct RotatingLog {
    dir: PathBuf,
    max_file_size: u64,
    max_files: usize,
    lock: Mutex<()>,
}

impl RotatingLog {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        Self::with_limits(dir, MAX_LOG_FILE_SIZE, MAX_LOG_FILES)
    }

    pub fn with_limits(dir: impl Into<PathBuf>, max_file_size: u64, max_files: usize) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            max_file_size,
            max_files,
            lock: Mutex::new(()),
        })
    }

    /// The current (active) log file path.
    pub fn current_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", LOG_STEM))
    }

    fn rotated_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}.{}.log", LOG_STEM, index))
    }

    fn rotate_if_needed(&self) {
        let current = self.current_path();
        let file_size = fs::metadata(&current).map(|m| m.len()).unwrap_or(0);
        if file_size < self.max_file_size {
            return;
        }

        // Shift existing rotated files; the oldest is overwritten
        for i in (1..self.max_files).rev() {
            let _ = fs::rename(self.rotated_path(i), self.rotated_path(i + 1));
        }
        let _ = fs::rename(&current, self.rotated_path(1));
    }

    fn append(&self, buf: &[u8]) -> io::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.rotate_if_needed();
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.current_path())?
            .write_all(buf)
    }
}

pub struct RotatingLogWriter<'a> {
    log: &'a RotatingLog,
}

impl Write for RotatingLogWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.log.append(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for RotatingLog {
    type Writer = RotatingLogWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingLogWriter { log: self }
    }
}

/// Installs the global subscriber: everything at the chosen level goes to the
/// rotating file, warnings and errors also go to stderr.
///
/// `LOG_LEVEL` overrides the file level with a full filter directive.
pub fn init_logging(log_dir: &Path, debug: bool) -> Result<PathBuf> {
    let log = RotatingLog::new(log_dir)
        .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;
    let log_path = log.current_path();

    let default_level = if debug { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let file_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .with_env_var("LOG_LEVEL")
        .from_env_lossy();
    let stderr_level = if debug { LevelFilter::DEBUG } else { LevelFilter::WARN };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(log)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_filter(stderr_level),
        )
        .try_init()
        .context("Failed to install log subscriber")?;

    info!(
        "=== WatchDeck session started at {} ===",
        Local::now().format("%Y-%m-%d %H:%M:%S %Z")
    );
    Ok(log_path)
}
