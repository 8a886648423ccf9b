// Log subscriber setup

use crate::config::LogFormat;
use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "queuebench=info";

/// Where log lines go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget<'a> {
    Stdout,
    File { dir: &'a Path, file_name: &'a str },
}

impl<'a> LogTarget<'a> {
    /// `-` selects stdout; anything else is a file path
    pub fn parse(logfile: &'a str) -> Result<Self> {
        if logfile == "-" {
            return Ok(LogTarget::Stdout);
        }
        let path = Path::new(logfile);
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("log file path {:?} has no file name", logfile))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        Ok(LogTarget::File { dir, file_name })
    }
}

/// Install the global subscriber
///
/// The returned guard flushes the non-blocking writer on drop and must be
/// held until the process exits.
pub fn init(logfile: &str, format: LogFormat) -> Result<WorkerGuard> {
    let target = LogTarget::parse(logfile)?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Failed to create env filter")?;

    let ansi = target == LogTarget::Stdout;
    let (writer, guard) = match target {
        LogTarget::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogTarget::File { dir, file_name } => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name))
        }
    };

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(writer))
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_ansi(ansi).with_writer(writer))
            .try_init(),
    }
    .context("Failed to install log subscriber")?;

    Ok(guard)
}
