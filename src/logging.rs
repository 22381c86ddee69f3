use std::fs::File;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LevelFilter {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LevelFilter {
    fn into_tracing(self) -> tracing::level_filters::LevelFilter {
        match self {
            Self::Off => tracing::level_filters::LevelFilter::OFF,
            Self::Error => tracing::level_filters::LevelFilter::ERROR,
            Self::Warn => tracing::level_filters::LevelFilter::WARN,
            Self::Info => tracing::level_filters::LevelFilter::INFO,
            Self::Debug => tracing::level_filters::LevelFilter::DEBUG,
            Self::Trace => tracing::level_filters::LevelFilter::TRACE,
        }
    }
}

/// Keeps the file writer flushing until dropped.
pub struct FileLoggerGuard {
    _append_guard: WorkerGuard,
}

/// Configures tracing: stderr always, plus `log_path` when given.
///
/// An explicit `level` wins over `RUST_LOG`; with neither, only warnings
/// and errors are shown.
pub fn setup_logging(
    log_path: Option<&Path>,
    level: Option<LevelFilter>,
) -> anyhow::Result<Option<FileLoggerGuard>> {
    let filter = || match level {
        Some(level) => EnvFilter::builder()
            .with_default_directive(level.into_tracing().into())
            .parse_lossy(""),
        None => EnvFilter::builder()
            .with_default_directive(tracing::level_filters::LevelFilter::WARN.into())
            .from_env_lossy(),
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .without_time()
        .with_writer(std::io::stderr)
        .with_filter(filter());

    let Some(log_path) = log_path else {
        tracing_subscriber::registry().with(stderr_layer).init();
        return Ok(None);
    };

    let log_file = File::create(log_path)?;
    let (file_appender, guard) = tracing_appender::non_blocking(log_file);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(file_appender)
        .with_filter(filter());

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    tracing::info!("Writing log to {:?}", log_path);
    Ok(Some(FileLoggerGuard {
        _append_guard: guard,
    }))
}
