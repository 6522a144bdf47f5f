use std::path::PathBuf;

use clap::ValueEnum;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use crate::Error;

/// Events on this target carry the rendered report and only go to the log file
pub(crate) const REPORT_TARGET: &str = "modscan::report";

const LOG_FILE_PREFIX: &str = "modscan.log";

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogRotation {
    Minutely,
    Hourly,
    Daily,
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(value: LogRotation) -> Self {
        match value {
            LogRotation::Minutely => Rotation::MINUTELY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct LogOptions {
    pub(crate) level: LevelFilter,
    pub(crate) dir: Option<PathBuf>,
    pub(crate) rotation: LogRotation,
}

fn console_filter(level: LevelFilter) -> Targets {
    Targets::new()
        .with_default(level)
        .with_target(REPORT_TARGET, LevelFilter::OFF)
}

fn file_filter(level: LevelFilter) -> Targets {
    Targets::new()
        .with_default(level)
        .with_target(REPORT_TARGET, LevelFilter::INFO)
}

/// Diagnostics go to stderr so stdout only carries the report.
///
/// The returned guard flushes the file writer when dropped and must outlive the scan.
pub(crate) fn init(options: &LogOptions) -> Result<Option<WorkerGuard>, Error> {
    let console = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter(options.level));

    let (file, guard) = match &options.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .map_err(|err| Error::Logging(format!("{}: {err}", dir.display())))?;
            let appender = RollingFileAppender::builder()
                .rotation(options.rotation.into())
                .filename_prefix(LOG_FILE_PREFIX)
                .build(dir)
                .map_err(|err| Error::Logging(err.to_string()))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(file_filter(options.level));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .map_err(|err| Error::Logging(err.to_string()))?;

    Ok(guard)
}
