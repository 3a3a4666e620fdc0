use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::constants::{LOG_DIRECTORY, LOG_FILE_PREFIX};

/// Console output plus a daily rolling file under `logs/`.
///
/// The returned guard flushes the file writer on drop and must outlive every log call.
pub fn init_default_logger() -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(LOG_DIRECTORY, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(LevelFilter::INFO)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    guard
}
