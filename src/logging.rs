use std::path::Path;

use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{InitError, RollingFileAppender, Rotation},
};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LEVEL: &str = "info";

/// Sends logs to a daily file under `dir`; the terminal belongs to the UI
/// and stdout to exported figures. `RUST_LOG` overrides the level.
///
/// Keep the returned guard alive until exit so buffered lines get flushed.
pub fn init(dir: &Path) -> Result<WorkerGuard, InitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("casemap")
        .filename_suffix("log")
        .build(dir)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(writer);

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = Registry::default().with(env_filter).with(file_layer).try_init();
    Ok(guard)
}
