//! Structured logging and tracing configuration

use anyhow::Result;
use std::io;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use super::{LogFormat, MonitoringConfig};

const LOG_FILE_PREFIX: &str = "lookout-server.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps the non-blocking file writer alive until dropped
pub struct TracingGuard {
    _file_guard: Option<non_blocking::WorkerGuard>,
}

/// Initialize structured logging. `RUST_LOG` takes precedence over the
/// configured level.
pub fn init_tracing(config: &MonitoringConfig) -> Result<TracingGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers: Vec<BoxedLayer> = vec![console_layer(config.log_format)];

    let file_guard = match &config.log_dir {
        Some(dir) => {
            let (writer, guard) = non_blocking(rolling::daily(dir, LOG_FILE_PREFIX));
            layers.push(
                fmt::layer()
                    .json()
                    .with_span_events(FmtSpan::CLOSE)
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(writer)
                    .boxed(),
            );
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry().with(layers).with(env_filter).try_init()?;

    tracing::info!(
        log_level = %config.log_level,
        log_format = %config.log_format,
        log_dir = ?config.log_dir,
        "Tracing initialized"
    );

    Ok(TracingGuard { _file_guard: file_guard })
}

fn console_layer(format: LogFormat) -> BoxedLayer {
    let layer = fmt::layer().with_target(true).with_writer(io::stdout);
    match format {
        LogFormat::Json => layer
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => layer.pretty().with_thread_names(true).boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}
