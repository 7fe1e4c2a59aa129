use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::LoggingConfig;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Logging handle for one run. Events are routed to the configured sinks
/// until it is dropped.
pub struct LoggingGuard {
    _guard: DefaultGuard,
}

/// Build the subscriber described by `config` and install it for the
/// current thread. `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers: Vec<BoxedLayer> = Vec::new();

    match config.format.as_str() {
        "json" => layers.push(
            fmt::layer()
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .boxed(),
        ),
        _ => layers.push(fmt::layer().with_target(false).boxed()),
    }

    if let Some(file_path) = &config.file_path {
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)
            .with_context(|| format!("opening log file {}", file_path.display()))?;

        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .boxed(),
        );
    }

    let guard = tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .set_default();

    tracing::info!("Logging initialized with level: {}", config.level);
    Ok(LoggingGuard { _guard: guard })
}
