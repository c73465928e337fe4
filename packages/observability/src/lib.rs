//! # Observability
//!
//! Structured logging for the echopost agent.
//!
//! Components are log producers only. They use standard `tracing` macros
//! with structured fields, and the event name goes in the message, which
//! becomes the line's `event` key:
//!
//! ```rust,ignore
//! tracing::info!(key = %key, "log_stored");
//! ```
//!
//! The binary calls [`init_with_config`] once at startup. Every event then
//! becomes exactly one JSON object on one line, written to stdout or to a
//! file, so an operator can follow the agent with `jq` or ship the stream
//! to any line-oriented collector.
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "echopost".into(),
//!     default_level: "debug".into(),
//!     ..Default::default()
//! })?;
//! ```

mod json_layer;
mod sink;

pub use json_layer::{EventLine, JsonLayer};
pub use sink::{LineSink, SinkFactory};

use std::io;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every log line.
    pub service_name: String,

    /// Default level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by the `RUST_LOG` environment variable.
    pub default_level: String,

    /// Write JSON lines to this file instead of stdout.
    pub log_path: Option<PathBuf>,

    /// Also emit compact human-readable logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Install the global subscriber with default settings for `service_name`.
pub fn init(service_name: &str) -> io::Result<()> {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    })
}

/// Install the global subscriber.
///
/// Fails if the log file cannot be opened or a global subscriber is
/// already installed.
pub fn init_with_config(config: LogConfig) -> io::Result<()> {
    let sink = match &config.log_path {
        Some(path) => LineSink::file(path)?,
        None => LineSink::stdout(),
    };

    let json_layer = JsonLayer::new(config.service_name.clone(), SinkFactory::new(sink));

    let stderr_layer = config.also_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .compact()
            .with_writer(io::stderr)
            .with_filter(env_filter(&config.default_level))
    });

    tracing_subscriber::registry()
        .with(json_layer.with_filter(env_filter(&config.default_level)))
        .with(stderr_layer)
        .try_init()
        .map_err(io::Error::other)?;

    tracing::debug!(
        service = %config.service_name,
        log_path = ?config.log_path,
        "observability_initialized"
    );
    Ok(())
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
