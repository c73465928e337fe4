//! Core types, on-disk layout, and configuration for the echopost agent.

mod config;
mod error;
mod paths;
mod record;

pub use config::{
    AgentConfig, DEFAULT_BASE_DIR, DEFAULT_FLUSH_INTERVAL, DEFAULT_HEALTHY_CADENCE,
    DEFAULT_LOG_LEVEL, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SERVER, DEFAULT_SETTLE_DELAY,
    DEFAULT_SNAPSHOT_PAGE_SIZE, DEFAULT_UNHEALTHY_CADENCE,
};
pub use error::{CoreError, CoreResult};
pub use paths::AgentPaths;
pub use record::{parse_payload, LogRecord, Payload};
