//! On-disk layout under the agent's base directory.

use crate::CoreResult;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Producer socket filename.
const SOCKET_NAME: &str = "data-nadhi-agent.sock";
/// Accepting-flag marker filename.
const ACCEPTING_FLAG_NAME: &str = "agent-status.lock";
/// Queue storage directory name.
const QUEUE_DIR_NAME: &str = "queue";
/// Queue database filename inside the queue directory.
const QUEUE_DB_NAME: &str = "records.sqlite";
const SUCCESS_LOG_NAME: &str = "agent-success.log";
const FAILURE_LOG_NAME: &str = "agent-failure.log";

/// Resolves every path the agent reads or writes.
#[derive(Debug, Clone)]
pub struct AgentPaths {
    base_dir: PathBuf,
}

impl AgentPaths {
    /// Create a layout rooted at `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Get the producer socket path (`<base>/data-nadhi-agent.sock`).
    pub fn socket_file(&self) -> PathBuf {
        self.base_dir.join(SOCKET_NAME)
    }

    /// Get the accepting-flag marker path (`<base>/agent-status.lock`).
    pub fn accepting_flag_file(&self) -> PathBuf {
        self.base_dir.join(ACCEPTING_FLAG_NAME)
    }

    /// Get the queue storage directory (`<base>/queue`).
    pub fn queue_dir(&self) -> PathBuf {
        self.base_dir.join(QUEUE_DIR_NAME)
    }

    /// Get the queue database file (`<base>/queue/records.sqlite`).
    pub fn queue_db_file(&self) -> PathBuf {
        self.queue_dir().join(QUEUE_DB_NAME)
    }

    /// Get the session directory for a run started at `started_at`.
    pub fn session_dir(&self, started_at: DateTime<Utc>) -> PathBuf {
        self.base_dir.join(format!(
            "session-{}",
            started_at.format("%Y-%m-%dT%H-%M-%SZ")
        ))
    }

    pub fn success_log_file(session_dir: &Path) -> PathBuf {
        session_dir.join(SUCCESS_LOG_NAME)
    }

    pub fn failure_log_file(session_dir: &Path) -> PathBuf {
        session_dir.join(FAILURE_LOG_NAME)
    }

    /// Ensure the base and queue directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.queue_dir())?;
        Ok(())
    }
}
