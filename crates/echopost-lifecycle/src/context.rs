//! Everything one agent run owns, built at startup and torn down at exit.

use crate::{AcceptingFlag, LifecycleResult};
use chrono::Utc;
use echopost_core::{AgentConfig, AgentPaths};
use echopost_delivery::{OutcomeLogs, RemoteClient};
use echopost_queue::{DurableQueue, QueueWriter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Runtime state of one agent process.
///
/// Owned by the [`Controller`](crate::Controller). Concurrent tasks receive
/// narrowed handles: the ingestion server gets a [`QueueWriter`], the
/// flusher a queue clone. Neither ever sees the accepting flag.
pub struct RuntimeContext {
    config: AgentConfig,
    paths: AgentPaths,
    session_dir: PathBuf,
    queue: DurableQueue,
    logs: Arc<OutcomeLogs>,
    remote: Arc<dyn RemoteClient>,
    pub(crate) flag: AcceptingFlag,
}

impl RuntimeContext {
    /// Create directories, open the outcome logs and the queue.
    ///
    /// A marker left by a previous unclean exit is removed here; the first
    /// health check decides the real starting state.
    pub async fn open(config: AgentConfig, remote: Arc<dyn RemoteClient>) -> LifecycleResult<Self> {
        config.validate()?;
        let paths = config.paths();
        paths.ensure_dirs()?;

        let flag = AcceptingFlag::new(paths.accepting_flag_file());
        flag.clear_stale()?;

        let session_dir = paths.session_dir(Utc::now());
        let logs = Arc::new(OutcomeLogs::open(&session_dir)?);

        let queue = DurableQueue::open(&paths.queue_db_file())
            .await?
            .with_page_size(config.snapshot_page_size);

        info!(
            base_dir = %paths.base_dir().display(),
            session = %session_dir.display(),
            "runtime_context_opened"
        );

        Ok(Self {
            config,
            paths,
            session_dir,
            queue,
            logs,
            remote,
            flag,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn paths(&self) -> &AgentPaths {
        &self.paths
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    pub fn queue(&self) -> &DurableQueue {
        &self.queue
    }

    /// Enqueue-only handle for the ingestion server.
    pub fn writer(&self) -> QueueWriter {
        self.queue.writer()
    }

    pub fn logs(&self) -> &Arc<OutcomeLogs> {
        &self.logs
    }

    pub fn remote(&self) -> &Arc<dyn RemoteClient> {
        &self.remote
    }

    pub fn is_accepting(&self) -> bool {
        self.flag.is_held()
    }

    /// Release the flag, flush and close the logs and the queue, remove the
    /// socket, and remove the queue directory if nothing is left in it.
    ///
    /// Every step is attempted; the first failure is returned.
    pub async fn shutdown(mut self) -> LifecycleResult<()> {
        let mut first_error = None;

        if let Err(e) = self.flag.release() {
            warn!(error = %e, "accepting_flag_release_error");
            first_error.get_or_insert(e);
        }
        if let Err(e) = self.logs.flush() {
            warn!(error = %e, "outcome_log_flush_error");
            first_error.get_or_insert(e.into());
        }

        let empty = match self.queue.is_empty().await {
            Ok(empty) => empty,
            Err(e) => {
                warn!(error = %e, "queue_empty_check_error");
                first_error.get_or_insert(e.into());
                false
            }
        };
        if let Err(e) = self.queue.flush().await {
            warn!(error = %e, "queue_flush_error");
            first_error.get_or_insert(e.into());
        }
        if let Err(e) = self.queue.close().await {
            warn!(error = %e, "queue_close_error");
            first_error.get_or_insert(e.into());
        }

        remove_if_present(&self.paths.socket_file(), false);
        if empty {
            remove_if_present(&self.paths.queue_dir(), true);
        }

        info!(queue_removed = empty, "agent_shutdown_complete");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn remove_if_present(path: &Path, dir: bool) {
    let result = if dir {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    if let Err(e) = result {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "cleanup_remove_error");
        }
    }
}
