//! Agent startup, run and shutdown.

use anyhow::Context;
use echopost_core::AgentConfig;
use echopost_delivery::HttpRemote;
use echopost_ipc::IngestServer;
use echopost_lifecycle::{BackgroundFlusher, Controller, RuntimeContext};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// Run the agent until the queue drains against a healthy remote or a
/// shutdown signal arrives.
pub async fn run_agent(config: AgentConfig) -> anyhow::Result<()> {
    let remote = match HttpRemote::from_config(&config) {
        Ok(remote) => Arc::new(remote),
        Err(e) => {
            error!(error = %e, "remote_setup_error");
            return Err(e).context("failed to build the remote client");
        }
    };

    let ctx = match RuntimeContext::open(config, remote).await {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(error = %e, "file_setup_error");
            return Err(e).context("failed to set up agent files");
        }
    };

    let socket_path = ctx.paths().socket_file();
    info!(
        socket = %socket_path.display(),
        server = %ctx.config().server,
        "agent_started"
    );

    let server = match IngestServer::bind(&socket_path) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "ipc_start_error");
            if let Err(e) = ctx.shutdown().await {
                warn!(error = %e, "agent_shutdown_error");
            }
            return Err(e).context("failed to start the ingestion socket");
        }
    };

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let tasks = TaskTracker::new();
    {
        let writer = ctx.writer();
        let cancel = cancel.clone();
        tasks.spawn(async move {
            if let Err(e) = server.serve(writer, cancel).await {
                error!(error = %e, "ipc_server_error");
            }
        });
    }
    tasks.spawn(
        BackgroundFlusher::new(ctx.queue().clone(), ctx.config().flush_interval)
            .run(cancel.clone()),
    );
    tasks.close();

    let mut controller = Controller::new(ctx);
    let outcome = controller.run(&cancel).await;

    cancel.cancel();
    tasks.wait().await;
    let shutdown = controller.into_context().shutdown().await;

    match &outcome {
        Ok(reason) => info!(reason = ?reason, "agent_exiting"),
        Err(e) => error!(error = %e, "controller_error"),
    }
    outcome.context("control loop failed")?;
    shutdown.context("shutdown did not complete cleanly")?;
    Ok(())
}

/// Cancel `cancel` on SIGINT or SIGTERM.
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!(error = %e, "sigterm_handler_error");
                None
            }
        };
        let terminated = async {
            match terminate.as_mut() {
                Some(stream) => {
                    stream.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!(signal = "SIGINT", "shutdown_signal_received"),
            _ = terminated => info!(signal = "SIGTERM", "shutdown_signal_received"),
            _ = cancel.cancelled() => return,
        }
        cancel.cancel();
    });
}
