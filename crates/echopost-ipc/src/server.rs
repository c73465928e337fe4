//! Ingestion server on a Unix domain socket.
//!
//! Each connection may carry any number of requests, one per line. The
//! server only ever holds a [`QueueWriter`], so producers can add records
//! but cannot read, delete, or touch lifecycle state.

use crate::protocol::{error_codes, LogSendParams, LogSendResult, Method, Response};
use crate::IpcResult;
use echopost_core::LogRecord;
use echopost_queue::QueueWriter;
use serde_json::json;
use std::fs::Permissions;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Socket permissions; producers may run as any local user.
const SOCKET_MODE: u32 = 0o777;

/// Listening ingestion server.
pub struct IngestServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl IngestServer {
    /// Bind `socket_path`, replacing any stale socket file left there.
    ///
    /// Must be called inside a tokio runtime.
    pub fn bind(socket_path: &Path) -> IpcResult<Self> {
        match std::fs::remove_file(socket_path) {
            Ok(()) => debug!(path = %socket_path.display(), "stale_socket_removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(socket_path)?;
        std::fs::set_permissions(socket_path, Permissions::from_mode(SOCKET_MODE))?;
        info!(path = %socket_path.display(), "ipc_server_listening");

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections until `cancel` fires.
    ///
    /// After cancellation no new connection is accepted. Open connections
    /// finish the request they are handling and then close; this returns once
    /// all of them have, and removes the socket file.
    pub async fn serve(self, writer: QueueWriter, cancel: CancellationToken) -> IpcResult<()> {
        let connections = TaskTracker::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("ipc_server_stopping");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let writer = writer.clone();
                        let cancel = cancel.clone();
                        connections.spawn(async move {
                            if let Err(e) = handle_connection(stream, writer, cancel).await {
                                debug!(error = %e, "ipc_connection_error");
                            }
                        });
                    }
                    Err(e) => error!(error = %e, "ipc_accept_error"),
                },
            }
        }

        drop(self.listener);
        connections.close();
        connections.wait().await;

        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(error = %e, "socket_remove_error");
            }
        }
        info!("ipc_server_stopped");
        Ok(())
    }
}

/// Bytes requested from the socket per read.
const READ_CHUNK: usize = 8 * 1024;

/// Serve one producer connection.
///
/// Bytes are read with the cancel-safe `read` into a local buffer, and every
/// complete line in it is answered before cancellation is checked. A request
/// whose line was fully written before shutdown is therefore still stored; a
/// line cut off mid-write is dropped.
async fn handle_connection(
    stream: UnixStream,
    writer: QueueWriter,
    cancel: CancellationToken,
) -> IpcResult<()> {
    let (mut reader, mut out) = stream.into_split();
    let mut pending: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    debug!("ipc_client_connected");

    loop {
        while let Some(end) = pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = pending.drain(..=end).collect();
            respond(&line, &writer, &mut out).await?;
        }
        if cancel.is_cancelled() {
            if !pending.is_empty() {
                debug!(bytes = pending.len(), "ipc_partial_request_dropped");
            }
            break;
        }

        let read = tokio::select! {
            biased;
            read = reader.read(&mut chunk) => read?,
            _ = cancel.cancelled() => continue,
        };
        if read == 0 {
            // A last request without a trailing newline is still answered.
            if !pending.is_empty() {
                let line = std::mem::take(&mut pending);
                respond(&line, &writer, &mut out).await?;
            }
            break;
        }
        pending.extend_from_slice(&chunk[..read]);
    }

    debug!("ipc_client_disconnected");
    Ok(())
}

async fn respond(raw: &[u8], writer: &QueueWriter, out: &mut OwnedWriteHalf) -> IpcResult<()> {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(());
    }

    let response = handle_line(trimmed, writer).await;
    let response_json = response.to_json()?;
    out.write_all(response_json.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}

/// Answer one request line.
async fn handle_line(line: &str, writer: &QueueWriter) -> Response {
    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "ipc_parse_error");
            return Response::error("", error_codes::PARSE_ERROR, &format!("Parse error: {e}"));
        }
    };

    let id = value
        .get("id")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let Some(name) = value.get("method").and_then(|v| v.as_str()) else {
        return Response::error(&id, error_codes::INVALID_REQUEST, "method is required");
    };
    let Some(method) = Method::from_name(name) else {
        return Response::error(
            &id,
            error_codes::METHOD_NOT_FOUND,
            &format!("Method not found: {name}"),
        );
    };

    match method {
        Method::Health => Response::success(&id, json!({ "status": "ok" })),
        Method::LogSend => log_send(&id, value.get("params").cloned(), writer).await,
    }
}

async fn log_send(id: &str, params: Option<serde_json::Value>, writer: &QueueWriter) -> Response {
    let params: LogSendParams = match params.map(serde_json::from_value) {
        Some(Ok(params)) => params,
        Some(Err(e)) => {
            return Response::error(id, error_codes::INVALID_PARAMS, &format!("Invalid params: {e}"))
        }
        None => return Response::error(id, error_codes::INVALID_PARAMS, "params are required"),
    };

    let record = LogRecord::from_producer(&params.json_data, params.pipelines);
    let result = match writer.enqueue(&record).await {
        Ok(key) => {
            info!(key = %key, "log_stored");
            LogSendResult::stored()
        }
        Err(e) => {
            error!(error = %e, "queue_write_error");
            LogSendResult::write_failed()
        }
    };

    match serde_json::to_value(result) {
        Ok(value) => Response::success(id, value),
        Err(e) => Response::error(id, error_codes::INTERNAL_ERROR, &e.to_string()),
    }
}
