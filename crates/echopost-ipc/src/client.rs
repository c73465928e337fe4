//! Client side of the ingestion socket.

use crate::protocol::{LogSendResult, Method, Request, Response};
use crate::{IpcError, IpcResult};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// Client for the agent's ingestion socket. Each call uses its own connection.
pub struct IngestClient {
    socket_path: PathBuf,
}

impl IngestClient {
    pub fn new(socket_path: &Path) -> Self {
        Self {
            socket_path: socket_path.to_path_buf(),
        }
    }

    /// Send a request and wait for response.
    pub async fn call(&self, request: Request) -> IpcResult<Response> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| IpcError::Socket(format!("Failed to connect: {}", e)))?;

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let request_json = request.to_json()?;
        writer.write_all(request_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        let mut line = String::new();
        reader.read_line(&mut line).await?;
        if line.is_empty() {
            return Err(IpcError::ConnectionClosed);
        }

        Ok(Response::from_json(line.trim())?)
    }

    /// Submit one record.
    pub async fn send_log(&self, json_data: &str, pipelines: &[String]) -> IpcResult<LogSendResult> {
        let response = self.call(Request::log_send(json_data, pipelines)).await?;
        if let Some(error) = response.error {
            return Err(IpcError::Protocol {
                code: error.code,
                message: error.message,
            });
        }
        let result = response.result.unwrap_or(serde_json::Value::Null);
        Ok(serde_json::from_value(result)?)
    }

    /// Check whether an agent is listening on the socket.
    pub async fn is_agent_running(&self) -> bool {
        matches!(
            self.call(Request::new(Method::Health)).await,
            Ok(response) if response.is_success()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_not_running() {
        let client = IngestClient::new(Path::new("/tmp/echopost-nonexistent-12345.sock"));
        assert!(!client.is_agent_running().await);
    }

    #[tokio::test]
    async fn test_send_log_connect_failure() {
        let client = IngestClient::new(Path::new("/tmp/echopost-nonexistent-12345.sock"));
        let err = client.send_log("{}", &[]).await.unwrap_err();
        assert!(matches!(err, IpcError::Socket(_)));
    }
}
