//! HTTP collaborator for the remote ingestion server.

use crate::{DeliveryError, DeliveryResult};
use async_trait::async_trait;
use echopost_core::{AgentConfig, LogRecord};
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Header carrying the agent's credential.
pub const API_KEY_HEADER: &str = "DATANADHI-API-KEY";

/// Status and body of one delivery call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResponse {
    pub status: u16,
    pub body: String,
}

/// The remote server as seen by the replay engine and the controller.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// True only if the remote answered the health check with 200.
    async fn is_healthy(&self) -> bool;

    /// Send one record. Any HTTP response, whatever its status, is `Ok`;
    /// only transport-level failures are errors.
    async fn deliver(&self, record: &LogRecord) -> DeliveryResult<DeliveryResponse>;
}

/// [`RemoteClient`] over reqwest.
pub struct HttpRemote {
    client: Client,
    server: String,
    api_key: String,
}

impl HttpRemote {
    /// Create a client for `server`; every call is bounded by `timeout`.
    ///
    /// Redirects are never followed: a 3xx is the remote's answer and is
    /// classified as such.
    pub fn new(server: &str, api_key: &str, timeout: Duration) -> DeliveryResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| DeliveryError::Client(e.to_string()))?;

        Ok(Self {
            client,
            server: server.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(config: &AgentConfig) -> DeliveryResult<Self> {
        Self::new(&config.server, &config.api_key, config.request_timeout)
    }

    fn log_url(&self) -> String {
        format!("{}/log", self.server)
    }
}

#[async_trait]
impl RemoteClient for HttpRemote {
    async fn is_healthy(&self) -> bool {
        match self.client.get(&self.server).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                debug!(status, "health_check");
                status == 200
            }
            Err(e) => {
                warn!(error = %e, "health_check_error");
                false
            }
        }
    }

    async fn deliver(&self, record: &LogRecord) -> DeliveryResult<DeliveryResponse> {
        let response = self
            .client
            .post(self.log_url())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&record.delivery_body())
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "trigger_post_error");
                DeliveryError::from(e)
            })?;

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(status, error = %e, "trigger_body_read_error");
                String::new()
            }
        };
        Ok(DeliveryResponse { status, body })
    }
}
