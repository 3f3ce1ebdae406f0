//! HTTP transport for chat-completion requests
//!
//! The transport only moves bytes: it reports connection-level failures and
//! hands back the status and raw body. Interpreting the body is the gateway's
//! job.

use crate::types::ChatRequest;
use async_trait::async_trait;
use autocode_core::{AutocodeError, Result};
use std::time::Duration;

/// Raw HTTP reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request to the generative service (allows mocking in tests)
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, endpoint: &str, credential: &str, request: &ChatRequest)
        -> Result<HttpReply>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AutocodeError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(
        &self,
        endpoint: &str,
        credential: &str,
        request: &ChatRequest,
    ) -> Result<HttpReply> {
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(credential)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| AutocodeError::Transport(format!("Failed to send request: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AutocodeError::Transport(format!("Failed to read response body: {}", e)))?;

        Ok(HttpReply { status, body })
    }
}
