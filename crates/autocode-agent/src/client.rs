//! Gateway to the generative service
//!
//! Each call is exactly one logical request. Retrying is the caller's
//! decision: wrap the call in a [`crate::RetryPolicy`], not the gateway.

use crate::auth;
use crate::transport::{ChatTransport, HttpTransport};
use crate::types::{CallOptions, ChatMessage, ChatRequest, ChatResponse};
use crate::usage::UsageLedger;
use async_trait::async_trait;
use autocode_core::config::GatewayConfig;
use autocode_core::{AutocodeError, Result};
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Maximum characters of an error body kept in a service error
const ERROR_BODY_CHARS: usize = 500;

/// Anything that can turn a prompt into generated text (allows stubbing stages)
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str, options: &CallOptions) -> Result<String>;
}

/// Chat-completions gateway
pub struct Gateway {
    endpoint: String,
    credential: Option<String>,
    credential_source: String,
    system_prompt: String,
    max_tokens: u32,
    cost_per_1k_tokens: f64,
    transport: Arc<dyn ChatTransport>,
    ledger: Arc<UsageLedger>,
}

impl Gateway {
    /// Create a gateway over an explicit transport
    pub fn new(
        config: &GatewayConfig,
        credential: Option<String>,
        transport: Arc<dyn ChatTransport>,
        ledger: Arc<UsageLedger>,
    ) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            credential,
            credential_source: config.api_key_env.clone(),
            system_prompt: config.system_prompt.clone(),
            max_tokens: config.max_tokens,
            cost_per_1k_tokens: config.cost_per_1k_tokens,
            transport,
            ledger,
        }
    }

    /// Create an HTTP gateway, reading the credential from the environment
    pub fn from_config(config: &GatewayConfig, ledger: Arc<UsageLedger>) -> Result<Self> {
        let transport = HttpTransport::new(config.timeout())?;
        let credential = auth::credential_from_env(&config.api_key_env);
        Ok(Self::new(config, credential, Arc::new(transport), ledger))
    }

    pub fn ledger(&self) -> &Arc<UsageLedger> {
        &self.ledger
    }

    /// Issue one request and return the generated text
    #[instrument(skip(self, prompt, options), fields(model = %options.model, prompt_chars = prompt.len()))]
    pub async fn call(&self, prompt: &str, options: &CallOptions) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(AutocodeError::InvalidInput(
                "Prompt cannot be empty".to_string(),
            ));
        }

        let credential = self.credential.as_deref().ok_or_else(|| {
            AutocodeError::Configuration(format!(
                "{} is not set. Export it or change gateway.api_key_env in .autocode/config.toml",
                self.credential_source
            ))
        })?;

        let request = ChatRequest {
            model: options.model.clone(),
            messages: vec![
                ChatMessage {
                    role: options.role.clone(),
                    content: self.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: options.temperature,
            max_tokens: self.max_tokens,
        };

        debug!("Sending chat request to {}", self.endpoint);
        let reply = self
            .transport
            .send(&self.endpoint, credential, &request)
            .await?;

        if !reply.is_success() {
            error!("HTTP error {}: {}", reply.status, reply.body);
            return Err(AutocodeError::Service {
                status: reply.status,
                body: truncate(&reply.body, ERROR_BODY_CHARS),
            });
        }

        let response: ChatResponse = serde_json::from_str(&reply.body).map_err(|e| {
            AutocodeError::MalformedResponse(format!("Response body is not valid JSON: {}", e))
        })?;

        let first = response.choices.first().ok_or_else(|| {
            AutocodeError::MalformedResponse("Service did not return any choices".to_string())
        })?;

        let content = first
            .message
            .as_ref()
            .and_then(|m| m.content.clone())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                AutocodeError::MalformedResponse("No content in first choice".to_string())
            })?;

        let tokens = response.usage.map(|u| u.total_tokens).unwrap_or(0);
        self.ledger
            .record(&options.model, tokens, self.cost_per_1k_tokens);

        debug!("Received {} chars, {} tokens", content.len(), tokens);
        Ok(content)
    }
}

#[async_trait]
impl Completion for Gateway {
    async fn complete(&self, prompt: &str, options: &CallOptions) -> Result<String> {
        self.call(prompt, options).await
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
