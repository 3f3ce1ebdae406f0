//! Wire types for the chat-completions contract

use autocode_core::config::GatewayConfig;
use serde::{Deserialize, Serialize};

/// Per-call options for a gateway request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallOptions {
    pub temperature: f32,
    pub model: String,
    /// Role of the instruction message sent ahead of the prompt
    pub role: String,
}

impl CallOptions {
    /// Options taken from the gateway section of the config
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            temperature: config.temperature,
            model: config.model.clone(),
            role: "system".to_string(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }
}

impl Default for CallOptions {
    fn default() -> Self {
        Self::from_config(&GatewayConfig::default())
    }
}

/// Chat message format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Chat completion request body
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Chat completion response body
///
/// Every field is optional on the wire so that a structurally broken body
/// parses and can be reported as malformed rather than as a JSON error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

/// One choice in a chat response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub message: Option<ChatChoiceMessage>,
}

/// Message inside a choice
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Token usage reported by the service
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatUsage {
    #[serde(default)]
    pub total_tokens: u64,
}
