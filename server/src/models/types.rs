//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Common types for chat completion providers
//!
//! # Examples
//!
//! ```rust
//! use npcmind_server::models::{LLMMessage, LLMRequest};
//!
//! let request = LLMRequest::new("llama3.1")
//!     .with_message(LLMMessage::system("You are Tom, a raccoon smuggler."))
//!     .with_message(LLMMessage::user("Hello there."))
//!     .with_sampling(Some(0.7), None);
//! assert_eq!(request.messages.len(), 2);
//! ```

use super::tools::{ToolDefinition, ToolInvocation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMRole {
    /// Instructions for the model
    System,
    /// Player input
    User,
    /// Previous model replies
    Assistant,
}

impl fmt::Display for LLMRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LLMRole::System => write!(f, "system"),
            LLMRole::User => write!(f, "user"),
            LLMRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LLMMessage {
    pub role: LLMRole,
    pub content: String,
}

impl LLMMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: LLMRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: LLMRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: LLMRole::Assistant,
            content: content.into(),
        }
    }
}

/// Request for a chat completion
///
/// When `tools` is non-empty the provider offers them to the model and any
/// invocations come back in [`LLMResponse::tool_calls`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMRequest {
    /// Conversation in the order it is shown to the model
    pub messages: Vec<LLMMessage>,

    /// Model identifier, interpreted by the provider
    pub model: String,

    /// Sampling temperature (0.0 - 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Tools the model may invoke
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

impl LLMRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
            tools: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: LLMMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_messages(mut self, messages: Vec<LLMMessage>) -> Self {
        self.messages.extend(messages);
        self
    }

    /// Sampling temperature and reply length cap. `None` leaves the
    /// provider's default in place.
    pub fn with_sampling(mut self, temperature: Option<f32>, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Offer a set of tools to the model
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools.extend(tools);
        self
    }
}

/// Response from a chat completion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LLMResponse {
    /// Generated text, empty when the model only called tools
    pub content: String,

    /// Model that produced the response
    pub model: String,

    /// Tool invocations in the order the model emitted them
    #[serde(default)]
    pub tool_calls: Vec<ToolInvocation>,

    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,

    /// Common values: "stop", "length", "tool_calls"
    pub finish_reason: Option<String>,
}

impl LLMResponse {
    /// Create a text-only response without usage statistics
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    /// Attach tool invocations to the response
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolInvocation>) -> Self {
        self.tool_calls = tool_calls;
        self
    }
}

/// Errors that can occur talking to a language model provider
#[derive(Debug, Clone, Error)]
pub enum LLMError {
    /// The provider could not be reached
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The provider answered with an error or an unparseable body
    #[error("API error: {0}")]
    ApiError(String),

    /// Missing or rejected credentials
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// The provider configuration is invalid
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The named provider is not registered or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The request took too long
    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Error: {0}")]
    Other(String),
}

impl LLMError {
    /// Whether repeating the same request could succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LLMError::NetworkError(_)
                | LLMError::ApiError(_)
                | LLMError::ProviderUnavailable(_)
                | LLMError::Timeout(_)
        )
    }
}

/// Configuration for a chat completion provider
///
/// Supported provider types are `openai`, `ollama` and `lmstudio`. LM Studio
/// speaks the OpenAI protocol without requiring a key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Provider type identifier
    pub provider: String,

    /// Full URL of the chat endpoint
    pub endpoint: String,

    /// API key, required by OpenAI only
    pub api_key: Option<String>,

    /// Model used when a request does not name one
    pub default_model: String,

    /// HTTP request timeout in seconds
    pub timeout_seconds: u64,

    /// Retry budget for transient failures
    pub max_retries: u32,
}

impl LLMConfig {
    /// Configuration for the OpenAI cloud API
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: "openai".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: Some(api_key.into()),
            default_model: model.into(),
            timeout_seconds: 30,
            max_retries: 1,
        }
    }

    /// Configuration for a local Ollama server, usually `http://localhost:11434/api/chat`
    pub fn ollama(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: "ollama".to_string(),
            endpoint: endpoint.into(),
            api_key: None,
            default_model: model.into(),
            timeout_seconds: 120,
            max_retries: 1,
        }
    }

    /// Configuration for LM Studio, usually `http://localhost:1234/v1/chat/completions`
    pub fn lmstudio(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: "lmstudio".to_string(),
            endpoint: endpoint.into(),
            api_key: None,
            default_model: model.into(),
            timeout_seconds: 120,
            max_retries: 1,
        }
    }
}
