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

use super::{request_error, status_error};
use crate::models::{
    LLMConfig, LLMError, LLMMessage, LLMRequest, LLMResponse, LlmProvider, ToolDefinition,
    ToolInvocation,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ollama chat provider, talks to `/api/chat`
pub struct OllamaProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: LLMConfig) -> Result<Self, LLMError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| LLMError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse, LLMError> {
        #[derive(Serialize)]
        struct OllamaRequest {
            model: String,
            messages: Vec<LLMMessage>,
            stream: bool,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            tools: Vec<ToolDefinition>,
            #[serde(skip_serializing_if = "Option::is_none")]
            options: Option<OllamaOptions>,
        }

        #[derive(Serialize)]
        struct OllamaOptions {
            #[serde(skip_serializing_if = "Option::is_none")]
            temperature: Option<f32>,
            #[serde(skip_serializing_if = "Option::is_none")]
            num_predict: Option<u32>,
        }

        #[derive(Deserialize)]
        struct OllamaResponse {
            message: OllamaMessage,
            model: String,
            #[serde(default)]
            done: bool,
            prompt_eval_count: Option<u32>,
            eval_count: Option<u32>,
        }

        #[derive(Deserialize)]
        struct OllamaMessage {
            #[serde(default)]
            content: String,
            #[serde(default)]
            tool_calls: Vec<OllamaToolCall>,
        }

        #[derive(Deserialize)]
        struct OllamaToolCall {
            function: OllamaFunctionCall,
        }

        #[derive(Deserialize)]
        struct OllamaFunctionCall {
            name: String,
            #[serde(default)]
            arguments: Value,
        }

        let options = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            })
        } else {
            None
        };

        let model = if request.model.is_empty() {
            self.config.default_model.clone()
        } else {
            request.model
        };

        let ollama_request = OllamaRequest {
            model,
            messages: request.messages,
            stream: false,
            tools: request.tools,
            options,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .json(&ollama_request)
            .send()
            .await
            .map_err(request_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LLMError::ApiError(format!("Failed to parse response: {}", e)))?;

        let tool_calls = ollama_response
            .message
            .tool_calls
            .into_iter()
            .map(|call| ToolInvocation::from_raw_arguments(call.function.name, call.function.arguments))
            .collect();

        let total_tokens = match (ollama_response.prompt_eval_count, ollama_response.eval_count) {
            (Some(prompt), Some(completion)) => Some(prompt + completion),
            _ => None,
        };

        Ok(LLMResponse {
            content: ollama_response.message.content,
            model: ollama_response.model,
            tool_calls,
            prompt_tokens: ollama_response.prompt_eval_count,
            completion_tokens: ollama_response.eval_count,
            total_tokens,
            finish_reason: if ollama_response.done {
                Some("stop".to_string())
            } else {
                None
            },
        })
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(format!(
                "{}/api/tags",
                self.config.endpoint.trim_end_matches("/api/chat")
            ))
            .send()
            .await
            .is_ok()
    }

    fn name(&self) -> &str {
        "Ollama"
    }
}
