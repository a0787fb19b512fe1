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

/// OpenAI-compatible chat completions provider.
///
/// Also serves LM Studio, which exposes the same protocol locally and does
/// not need an API key.
pub struct OpenAiProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(config: LLMConfig) -> Result<Self, LLMError> {
        if config.provider == "openai" && config.api_key.is_none() {
            return Err(LLMError::ConfigError(
                "OpenAI requires an API key".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| LLMError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse, LLMError> {
        #[derive(Serialize)]
        struct OpenAiRequest {
            model: String,
            messages: Vec<LLMMessage>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            tools: Vec<ToolDefinition>,
            #[serde(skip_serializing_if = "Option::is_none")]
            temperature: Option<f32>,
            #[serde(skip_serializing_if = "Option::is_none")]
            max_tokens: Option<u32>,
        }

        #[derive(Deserialize)]
        struct OpenAiResponse {
            choices: Vec<OpenAiChoice>,
            usage: Option<OpenAiUsage>,
            #[serde(default)]
            model: String,
        }

        #[derive(Deserialize)]
        struct OpenAiChoice {
            message: OpenAiMessage,
            finish_reason: Option<String>,
        }

        #[derive(Deserialize)]
        struct OpenAiMessage {
            content: Option<String>,
            #[serde(default)]
            tool_calls: Vec<OpenAiToolCall>,
        }

        #[derive(Deserialize)]
        struct OpenAiToolCall {
            function: OpenAiFunctionCall,
        }

        #[derive(Deserialize)]
        struct OpenAiFunctionCall {
            name: String,
            #[serde(default)]
            arguments: Value,
        }

        #[derive(Deserialize)]
        struct OpenAiUsage {
            prompt_tokens: u32,
            completion_tokens: u32,
            total_tokens: u32,
        }

        let model = if request.model.is_empty() {
            self.config.default_model.clone()
        } else {
            request.model
        };

        let openai_request = OpenAiRequest {
            model,
            messages: request.messages,
            tools: request.tools,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut builder = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = builder
            .json(&openai_request)
            .send()
            .await
            .map_err(request_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let openai_response: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| LLMError::ApiError(format!("Failed to parse response: {}", e)))?;

        let usage = openai_response.usage;
        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::ApiError("No choices in response".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|call| ToolInvocation::from_raw_arguments(call.function.name, call.function.arguments))
            .collect();

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            model: openai_response.model,
            tool_calls,
            prompt_tokens: usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: usage.as_ref().map(|u| u.completion_tokens),
            total_tokens: usage.as_ref().map(|u| u.total_tokens),
            finish_reason: choice.finish_reason,
        })
    }

    async fn is_available(&self) -> bool {
        self.client.get(&self.config.endpoint).send().await.is_ok()
    }

    fn name(&self) -> &str {
        if self.config.provider == "lmstudio" {
            "LM Studio"
        } else {
            "OpenAI"
        }
    }
}
