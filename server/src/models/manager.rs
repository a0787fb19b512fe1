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

//! Registry of named chat completion providers

use super::providers::{LlmProvider, OllamaProvider, OpenAiProvider};
use super::types::{LLMConfig, LLMError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Holds the configured providers so the decision and generation phases can
/// each be routed to their own backend.
pub struct ModelManager {
    llm_providers: Arc<RwLock<HashMap<String, Arc<dyn LlmProvider>>>>,
    default_llm_provider: Arc<RwLock<Option<String>>>,
}

impl ModelManager {
    pub fn new() -> Self {
        Self {
            llm_providers: Arc::new(RwLock::new(HashMap::new())),
            default_llm_provider: Arc::new(RwLock::new(None)),
        }
    }

    /// Build and register a provider from its configuration.
    /// The first registered provider becomes the default.
    pub async fn register_llm_provider(
        &self,
        name: impl Into<String>,
        config: LLMConfig,
    ) -> Result<(), LLMError> {
        let provider: Arc<dyn LlmProvider> = match config.provider.as_str() {
            "openai" | "lmstudio" => Arc::new(OpenAiProvider::new(config)?),
            "ollama" => Arc::new(OllamaProvider::new(config)?),
            _ => {
                return Err(LLMError::ConfigError(format!(
                    "Unknown provider type: {}",
                    config.provider
                )));
            }
        };

        let name = name.into();
        self.llm_providers
            .write()
            .await
            .insert(name.clone(), provider);

        let mut default = self.default_llm_provider.write().await;
        if default.is_none() {
            *default = Some(name);
        }
        Ok(())
    }

    async fn get_llm_provider(&self, name: &str) -> Result<Arc<dyn LlmProvider>, LLMError> {
        let providers = self.llm_providers.read().await;
        providers.get(name).cloned().ok_or_else(|| {
            LLMError::ProviderUnavailable(format!("Provider '{}' not found", name))
        })
    }

    /// Get the named provider, or the default one when `name` is `None`
    pub async fn resolve_llm_provider(
        &self,
        name: Option<&str>,
    ) -> Result<Arc<dyn LlmProvider>, LLMError> {
        match name {
            Some(name) => self.get_llm_provider(name).await,
            None => {
                let default = self.default_llm_provider.read().await.clone();
                let name = default
                    .ok_or_else(|| LLMError::ConfigError("No default provider set".to_string()))?;
                self.get_llm_provider(&name).await
            }
        }
    }
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::new()
    }
}
