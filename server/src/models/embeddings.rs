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

//! # Embedding Generation Module
//!
//! Text embeddings for memory records and queries, produced by a remote
//! embedding service.
//!
//! ## Supported Backends
//!
//! - **Ollama**: `POST /api/embeddings` with `{model, prompt}`, e.g. `mxbai-embed-large`
//! - **OpenAI**: `POST /v1/embeddings` with `{model, input}`, e.g. `text-embedding-3-small`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use npcmind_server::models::{EmbeddingConfig, create_embedder};
//!
//! let embedder = create_embedder(&EmbeddingConfig::default())?;
//! let vector = embedder.embed("The raccoons run the harbour").await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during embedding generation
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    /// The embedding service could not be reached
    #[error("Embedding request failed: {0}")]
    RequestError(String),

    /// The service answered with an error status or an unexpected body
    #[error("Embedding service error: {0}")]
    ServiceError(String),

    /// The service returned an empty vector
    #[error("Embedding service returned an empty vector")]
    EmptyEmbedding,

    /// Invalid embedder configuration
    #[error("Embedding configuration error: {0}")]
    ConfigError(String),
}

/// Result type for embedding operations
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Produces a vector for a piece of text
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>>;

    /// Model identifier, reported in store logs and debug output
    fn model(&self) -> &str;
}

/// Embedding service flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    #[default]
    Ollama,
    OpenAi,
}

/// Configuration of the embedding service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    /// Full URL of the embeddings endpoint
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Ollama,
            endpoint: "http://localhost:11434/api/embeddings".to_string(),
            model: "mxbai-embed-large".to_string(),
            api_key: None,
            timeout_seconds: 30,
        }
    }
}

/// Build the embedder described by `config`
pub fn create_embedder(config: &EmbeddingConfig) -> EmbeddingResult<Arc<dyn Embedder>> {
    Ok(match config.provider {
        EmbeddingProviderKind::Ollama => Arc::new(OllamaEmbedder::new(config.clone())?),
        EmbeddingProviderKind::OpenAi => Arc::new(OpenAiEmbedder::new(config.clone())?),
    })
}

fn http_client(timeout_seconds: u64) -> EmbeddingResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .map_err(|e| EmbeddingError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

async fn check_status(response: reqwest::Response) -> EmbeddingResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(EmbeddingError::ServiceError(format!(
        "Service returned {}: {}",
        status, body
    )))
}

/// Ollama embeddings endpoint client
pub struct OllamaEmbedder {
    config: EmbeddingConfig,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: EmbeddingConfig) -> EmbeddingResult<Self> {
        let client = http_client(config.timeout_seconds)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        #[derive(Serialize)]
        struct OllamaEmbeddingRequest<'a> {
            model: &'a str,
            prompt: &'a str,
        }

        #[derive(Deserialize)]
        struct OllamaEmbeddingResponse {
            embedding: Vec<f32>,
        }

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&OllamaEmbeddingRequest {
                model: &self.config.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| EmbeddingError::RequestError(e.to_string()))?;

        let body: OllamaEmbeddingResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| EmbeddingError::ServiceError(format!("Failed to parse response: {}", e)))?;

        if body.embedding.is_empty() {
            return Err(EmbeddingError::EmptyEmbedding);
        }
        Ok(body.embedding)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

/// OpenAI-compatible embeddings endpoint client
pub struct OpenAiEmbedder {
    config: EmbeddingConfig,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(config: EmbeddingConfig) -> EmbeddingResult<Self> {
        if config.api_key.is_none() {
            return Err(EmbeddingError::ConfigError(
                "OpenAI embeddings require an API key".to_string(),
            ));
        }
        let client = http_client(config.timeout_seconds)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        #[derive(Serialize)]
        struct OpenAiEmbeddingRequest<'a> {
            model: &'a str,
            input: &'a str,
        }

        #[derive(Deserialize)]
        struct OpenAiEmbeddingResponse {
            data: Vec<OpenAiEmbeddingData>,
        }

        #[derive(Deserialize)]
        struct OpenAiEmbeddingData {
            embedding: Vec<f32>,
        }

        let mut builder = self.client.post(&self.config.endpoint);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = builder
            .json(&OpenAiEmbeddingRequest {
                model: &self.config.model,
                input: text,
            })
            .send()
            .await
            .map_err(|e| EmbeddingError::RequestError(e.to_string()))?;

        let body: OpenAiEmbeddingResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| EmbeddingError::ServiceError(format!("Failed to parse response: {}", e)))?;

        body.data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .filter(|embedding| !embedding.is_empty())
            .ok_or(EmbeddingError::EmptyEmbedding)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
