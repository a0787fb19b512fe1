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

//! Language model and embedding integration
//!
//! Chat completion providers (with tool calling), a registry of named
//! providers, and text embedding backends used by the memory store.

mod embeddings;
mod manager;
mod providers;
mod tools;
mod types;

pub use self::embeddings::{
    EmbeddingConfig, EmbeddingError, EmbeddingProviderKind, EmbeddingResult, Embedder,
    OllamaEmbedder, OpenAiEmbedder, create_embedder,
};
pub use self::manager::ModelManager;
pub use self::providers::{LlmProvider, OllamaProvider, OpenAiProvider};
#[cfg(test)]
pub use self::providers::MockLlmProvider;
pub use self::tools::{FunctionDefinition, ToolDefinition, ToolInvocation, parse_text_tool_calls};
pub use self::types::{LLMConfig, LLMError, LLMMessage, LLMRequest, LLMResponse, LLMRole};
