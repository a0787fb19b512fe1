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

use crate::dialogue::{DialogueSettings, RetrievalMode};
use crate::memory::MemoryConfig;
use crate::models::{EmbeddingConfig, EmbeddingProviderKind, LLMConfig};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_env_field::EnvField;
use std::collections::BTreeMap;
use std::net::{AddrParseError, IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Situation used when a client does not describe one
pub const DEFAULT_SITUATION: &str = "{{user}} enters the village of Rack and stumbles upon {{char}}. {{char}} initiates the contact to {{user}}";

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Arguments {
    #[arg(
        short = 'c',
        long = "config",
        help = "Path to configuration file",
        default_value = "server/config.yaml"
    )]
    pub config_file: String,

    #[arg(
        short = 'e',
        long = "env",
        help = "Path to environment file",
        default_value = "server/.env"
    )]
    pub env_file: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Arguments {
    /// The selected subcommand, `serve` when none was given
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}

impl Default for Arguments {
    fn default() -> Self {
        Self {
            config_file: "config.yaml".to_string(),
            env_file: Some(".env".to_string()),
            command: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Serve the websocket API
    Serve,
    /// Embed personas and lore into the memory store, then exit
    Seed,
    /// Talk to a character on the terminal
    Chat {
        /// Character name
        name: String,
        #[arg(short, long, help = "Situation the conversation starts in")]
        situation: Option<String>,
    },
}

/// Errors raised while loading the configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to open config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub listener: ListenerConfig,
    /// Postgres settings, the in-memory store is used when absent
    pub database: Option<DatabaseConfig>,
    pub embedding: EmbeddingSettings,
    pub memory: MemoryConfig,
    pub llm: LlmSettings,
    pub dialogue: DialogueConfig,
    pub data: DataConfig,
}

impl Configuration {
    pub fn load(path: &str) -> Result<Configuration, ConfigError> {
        let file = std::fs::File::open(path).map_err(|source| ConfigError::Io {
            path: PathBuf::from(path),
            source,
        })?;
        serde_yaml::from_reader(file).map_err(|source| ConfigError::Parse {
            path: PathBuf::from(path),
            source,
        })
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListenerConfig {
    pub addr: EnvField<ListenerBinding>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListenerBinding(SocketAddr);

impl ListenerBinding {
    pub fn to_addr(&self) -> SocketAddr {
        self.0
    }
    pub fn to_ip(&self) -> IpAddr {
        self.0.ip()
    }
    pub fn to_port(&self) -> u16 {
        self.0.port()
    }
}

impl FromStr for ListenerBinding {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        tracing::debug!("Parsing listener binding from string: {}", s);
        Ok(Self(SocketAddr::from_str(s)?))
    }
}

impl Default for ListenerBinding {
    fn default() -> Self {
        Self(SocketAddr::V4(SocketAddrV4::new(
            Ipv4Addr::new(0, 0, 0, 0),
            8000,
        )))
    }
}

impl std::fmt::Display for ListenerBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: EnvField<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

/// Embedding service settings, with environment substitution for secrets
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProviderKind,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<EnvField<String>>,
    pub timeout_seconds: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        let defaults = EmbeddingConfig::default();
        Self {
            provider: defaults.provider,
            endpoint: defaults.endpoint,
            model: defaults.model,
            api_key: None,
            timeout_seconds: defaults.timeout_seconds,
        }
    }
}

impl EmbeddingSettings {
    pub fn to_embedding_config(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: self.provider,
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            api_key: self.api_key.as_ref().map(|key| key.to_string()),
            timeout_seconds: self.timeout_seconds,
        }
    }
}

/// Named chat completion providers
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub providers: BTreeMap<String, ProviderSettings>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        let mut providers = BTreeMap::new();
        providers.insert("ollama".to_string(), ProviderSettings::default());
        Self { providers }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// `ollama`, `openai` or `lmstudio`
    pub kind: String,
    /// Chat endpoint, the provider's usual local address when absent
    pub endpoint: Option<EnvField<String>>,
    pub api_key: Option<EnvField<String>>,
    pub default_model: String,
    pub timeout_seconds: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: "ollama".to_string(),
            endpoint: None,
            api_key: None,
            default_model: "llama3.1".to_string(),
            timeout_seconds: 120,
        }
    }
}

impl ProviderSettings {
    pub fn to_llm_config(&self) -> LLMConfig {
        let mut config = match self.kind.as_str() {
            "openai" => LLMConfig::openai("", self.default_model.as_str()),
            "lmstudio" => LLMConfig::lmstudio(
                "http://localhost:1234/v1/chat/completions",
                self.default_model.as_str(),
            ),
            _ => LLMConfig::ollama("http://localhost:11434/api/chat", self.default_model.as_str()),
        };
        config.provider = self.kind.clone();
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.to_string();
        }
        config.api_key = self
            .api_key
            .as_ref()
            .map(|key| key.to_string())
            .filter(|key| !key.is_empty());
        config.timeout_seconds = self.timeout_seconds;
        config
    }
}

/// Dialogue pipeline settings as written in the config file
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Provider for the decision phase, the first configured one when absent
    pub decision_provider: Option<String>,
    /// Provider for the generation phase, the first configured one when absent
    pub generation_provider: Option<String>,
    pub decision_model: String,
    pub generation_model: String,
    pub decision_timeout_seconds: u64,
    pub generation_timeout_seconds: u64,
    pub generation_retries: u8,
    pub top_k: usize,
    pub retrieval_mode: RetrievalMode,
    pub history_limit: usize,
    pub default_situation: String,
    pub greeting_cue: String,
    pub persist_sentiment: bool,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        let settings = DialogueSettings::default();
        Self {
            decision_provider: None,
            generation_provider: None,
            decision_model: settings.decision_model,
            generation_model: settings.generation_model,
            decision_timeout_seconds: settings.decision_timeout.as_secs(),
            generation_timeout_seconds: settings.generation_timeout.as_secs(),
            generation_retries: settings.generation_retries,
            top_k: settings.top_k,
            retrieval_mode: settings.retrieval_mode,
            history_limit: settings.history_limit,
            default_situation: DEFAULT_SITUATION.to_string(),
            greeting_cue: settings.greeting_cue,
            persist_sentiment: settings.persist_sentiment,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

impl DialogueConfig {
    pub fn to_settings(&self) -> DialogueSettings {
        DialogueSettings {
            decision_model: self.decision_model.clone(),
            generation_model: self.generation_model.clone(),
            decision_timeout: Duration::from_secs(self.decision_timeout_seconds),
            generation_timeout: Duration::from_secs(self.generation_timeout_seconds),
            generation_retries: self.generation_retries.min(1),
            top_k: self.top_k,
            retrieval_mode: self.retrieval_mode,
            history_limit: self.history_limit,
            greeting_cue: self.greeting_cue.clone(),
            persist_sentiment: self.persist_sentiment,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// YAML file with characters and lore
    pub world_file: String,
    /// Seed the memory store before serving
    pub seed_on_start: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            world_file: "server/data/world.yaml".to_string(),
            seed_on_start: false,
        }
    }
}
