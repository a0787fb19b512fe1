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

use clap::Parser;
use npcmind_server::config::{Arguments, Command, Configuration};
use npcmind_server::dialogue::{DialogueOrchestrator, PersonaCatalog};
use npcmind_server::listener::{self, AppState};
use npcmind_server::memory::{InMemoryVectorStore, MemoryStore, PgVectorStore, VectorStore};
use npcmind_server::models::{ModelManager, create_embedder};
use npcmind_server::seed::seed_world;
use std::error::Error;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load arguments from the command line
    let arguments: Arguments = Parser::parse();

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .with_ansi(true)
        .init();

    // Load environment variables from .env file if specified
    if let Some(ref env_file) = arguments.env_file {
        if std::path::Path::new(env_file).exists() {
            tracing::debug!("Loading environment variables from file: {}", env_file);
            dotenv::from_filename(env_file).ok();
        }
    } else {
        tracing::debug!("Loading environment variables from default file");
        dotenv::dotenv().ok();
    }

    // Load configuration from a file with environment variable substitution
    let config: Configuration =
        Configuration::load(&arguments.config_file).expect("Unable to load configuration file");

    tracing::debug!("Configuration loaded: {:?}", config);
    tracing::info!("Starting NPC Mind dialogue server...");

    // Memory store
    let embedder = create_embedder(&config.embedding.to_embedding_config())?;
    let backend: Arc<dyn VectorStore> = match &config.database {
        Some(database) => {
            tracing::info!("Connecting to Database at {}", &database.url);
            Arc::new(PgVectorStore::connect(&database.url, database.max_connections).await?)
        }
        None => {
            tracing::warn!("No database configured, memories live in process memory");
            Arc::new(InMemoryVectorStore::new())
        }
    };
    let memory = Arc::new(MemoryStore::new(embedder, backend, config.memory.clone())?);

    // Language model providers
    let models = ModelManager::new();
    for (name, settings) in &config.llm.providers {
        models
            .register_llm_provider(name.clone(), settings.to_llm_config())
            .await?;
        tracing::info!("Registered LLM provider '{}' ({})", name, settings.kind);
    }
    let decision = models
        .resolve_llm_provider(config.dialogue.decision_provider.as_deref())
        .await?;
    let generation = models
        .resolve_llm_provider(config.dialogue.generation_provider.as_deref())
        .await?;

    let orchestrator = Arc::new(DialogueOrchestrator::new(
        memory.clone(),
        decision,
        generation,
        config.dialogue.to_settings(),
    ));
    let catalog = Arc::new(PersonaCatalog::load(&config.data.world_file)?);

    // Process memory starts empty on every run
    let seed_before_use = config.data.seed_on_start || config.database.is_none();

    match arguments.command() {
        Command::Seed => {
            let report = seed_world(&memory, &catalog).await?;
            tracing::info!(
                "Seeded {} characters and {} lore entries into {} records",
                report.characters,
                report.lore_entries,
                report.records
            );
        }
        Command::Serve => {
            if seed_before_use {
                seed_world(&memory, &catalog).await?;
            }
            let state = AppState {
                orchestrator,
                catalog,
                default_situation: config.dialogue.default_situation.clone(),
            };
            listener::serve(config.listener.addr.to_addr(), state).await?;
        }
        Command::Chat { name, situation } => {
            if seed_before_use {
                seed_world(&memory, &catalog).await?;
            }
            let situation = situation.unwrap_or_else(|| config.dialogue.default_situation.clone());
            run_chat(&orchestrator, &catalog, &name, &situation).await?;
        }
    }

    Ok(())
}

/// Converse with one character over stdin and stdout. `/end` leaves.
async fn run_chat(
    orchestrator: &DialogueOrchestrator,
    catalog: &PersonaCatalog,
    name: &str,
    situation: &str,
) -> Result<(), Box<dyn Error>> {
    let record = catalog
        .find(name)
        .ok_or_else(|| format!("Unknown character '{}'", name))?;
    let mut session = orchestrator.start_session(record, situation).await?;
    let npc = session.character().name().to_string();

    let mut stdout = tokio::io::stdout();
    let greeting = orchestrator.greet(&mut session).await?;
    stdout
        .write_all(format!("{}: {}\n", npc, greeting.reply).as_bytes())
        .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            orchestrator.end_session(&mut session);
            break;
        };
        if line.trim() == "/end" {
            orchestrator.end_session(&mut session);
            break;
        }

        let outcome = orchestrator.process_turn(&mut session, &line).await?;
        if !outcome.reply.is_empty() {
            stdout
                .write_all(format!("{}: {}\n", npc, outcome.reply).as_bytes())
                .await?;
        }
        if session.is_ended() {
            stdout
                .write_all(format!("{} ended the conversation.\n", npc).as_bytes())
                .await?;
            break;
        }
    }
    Ok(())
}
