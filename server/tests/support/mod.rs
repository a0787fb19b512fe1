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

//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use npcmind_common::{Faction, FactionLore, PersonaRecord, WorldData};
use npcmind_server::dialogue::{DialogueOrchestrator, DialogueSettings, PersonaCatalog};
use npcmind_server::memory::MemoryStore;
use npcmind_server::models::{
    Embedder, EmbeddingResult, LLMError, LLMRequest, LLMResponse, LlmProvider, ToolInvocation,
};
use npcmind_server::seed::seed_world;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

const DIMENSIONS: usize = 64;

/// Deterministic bag-of-words embedder. Each lowercase word adds one to a
/// bucket chosen from its bytes, so texts sharing words point the same way.
pub struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        let mut vector = vec![0.0; DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| word.len() > 2)
        {
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(7usize, |hash, byte| hash.wrapping_mul(31).wrapping_add(byte as usize));
            vector[bucket % DIMENSIONS] += 1.0;
        }
        vector[0] += 0.01;
        Ok(vector)
    }

    fn model(&self) -> &str {
        "keywords"
    }
}

/// Provider replaying queued responses and recording every request.
/// Once the queue is empty it answers with empty content.
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<LLMResponse, LLMError>>>,
    requests: Mutex<Vec<LLMRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(responses: Vec<Result<LLMResponse, LLMError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, response: Result<LLMResponse, LLMError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn reply(&self, text: &str) {
        self.push(Ok(LLMResponse::new(text, "scripted")));
    }

    pub fn tools(&self, calls: Vec<ToolInvocation>) {
        self.push(Ok(LLMResponse::new("", "scripted").with_tool_calls(calls)));
    }

    pub fn requests(&self) -> Vec<LLMRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Content of the final message of the most recent request
    pub fn last_prompt(&self) -> String {
        self.requests
            .lock()
            .unwrap()
            .last()
            .and_then(|request| request.messages.last())
            .map(|message| message.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse, LLMError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(LLMResponse::new("", "scripted")))
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "Scripted"
    }
}

pub fn call(name: &str, arguments: Value) -> ToolInvocation {
    ToolInvocation::new(name, arguments)
}

pub fn tom() -> PersonaRecord {
    PersonaRecord {
        name: "Tom".to_string(),
        faction: Faction::Raccoon,
        persona_sheet: "[{{char}}: raccoon, smuggler, sly, curious]".to_string(),
        example_dialogue: "{{user}}: Hello.\n{{char}}: Well well, a new face.".to_string(),
        knowledge: "Tom knows every tunnel under the village of Rack.".to_string(),
        past: "Tom grew up on the docks of Rack where his mother ran a smuggling ring."
            .to_string(),
        relations: "Tom trusts his cousin Mira and owes money to Vesk.".to_string(),
        sentiment: "skeptical: strangers rarely bring good news".to_string(),
    }
}

pub fn vesk() -> PersonaRecord {
    PersonaRecord {
        name: "Vesk".to_string(),
        faction: Faction::Chameleon,
        persona_sheet: "[{{char}}: chameleon, trader, calculating]".to_string(),
        example_dialogue: String::new(),
        knowledge: "Vesk trades in maps of the drowned coast.".to_string(),
        past: "Vesk grew up on a sunken island far from the docks.".to_string(),
        relations: "Vesk is owed forty shells by Tom.".to_string(),
        sentiment: "interested".to_string(),
    }
}

pub fn world() -> WorldData {
    WorldData {
        characters: vec![tom(), vesk()],
        lore: vec![
            FactionLore {
                faction: Faction::World,
                lore: "The sea has been rising for a generation.".to_string(),
            },
            FactionLore {
                faction: Faction::Raccoon,
                lore: "The raccoon clan controls the night markets of Rack.".to_string(),
            },
        ],
    }
}

pub async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::in_memory(Arc::new(KeywordEmbedder)));
    seed_world(&store, &PersonaCatalog::new(world()))
        .await
        .unwrap();
    store
}

pub fn orchestrator(
    memory: Arc<MemoryStore>,
    decision: Arc<ScriptedProvider>,
    generation: Arc<ScriptedProvider>,
    settings: DialogueSettings,
) -> DialogueOrchestrator {
    DialogueOrchestrator::new(memory, decision, generation, settings)
}
