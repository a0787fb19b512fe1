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

//! Runs conversation turns against the memory store and two model phases

use super::actions::ToolKind;
use super::character::{Character, PersonaError};
use super::dispatcher::ToolDispatcher;
use super::prompt::{self, PromptInput};
use super::session::DialogueSession;
use super::state::{ConversationPhase, ConversationState, SentimentState};
use crate::memory::{
    FilterClause, MemoryStore, MetadataCategory, RecordMetadata, StoreError, concatenate,
};
use crate::models::{
    LLMError, LLMMessage, LLMRequest, LlmProvider, ToolInvocation, parse_text_tool_calls,
};
use metrics::{counter, histogram};
use npcmind_common::PersonaRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Errors that end a turn. The session is terminated whenever a turn fails.
#[derive(Debug, Error)]
pub enum DialogueError {
    #[error("Conversation has ended")]
    SessionEnded,

    #[error("Conversation cannot move from {from} to {to}")]
    InvalidTransition {
        from: ConversationPhase,
        to: ConversationPhase,
    },

    #[error("Decision phase failed: {0}")]
    Decision(#[source] LLMError),

    #[error("Generation phase failed: {0}")]
    Generation(#[source] LLMError),

    #[error("{phase} phase timed out after {seconds}s")]
    Timeout { phase: &'static str, seconds: u64 },

    #[error("Memory store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid persona: {0}")]
    Persona(#[from] PersonaError),
}

pub type DialogueResult<T> = Result<T, DialogueError>;

/// How retrieved documents become the prompt's general context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// One query over the whole filter, top `k` joined in rank order
    #[default]
    Ranked,
    /// One top-1 query per filter group, so no category crowds out the others
    PerGroup,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogueSettings {
    /// Model name for the decision phase, empty for the provider default
    pub decision_model: String,
    /// Model name for the generation phase, empty for the provider default
    pub generation_model: String,
    pub decision_timeout: Duration,
    pub generation_timeout: Duration,
    /// Extra generation attempts after a transient failure, capped at one
    pub generation_retries: u8,
    pub top_k: usize,
    pub retrieval_mode: RetrievalMode,
    /// Exchanges kept in the generation history
    pub history_limit: usize,
    /// Stands in for the player utterance when the character speaks first
    pub greeting_cue: String,
    /// Store every sentiment change as a memory record
    pub persist_sentiment: bool,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for DialogueSettings {
    fn default() -> Self {
        Self {
            decision_model: String::new(),
            generation_model: String::new(),
            decision_timeout: Duration::from_secs(60),
            generation_timeout: Duration::from_secs(120),
            generation_retries: 1,
            top_k: 5,
            retrieval_mode: RetrievalMode::Ranked,
            history_limit: 10,
            greeting_cue: "*{{user}} approaches {{char}}*".to_string(),
            persist_sentiment: true,
            temperature: Some(0.7),
            max_tokens: None,
        }
    }
}

/// Result of one delivered reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub reply: String,
    pub talk_ongoing: bool,
    pub phase: ConversationPhase,
    /// Tools that took effect during the decision phase
    pub applied: Vec<ToolKind>,
}

impl TurnOutcome {
    fn from_session(session: &DialogueSession, reply: String, applied: Vec<ToolKind>) -> Self {
        Self {
            reply,
            talk_ongoing: session.state.talk_ongoing(),
            phase: session.phase(),
            applied,
        }
    }
}

/// Drives sessions through greeting and turns.
///
/// Holds only shared, read-mostly collaborators. All conversation state
/// lives in the [`DialogueSession`] passed to each call.
pub struct DialogueOrchestrator {
    memory: Arc<MemoryStore>,
    decision: Arc<dyn LlmProvider>,
    generation: Arc<dyn LlmProvider>,
    settings: DialogueSettings,
}

impl DialogueOrchestrator {
    pub fn new(
        memory: Arc<MemoryStore>,
        decision: Arc<dyn LlmProvider>,
        generation: Arc<dyn LlmProvider>,
        settings: DialogueSettings,
    ) -> Self {
        Self {
            memory,
            decision,
            generation,
            settings,
        }
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    pub fn settings(&self) -> &DialogueSettings {
        &self.settings
    }

    /// Validate `record` and open a session in the greeting phase.
    ///
    /// The starting sentiment comes from the closest sentiment memory of the
    /// character, queried with the situation.
    pub async fn start_session(
        &self,
        record: &PersonaRecord,
        situation: &str,
    ) -> DialogueResult<DialogueSession> {
        let character = Character::from_record(record, situation)?;
        let initial = character.initial_sentiment().clone();
        let mut session = DialogueSession::new(
            character,
            ConversationState::new(initial),
            self.settings.history_limit,
        );

        let sentiment = self.initial_sentiment(&session).await?;
        session.state.set_sentiment(sentiment);
        self.advance(&mut session, ConversationPhase::Greeting)?;

        counter!("dialogue.sessions.started").increment(1);
        info!(
            session_id = %session.id(),
            character = %session.character().name(),
            sentiment = %session.state.sentiment(),
            "Dialogue session started"
        );
        Ok(session)
    }

    async fn initial_sentiment(&self, session: &DialogueSession) -> DialogueResult<SentimentState> {
        let character = session.character();
        let filter = session.resolver.sentiment_filter();
        let hits = self
            .memory
            .query_top_k(&situation_query(character), Some(&filter), 1)
            .await?;
        let persona = character.initial_sentiment();

        Ok(match hits.first() {
            Some(hit) => SentimentState::parse(&hit.document)
                .unwrap_or_else(|| SentimentState::new(persona.value, hit.document.clone())),
            None => persona.clone(),
        })
    }

    /// Have the character open the conversation.
    ///
    /// Runs only the generation phase, with the character's own records and
    /// the lore it can know retrieved for the situation. Moves the session
    /// from greeting to active.
    #[instrument(skip(self, session), fields(session_id = %session.id(), character = %session.character().name()))]
    pub async fn greet(&self, session: &mut DialogueSession) -> DialogueResult<TurnOutcome> {
        self.ensure_phase(session, ConversationPhase::Greeting)?;

        let result = self.run_greeting(session).await;
        if let Err(error) = &result {
            warn!(%error, "Greeting failed, ending session");
            session.state.terminate();
        }
        result
    }

    async fn run_greeting(&self, session: &mut DialogueSession) -> DialogueResult<TurnOutcome> {
        let character = session.character();
        let cue = prompt::substitute(&self.settings.greeting_cue, character.name());
        let filter = session.resolver.greeting_filter();
        let context = self
            .retrieve(&situation_query(character), Some(&filter))
            .await?;
        let sentiment = session.state.sentiment().to_string();
        let composed = prompt::compose(&PromptInput {
            name: character.name(),
            persona_sheet: character.persona_sheet(),
            example_dialogue: character.example_dialogue(),
            situation: character.situation(),
            sentiment: &sentiment,
            context: &context,
            intention: None,
            utterance: &cue,
        });

        let reply = self.generate(session.history.to_messages(&composed)).await?;
        session.history.record(cue, reply.clone());
        self.advance(session, ConversationPhase::Active)?;
        Ok(TurnOutcome::from_session(session, reply, Vec::new()))
    }

    /// Answer one player utterance.
    ///
    /// A blank utterance returns an empty reply without touching the store or
    /// either model. Any error ends the session.
    #[instrument(skip(self, session, utterance), fields(session_id = %session.id(), character = %session.character().name()))]
    pub async fn process_turn(
        &self,
        session: &mut DialogueSession,
        utterance: &str,
    ) -> DialogueResult<TurnOutcome> {
        self.ensure_phase(session, ConversationPhase::Active)?;

        if utterance.trim().is_empty() {
            debug!("Blank utterance, nothing to answer");
            return Ok(TurnOutcome::from_session(session, String::new(), Vec::new()));
        }

        let start = Instant::now();
        let result = self.run_turn(session, utterance.trim()).await;
        match &result {
            Ok(outcome) => {
                counter!("dialogue.turns", "status" => "ok").increment(1);
                info!(
                    talk_ongoing = outcome.talk_ongoing,
                    phase = %outcome.phase,
                    tools = outcome.applied.len(),
                    "Turn completed"
                );
            }
            Err(error) => {
                counter!("dialogue.turns", "status" => "error").increment(1);
                warn!(%error, "Turn failed, ending session");
                session.state.terminate();
            }
        }
        histogram!("dialogue.turn.duration").record(start.elapsed().as_secs_f64());
        result
    }

    async fn run_turn(
        &self,
        session: &mut DialogueSession,
        utterance: &str,
    ) -> DialogueResult<TurnOutcome> {
        let invocations = self.decide(session, utterance).await?;
        let outcome = ToolDispatcher::new(&session.resolver).dispatch(&invocations, &mut session.state);

        let effective = outcome.normalized_prompt.as_deref().unwrap_or(utterance);
        if outcome.normalized_prompt.is_some() {
            info!("Player message flagged, answering the normalized prompt");
        }
        if outcome.sentiment_changed && self.settings.persist_sentiment {
            self.persist_sentiment(session).await;
        }

        let context = self.retrieve(effective, outcome.filter.as_ref()).await?;
        let character = session.character();
        let sentiment = session.state.sentiment().to_string();
        let composed = prompt::compose(&PromptInput {
            name: character.name(),
            persona_sheet: character.persona_sheet(),
            example_dialogue: character.example_dialogue(),
            situation: character.situation(),
            sentiment: &sentiment,
            context: &context,
            intention: session.state.intention(),
            utterance: effective,
        });

        let reply = self.generate(session.history.to_messages(&composed)).await?;
        session.history.record(effective, reply.clone());
        self.advance(session, ConversationPhase::Active)?;
        session.state.finish_turn();

        Ok(TurnOutcome::from_session(session, reply, outcome.applied))
    }

    /// End the conversation. Ending an ended session does nothing.
    pub fn end_session(&self, session: &mut DialogueSession) {
        if session.is_ended() {
            return;
        }
        session.state.terminate();
        info!(
            session_id = %session.id(),
            character = %session.character().name(),
            started_at = %session.started_at(),
            duration_seconds = session.elapsed().num_seconds(),
            "Dialogue session ended"
        );
    }

    /// Ask the decision model which tools to run for `utterance`.
    ///
    /// Falls back to tool calls written into the reply text when the
    /// provider returned none natively.
    async fn decide(
        &self,
        session: &DialogueSession,
        utterance: &str,
    ) -> DialogueResult<Vec<ToolInvocation>> {
        let character = session.character();
        let instruction = prompt::decision_instruction(
            character.name(),
            character.situation(),
            character.persona_sheet(),
            &session.state.sentiment().to_string(),
            utterance,
        );
        let request = LLMRequest::new(self.settings.decision_model.clone())
            .with_message(LLMMessage::user(instruction))
            .with_tools(ToolKind::all_definitions());

        let response = tokio::time::timeout(self.settings.decision_timeout, self.decision.complete(request))
            .await
            .map_err(|_| DialogueError::Timeout {
                phase: "decision",
                seconds: self.settings.decision_timeout.as_secs(),
            })?
            .map_err(DialogueError::Decision)?;

        let invocations = if response.tool_calls.is_empty() {
            parse_text_tool_calls(&response.content)
        } else {
            response.tool_calls
        };
        debug!(count = invocations.len(), "Decision phase returned tool calls");
        Ok(invocations)
    }

    /// Context text for `query`, shaped by the configured retrieval mode
    async fn retrieve(&self, query: &str, filter: Option<&FilterClause>) -> DialogueResult<String> {
        let context = match (self.settings.retrieval_mode, filter) {
            (RetrievalMode::PerGroup, Some(filter)) => {
                self.memory
                    .query_top1_per_group(query, &filter.split_groups())
                    .await?
            }
            _ => concatenate(&self.memory.query_top_k(query, filter, self.settings.top_k).await?),
        };
        Ok(context)
    }

    /// Run the generation phase, retrying once after a transient failure
    async fn generate(&self, messages: Vec<LLMMessage>) -> DialogueResult<String> {
        let request = LLMRequest::new(self.settings.generation_model.clone())
            .with_messages(messages)
            .with_sampling(self.settings.temperature, self.settings.max_tokens);

        let attempts = 1 + u32::from(self.settings.generation_retries.min(1));
        let timeout = self.settings.generation_timeout;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let retry = attempt < attempts;
            match tokio::time::timeout(timeout, self.generation.complete(request.clone())).await {
                Ok(Ok(response)) => return Ok(response.content.trim().to_string()),
                Ok(Err(error)) if retry && error.is_transient() => {
                    warn!(%error, attempt, "Generation failed, retrying");
                }
                Ok(Err(error)) => return Err(DialogueError::Generation(error)),
                Err(_) if retry => {
                    warn!(attempt, "Generation timed out, retrying");
                }
                Err(_) => {
                    return Err(DialogueError::Timeout {
                        phase: "generation",
                        seconds: timeout.as_secs(),
                    });
                }
            }
        }
    }

    /// Store the current sentiment as a new memory. Failures are logged only.
    async fn persist_sentiment(&self, session: &DialogueSession) {
        let character = session.character();
        let id = format!(
            "{}-{}-{}",
            character.entity_id(),
            MetadataCategory::Sentiment,
            Uuid::new_v4()
        );
        let metadata = RecordMetadata::character(
            character.faction(),
            character.name(),
            MetadataCategory::Sentiment,
        );
        let text = session.state.sentiment().to_string();
        if let Err(error) = self.memory.add_record(&id, &text, metadata).await {
            warn!(%error, id, "Failed to persist sentiment change");
        }
    }

    fn ensure_phase(
        &self,
        session: &DialogueSession,
        expected: ConversationPhase,
    ) -> DialogueResult<()> {
        match session.phase() {
            ConversationPhase::Ended => Err(DialogueError::SessionEnded),
            phase if phase == expected => Ok(()),
            phase => Err(DialogueError::InvalidTransition {
                from: phase,
                to: expected,
            }),
        }
    }

    fn advance(
        &self,
        session: &mut DialogueSession,
        next: ConversationPhase,
    ) -> DialogueResult<()> {
        session
            .state
            .advance(next)
            .map_err(|(from, to)| DialogueError::InvalidTransition { from, to })
    }
}

/// Situation text as it is embedded for retrieval, placeholders filled in
fn situation_query(character: &Character) -> String {
    prompt::substitute(character.situation(), character.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmbeddingResult, Embedder, LLMResponse, MockLlmProvider};
    use async_trait::async_trait;
    use npcmind_common::Faction;
    use serde_json::json;

    struct FlatEmbedder;

    #[async_trait]
    impl Embedder for FlatEmbedder {
        async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
            Ok(vec![1.0, text.len() as f32 / 100.0])
        }

        fn model(&self) -> &str {
            "flat"
        }
    }

    /// Remembers every text it was asked to embed
    #[derive(Default)]
    struct RecordingEmbedder {
        texts: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Embedder for RecordingEmbedder {
        async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
            self.texts.lock().unwrap().push(text.to_string());
            Ok(vec![1.0, 0.5])
        }

        fn model(&self) -> &str {
            "recording"
        }
    }

    fn tom() -> PersonaRecord {
        PersonaRecord {
            name: "Tom".to_string(),
            faction: Faction::Raccoon,
            persona_sheet: "[Tom: sly, curious; smuggler]".to_string(),
            example_dialogue: "Tom: Well well.".to_string(),
            knowledge: String::new(),
            past: String::new(),
            relations: String::new(),
            sentiment: "skeptical: a stranger".to_string(),
        }
    }

    fn orchestrator(decision: MockLlmProvider, generation: MockLlmProvider) -> DialogueOrchestrator {
        let memory = Arc::new(MemoryStore::in_memory(Arc::new(FlatEmbedder)));
        DialogueOrchestrator::new(
            memory,
            Arc::new(decision),
            Arc::new(generation),
            DialogueSettings::default(),
        )
    }

    fn replying(text: &'static str) -> MockLlmProvider {
        let mut provider = MockLlmProvider::new();
        provider
            .expect_complete()
            .returning(move |_| Ok(LLMResponse::new(text, "mock")));
        provider
    }

    #[tokio::test]
    async fn test_start_session_uses_persona_sentiment() {
        let orchestrator = orchestrator(MockLlmProvider::new(), MockLlmProvider::new());
        let session = orchestrator.start_session(&tom(), "The docks").await.unwrap();
        assert_eq!(session.phase(), ConversationPhase::Greeting);
        assert_eq!(session.state().sentiment().to_string(), "skeptical: a stranger");
    }

    #[tokio::test]
    async fn test_turn_before_greeting_is_rejected() {
        let orchestrator = orchestrator(MockLlmProvider::new(), MockLlmProvider::new());
        let mut session = orchestrator.start_session(&tom(), "The docks").await.unwrap();
        let result = orchestrator.process_turn(&mut session, "Hello").await;
        assert!(matches!(result, Err(DialogueError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_turn_applies_tools_and_replies() {
        let mut decision = MockLlmProvider::new();
        decision.expect_complete().times(1).returning(|request| {
            assert_eq!(request.tools.len(), 5);
            Ok(LLMResponse::new("", "mock").with_tool_calls(vec![
                ToolInvocation::new("immediate_action", json!({"action": "end_conversation"})),
                ToolInvocation::new(
                    "change_sentiment",
                    json!({"new_sentiment": "angry", "reasoning": "rude"}),
                ),
            ]))
        });
        let orchestrator = orchestrator(decision, replying("Get lost."));

        let mut session = orchestrator.start_session(&tom(), "The docks").await.unwrap();
        orchestrator.greet(&mut session).await.unwrap();
        let outcome = orchestrator.process_turn(&mut session, "Hand it over").await.unwrap();

        assert_eq!(outcome.reply, "Get lost.");
        assert!(!outcome.talk_ongoing);
        assert_eq!(outcome.phase, ConversationPhase::Ended);
        assert_eq!(
            outcome.applied,
            vec![ToolKind::ChangeSentiment, ToolKind::ImmediateAction]
        );
        assert_eq!(orchestrator.memory().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_blank_utterance_makes_no_calls() {
        let orchestrator = orchestrator(MockLlmProvider::new(), replying("Hello there."));
        let mut session = orchestrator.start_session(&tom(), "The docks").await.unwrap();
        orchestrator.greet(&mut session).await.unwrap();

        let outcome = orchestrator.process_turn(&mut session, "   ").await.unwrap();
        assert_eq!(outcome.reply, "");
        assert_eq!(outcome.phase, ConversationPhase::Active);
    }

    #[tokio::test]
    async fn test_non_transient_generation_error_is_not_retried() {
        let mut generation = MockLlmProvider::new();
        generation
            .expect_complete()
            .times(1)
            .returning(|_| Err(LLMError::AuthError("bad key".to_string())));
        let orchestrator = orchestrator(MockLlmProvider::new(), generation);

        let mut session = orchestrator.start_session(&tom(), "The docks").await.unwrap();
        let result = orchestrator.greet(&mut session).await;
        assert!(matches!(result, Err(DialogueError::Generation(LLMError::AuthError(_)))));
        assert!(session.is_ended());
    }

    #[tokio::test]
    async fn test_situation_placeholders_filled_before_retrieval() {
        let embedder = Arc::new(RecordingEmbedder::default());
        let memory = Arc::new(MemoryStore::in_memory(embedder.clone()));
        let orchestrator = DialogueOrchestrator::new(
            memory,
            Arc::new(MockLlmProvider::new()),
            Arc::new(replying("Evening.")),
            DialogueSettings::default(),
        );

        let mut session = orchestrator
            .start_session(&tom(), "{{user}} finds {{char}} on the pier.")
            .await
            .unwrap();
        orchestrator.greet(&mut session).await.unwrap();

        let texts = embedder.texts.lock().unwrap().clone();
        assert!(!texts.is_empty());
        assert!(texts.iter().all(|text| !text.contains("{{")));
        assert!(texts.contains(&"the player finds Tom on the pier.".to_string()));
    }

    #[tokio::test]
    async fn test_generation_carries_sampling_settings() {
        let mut generation = MockLlmProvider::new();
        generation.expect_complete().times(1).returning(|request| {
            assert_eq!(request.temperature, Some(0.7));
            assert_eq!(request.max_tokens, None);
            assert!(request.tools.is_empty());
            Ok(LLMResponse::new("Evening.", "mock"))
        });
        let orchestrator = orchestrator(MockLlmProvider::new(), generation);

        let mut session = orchestrator.start_session(&tom(), "The docks").await.unwrap();
        orchestrator.greet(&mut session).await.unwrap();
    }

    #[tokio::test]
    async fn test_end_session_keeps_start_time() {
        let orchestrator = orchestrator(MockLlmProvider::new(), MockLlmProvider::new());
        let mut session = orchestrator.start_session(&tom(), "The docks").await.unwrap();
        let started_at = session.started_at();
        orchestrator.end_session(&mut session);
        assert!(session.is_ended());
        assert_eq!(session.started_at(), started_at);
        assert!(session.elapsed() >= chrono::TimeDelta::zero());
    }

    #[tokio::test]
    async fn test_ended_session_rejects_turns() {
        let orchestrator = orchestrator(MockLlmProvider::new(), MockLlmProvider::new());
        let mut session = orchestrator.start_session(&tom(), "The docks").await.unwrap();
        orchestrator.end_session(&mut session);
        assert!(matches!(
            orchestrator.process_turn(&mut session, "Hello").await,
            Err(DialogueError::SessionEnded)
        ));
        assert!(matches!(
            orchestrator.greet(&mut session).await,
            Err(DialogueError::SessionEnded)
        ));
    }
}
