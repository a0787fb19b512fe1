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

//! A single conversation between the player and one character

use super::character::Character;
use super::prompt;
use super::resolver::CognitiveActionResolver;
use super::state::{ConversationPhase, ConversationState};
use crate::models::LLMMessage;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::VecDeque;
use uuid::Uuid;

/// Generation history owned by a session.
///
/// Holds the system instruction and the most recent `limit` exchanges.
/// Older exchanges are dropped first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationHistory {
    system: String,
    exchanges: VecDeque<(String, String)>,
    limit: usize,
}

impl ConversationHistory {
    pub fn new(system: impl Into<String>, limit: usize) -> Self {
        Self {
            system: system.into(),
            exchanges: VecDeque::with_capacity(limit),
            limit,
        }
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// Messages for a generation request ending with `prompt`
    pub fn to_messages(&self, prompt: &str) -> Vec<LLMMessage> {
        let mut messages = Vec::with_capacity(self.exchanges.len() * 2 + 2);
        messages.push(LLMMessage::system(self.system.clone()));
        for (user, reply) in &self.exchanges {
            messages.push(LLMMessage::user(user.clone()));
            messages.push(LLMMessage::assistant(reply.clone()));
        }
        messages.push(LLMMessage::user(prompt));
        messages
    }

    pub fn record(&mut self, user: impl Into<String>, reply: impl Into<String>) {
        if self.limit == 0 {
            return;
        }
        while self.exchanges.len() >= self.limit {
            self.exchanges.pop_front();
        }
        self.exchanges.push_back((user.into(), reply.into()));
    }
}

/// Per-conversation state, owned by whoever drives the conversation.
///
/// Turns take `&mut DialogueSession`, so a session never runs two turns at
/// once. Sessions share nothing mutable with each other.
#[derive(Debug, Clone)]
pub struct DialogueSession {
    id: Uuid,
    character: Character,
    pub(crate) resolver: CognitiveActionResolver,
    pub(crate) state: ConversationState,
    pub(crate) history: ConversationHistory,
    started_at: DateTime<Utc>,
}

impl DialogueSession {
    pub(crate) fn new(
        character: Character,
        state: ConversationState,
        history_limit: usize,
    ) -> Self {
        let resolver = CognitiveActionResolver::new(character.name(), character.faction());
        let history = ConversationHistory::new(
            prompt::system_instruction(character.name()),
            history_limit,
        );
        Self {
            id: Uuid::new_v4(),
            character,
            resolver,
            state,
            history,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn character(&self) -> &Character {
        &self.character
    }

    pub fn resolver(&self) -> &CognitiveActionResolver {
        &self.resolver
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn phase(&self) -> ConversationPhase {
        self.state.phase()
    }

    pub fn is_ended(&self) -> bool {
        self.state.is_ended()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Time since the session was started
    pub fn elapsed(&self) -> TimeDelta {
        Utc::now() - self.started_at
    }
}
