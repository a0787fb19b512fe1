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

//! Mutable per-conversation state

use super::actions::Sentiment;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Lifecycle of a conversation. `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    Init,
    Greeting,
    Active,
    Ended,
}

impl ConversationPhase {
    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_advance_to(&self, next: ConversationPhase) -> bool {
        use ConversationPhase::*;
        matches!(
            (self, next),
            (Init, Greeting) | (Greeting, Active) | (Active, Active) | (Init | Greeting | Active, Ended)
        )
    }
}

impl fmt::Display for ConversationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationPhase::Init => write!(f, "init"),
            ConversationPhase::Greeting => write!(f, "greeting"),
            ConversationPhase::Active => write!(f, "active"),
            ConversationPhase::Ended => write!(f, "ended"),
        }
    }
}

/// A sentiment value with the reasoning behind it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentState {
    pub value: Sentiment,
    pub reasoning: String,
}

impl SentimentState {
    pub fn new(value: Sentiment, reasoning: impl Into<String>) -> Self {
        Self {
            value,
            reasoning: reasoning.into().trim().to_string(),
        }
    }

    /// Parse `"<sentiment>"` or `"<sentiment>: <reasoning>"`.
    ///
    /// Returns `None` when the leading word is not a known sentiment.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (head, reasoning) = match text.split_once(':') {
            Some((head, reasoning)) => (head, reasoning),
            None => (text, ""),
        };
        let value = head.trim().to_lowercase().parse::<Sentiment>().ok()?;
        Some(Self::new(value, reasoning))
    }
}

impl Default for SentimentState {
    fn default() -> Self {
        Self::new(Sentiment::Neutral, "")
    }
}

impl fmt::Display for SentimentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reasoning.is_empty() {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{}: {}", self.value, self.reasoning)
        }
    }
}

/// Phase, sentiment, intention and the talk flag of one conversation.
///
/// `talk_ongoing` only ever goes from true to false. Once it is false the
/// conversation ends after the current reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    phase: ConversationPhase,
    sentiment: SentimentState,
    intention: Option<String>,
    talk_ongoing: bool,
}

impl ConversationState {
    pub fn new(sentiment: SentimentState) -> Self {
        Self {
            phase: ConversationPhase::Init,
            sentiment,
            intention: None,
            talk_ongoing: true,
        }
    }

    pub fn phase(&self) -> ConversationPhase {
        self.phase
    }

    pub fn sentiment(&self) -> &SentimentState {
        &self.sentiment
    }

    /// Intention chosen for the current turn
    pub fn intention(&self) -> Option<&str> {
        self.intention.as_deref()
    }

    pub fn talk_ongoing(&self) -> bool {
        self.talk_ongoing
    }

    pub fn is_ended(&self) -> bool {
        self.phase == ConversationPhase::Ended
    }

    /// Move to `next`, returning the rejected pair when not allowed
    pub fn advance(
        &mut self,
        next: ConversationPhase,
    ) -> Result<(), (ConversationPhase, ConversationPhase)> {
        if !self.phase.can_advance_to(next) {
            return Err((self.phase, next));
        }
        self.phase = next;
        Ok(())
    }

    pub fn set_sentiment(&mut self, sentiment: SentimentState) {
        self.sentiment = sentiment;
    }

    pub fn set_intention(&mut self, intention: Option<String>) {
        self.intention = intention;
    }

    /// Record the character's wish to continue. A request to resume a
    /// conversation that was already given up is ignored.
    pub fn set_talk_ongoing(&mut self, ongoing: bool) {
        if ongoing && !self.talk_ongoing {
            warn!("Ignoring request to resume a conversation that is ending");
            return;
        }
        self.talk_ongoing = ongoing;
    }

    /// Close out a completed turn, ending the conversation if the character
    /// decided to stop talking.
    pub fn finish_turn(&mut self) {
        if !self.talk_ongoing {
            self.phase = ConversationPhase::Ended;
        }
    }

    /// End the conversation immediately
    pub fn terminate(&mut self) {
        self.talk_ongoing = false;
        self.phase = ConversationPhase::Ended;
    }
}
