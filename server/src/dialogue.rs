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

//! Per-turn NPC dialogue pipeline
//!
//! A turn runs in two model phases. The decision phase offers the model a
//! fixed set of tools; the [`ToolDispatcher`] validates what comes back,
//! updates the [`ConversationState`] and, through the
//! [`CognitiveActionResolver`], picks which memories to retrieve. The
//! generation phase answers in character over a prompt assembled by
//! [`prompt::compose`].

mod actions;
mod character;
mod dispatcher;
mod orchestrator;
pub mod prompt;
mod resolver;
mod session;
mod state;

pub use self::actions::{
    CognitiveAction, INTENTION_VOCABULARY, NpcAction, Sentiment, ToolCall, ToolError, ToolKind,
};
pub use self::character::{Character, PersonaCatalog, PersonaError};
pub use self::dispatcher::{DispatchOutcome, RejectedInvocation, RejectionReason, ToolDispatcher};
pub use self::orchestrator::{
    DialogueError, DialogueOrchestrator, DialogueResult, DialogueSettings, RetrievalMode,
    TurnOutcome,
};
pub use self::resolver::CognitiveActionResolver;
pub use self::session::{ConversationHistory, DialogueSession};
pub use self::state::{ConversationPhase, ConversationState, SentimentState};
