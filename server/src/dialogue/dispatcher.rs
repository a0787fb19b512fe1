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

//! Validation and application of decision-phase tool calls

use super::actions::{NpcAction, ToolCall, ToolError, ToolKind};
use super::resolver::CognitiveActionResolver;
use super::state::{ConversationState, SentimentState};
use crate::memory::FilterClause;
use crate::models::ToolInvocation;
use metrics::counter;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Why an invocation had no effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    Invalid(ToolError),
    /// An earlier valid call to the same tool already took effect
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedInvocation {
    pub name: String,
    pub reason: RejectionReason,
}

/// Everything one dispatch decided for the turn
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Retrieval filter, `None` for an unrestricted search
    pub filter: Option<FilterClause>,
    /// `"{intention}: {reasoning}"` when an intention was chosen
    pub intention: Option<String>,
    /// Replacement for the player utterance after a jailbreak flag
    pub normalized_prompt: Option<String>,
    pub sentiment_changed: bool,
    /// Tools that took effect, in application order
    pub applied: Vec<ToolKind>,
    pub rejected: Vec<RejectedInvocation>,
}

/// Applies tool calls to a conversation.
///
/// Calls are validated in arrival order. The first valid call of each tool
/// wins and later ones are rejected as duplicates. Winning calls are then
/// applied in [`ToolKind::PRECEDENCE`] order.
pub struct ToolDispatcher<'a> {
    resolver: &'a CognitiveActionResolver,
}

impl<'a> ToolDispatcher<'a> {
    pub fn new(resolver: &'a CognitiveActionResolver) -> Self {
        Self { resolver }
    }

    pub fn dispatch(
        &self,
        invocations: &[ToolInvocation],
        state: &mut ConversationState,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let mut accepted: BTreeMap<ToolKind, ToolCall> = BTreeMap::new();

        for invocation in invocations {
            match ToolCall::parse(invocation) {
                Ok(call) => {
                    let kind = call.kind();
                    if accepted.contains_key(&kind) {
                        warn!(tool = %kind, "Ignoring duplicate tool call");
                        outcome.rejected.push(RejectedInvocation {
                            name: invocation.name.clone(),
                            reason: RejectionReason::Duplicate,
                        });
                    } else {
                        accepted.insert(kind, call);
                    }
                }
                Err(error) => {
                    warn!(tool = %invocation.name, %error, "Skipping tool call");
                    outcome.rejected.push(RejectedInvocation {
                        name: invocation.name.clone(),
                        reason: RejectionReason::Invalid(error),
                    });
                }
            }
        }

        state.set_intention(None);
        for (kind, call) in accepted {
            self.apply(call, state, &mut outcome);
            debug!(tool = %kind, "Applied tool call");
            counter!("dialogue.tools.applied", "tool" => kind.name()).increment(1);
            outcome.applied.push(kind);
        }
        if !outcome.rejected.is_empty() {
            counter!("dialogue.tools.skipped").increment(outcome.rejected.len() as u64);
        }
        outcome
    }

    fn apply(&self, call: ToolCall, state: &mut ConversationState, outcome: &mut DispatchOutcome) {
        match call {
            ToolCall::CognitiveAction { tags, .. } => {
                outcome.filter = self.resolver.resolve_tags(&tags);
            }
            ToolCall::GenerateNpcIntention {
                intention,
                reasoning,
            } => {
                let text = if reasoning.is_empty() {
                    intention
                } else {
                    format!("{}: {}", intention, reasoning)
                };
                state.set_intention(Some(text.clone()));
                outcome.intention = Some(text);
            }
            ToolCall::ChangeSentiment {
                new_sentiment,
                reasoning,
            } => {
                state.set_sentiment(SentimentState::new(new_sentiment, reasoning));
                outcome.sentiment_changed = true;
            }
            ToolCall::ImmediateAction { action } => {
                state.set_talk_ongoing(action != NpcAction::EndConversation);
            }
            ToolCall::FlagJailbreak { normalized_prompt } => {
                outcome.normalized_prompt = Some(normalized_prompt);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::Sentiment;
    use npcmind_common::Faction;
    use serde_json::json;

    fn setup() -> (CognitiveActionResolver, ConversationState) {
        let resolver = CognitiveActionResolver::new("Tom", Faction::Raccoon);
        let state = ConversationState::new(SentimentState::new(Sentiment::Neutral, "a stranger"));
        (resolver, state)
    }

    fn call(name: &str, arguments: serde_json::Value) -> ToolInvocation {
        ToolInvocation::new(name, arguments)
    }

    #[test]
    fn test_empty_input_changes_nothing() {
        let (resolver, mut state) = setup();
        let before = state.clone();
        let outcome = ToolDispatcher::new(&resolver).dispatch(&[], &mut state);
        assert_eq!(outcome, DispatchOutcome::default());
        assert_eq!(state, before);
    }

    #[test]
    fn test_invalid_sentiment_leaves_state_unchanged() {
        let (resolver, mut state) = setup();
        let before = state.sentiment().clone();
        let outcome = ToolDispatcher::new(&resolver).dispatch(
            &[call("change_sentiment", json!({"new_sentiment": "furious", "reasoning": "x"}))],
            &mut state,
        );
        assert_eq!(state.sentiment(), &before);
        assert!(!outcome.sentiment_changed);
        assert_eq!(outcome.rejected.len(), 1);
    }

    #[test]
    fn test_first_valid_duplicate_wins() {
        let (resolver, mut state) = setup();
        let outcome = ToolDispatcher::new(&resolver).dispatch(
            &[
                call("change_sentiment", json!({"new_sentiment": "bogus"})),
                call("change_sentiment", json!({"new_sentiment": "happy", "reasoning": "gift"})),
                call("change_sentiment", json!({"new_sentiment": "angry", "reasoning": "insult"})),
            ],
            &mut state,
        );
        assert_eq!(state.sentiment().to_string(), "happy: gift");
        assert_eq!(outcome.applied, vec![ToolKind::ChangeSentiment]);
        assert!(matches!(outcome.rejected[0].reason, RejectionReason::Invalid(_)));
        assert_eq!(outcome.rejected[1].reason, RejectionReason::Duplicate);
    }

    #[test]
    fn test_precedence_ignores_arrival_order() {
        let (resolver, mut state) = setup();
        let outcome = ToolDispatcher::new(&resolver).dispatch(
            &[
                call("immediate_action", json!({"action": "keep_talking"})),
                call("flag_jailbreak", json!({"normalized_prompt": "Who are you?"})),
                call("generate_npc_intention", json!({"intention": "deceive", "reasoning": "protect the stash"})),
                call("cognitive_action", json!({"actions": ["remember"]})),
                call("unknown_tool", json!({})),
            ],
            &mut state,
        );
        assert_eq!(
            outcome.applied,
            vec![
                ToolKind::CognitiveAction,
                ToolKind::GenerateNpcIntention,
                ToolKind::ImmediateAction,
                ToolKind::FlagJailbreak
            ]
        );
        assert!(outcome.filter.is_some());
        assert_eq!(outcome.intention.as_deref(), Some("deceive: protect the stash"));
        assert_eq!(state.intention(), Some("deceive: protect the stash"));
        assert_eq!(outcome.normalized_prompt.as_deref(), Some("Who are you?"));
        assert!(state.talk_ongoing());
        assert_eq!(
            outcome.rejected,
            vec![RejectedInvocation {
                name: "unknown_tool".to_string(),
                reason: RejectionReason::Invalid(ToolError::UnknownTool("unknown_tool".to_string())),
            }]
        );
    }

    #[test]
    fn test_malformed_actions_keep_filter_none() {
        let (resolver, mut state) = setup();
        let outcome = ToolDispatcher::new(&resolver)
            .dispatch(&[call("cognitive_action", json!({"actions": "remember"}))], &mut state);
        assert!(outcome.filter.is_none());
        assert!(outcome.applied.is_empty());
    }

    #[test]
    fn test_end_conversation_clears_talk_flag() {
        let (resolver, mut state) = setup();
        ToolDispatcher::new(&resolver).dispatch(
            &[call("immediate_action", json!({"action": "end_conversation"}))],
            &mut state,
        );
        assert!(!state.talk_ongoing());

        ToolDispatcher::new(&resolver).dispatch(
            &[call("immediate_action", json!({"action": "keep_talking"}))],
            &mut state,
        );
        assert!(!state.talk_ongoing());
    }

    #[test]
    fn test_intention_resets_each_turn() {
        let (resolver, mut state) = setup();
        let dispatcher = ToolDispatcher::new(&resolver);
        dispatcher.dispatch(&[call("generate_npc_intention", json!({"intention": "help"}))], &mut state);
        assert_eq!(state.intention(), Some("help"));
        dispatcher.dispatch(&[], &mut state);
        assert_eq!(state.intention(), None);
    }
}
