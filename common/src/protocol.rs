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

//! Chat websocket protocol
//!
//! A client opens a socket, sends one [`InitChatRequest`] and then any number
//! of [`ChatRequest`] frames. The server answers with [`ServerEvent`] frames
//! encoded as `{"event": "...", "data": ...}`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Websocket close code for a malformed payload
pub const CLOSE_PROTOCOL_ERROR: u16 = 1002;
/// Websocket close code for an unknown character
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
/// Websocket close code for a failed dialogue turn
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;
/// Websocket close code for a completed conversation
pub const CLOSE_NORMAL: u16 = 1000;

/// First frame of a conversation, selects the character to talk to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitChatRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub situation: Option<String>,
}

/// A player utterance. `end` asks the server to close the conversation
/// after this frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(default)]
    pub end: bool,
}

/// Payload of the `start` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartData {
    pub npc: String,
    pub session: Uuid,
}

/// Events emitted by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ServerEvent {
    Start(StartData),
    Message(String),
    Error(String),
    End(String),
}

impl ServerEvent {
    pub fn to_json(&self) -> String {
        // Serializing these plain enums into a String cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}
