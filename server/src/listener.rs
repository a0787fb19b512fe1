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

//! Websocket transport for NPC conversations

use crate::dialogue::{
    ConversationPhase, DialogueError, DialogueOrchestrator, DialogueSession, PersonaCatalog,
};
use axum::extract::State;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::response::{Json, Response};
use axum::routing::get;
use axum::Router;
use npcmind_common::protocol::{
    CLOSE_INTERNAL_ERROR, CLOSE_NORMAL, CLOSE_POLICY_VIOLATION, CLOSE_PROTOCOL_ERROR,
};
use npcmind_common::{ChatRequest, InitChatRequest, ServerEvent, StartData};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Shared state of the HTTP server
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<DialogueOrchestrator>,
    pub catalog: Arc<PersonaCatalog>,
    /// Used when the init frame carries no situation
    pub default_situation: String,
}

/// Events to send for one inbound frame, and whether to close afterwards
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReply {
    pub events: Vec<ServerEvent>,
    pub close: Option<u16>,
}

impl FrameReply {
    fn send(events: Vec<ServerEvent>) -> Self {
        Self {
            events,
            close: None,
        }
    }

    fn close(events: Vec<ServerEvent>, code: u16) -> Self {
        Self {
            events,
            close: Some(code),
        }
    }

    fn fail(message: impl Into<String>, code: u16) -> Self {
        Self::close(vec![ServerEvent::Error(message.into())], code)
    }
}

/// Protocol state of one websocket connection.
///
/// The first frame must be an [`InitChatRequest`]; every later frame is a
/// [`ChatRequest`]. Kept apart from the socket so it can be driven directly.
pub struct ChatConnection {
    state: AppState,
    session: Option<DialogueSession>,
}

impl ChatConnection {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            session: None,
        }
    }

    pub fn session(&self) -> Option<&DialogueSession> {
        self.session.as_ref()
    }

    /// Handle one text frame
    pub async fn handle_frame(&mut self, text: &str) -> FrameReply {
        match self.session.take() {
            None => self.handle_init(text).await,
            Some(session) => self.handle_chat(session, text).await,
        }
    }

    async fn handle_init(&mut self, text: &str) -> FrameReply {
        let request: InitChatRequest = match serde_json::from_str(text) {
            Ok(request) => request,
            Err(error) => {
                warn!(%error, "Malformed init frame");
                return FrameReply::fail(format!("Invalid init request: {}", error), CLOSE_PROTOCOL_ERROR);
            }
        };

        let Some(record) = self.state.catalog.find(&request.name) else {
            warn!(character = %request.name, "Unknown character requested");
            return FrameReply::fail(
                format!("Unknown character '{}'", request.name),
                CLOSE_POLICY_VIOLATION,
            );
        };

        let situation = request
            .situation
            .filter(|situation| !situation.trim().is_empty())
            .unwrap_or_else(|| self.state.default_situation.clone());

        let orchestrator = &self.state.orchestrator;
        let mut session = match orchestrator.start_session(record, &situation).await {
            Ok(session) => session,
            Err(error @ DialogueError::Persona(_)) => {
                warn!(%error, "Rejected persona");
                return FrameReply::fail(error.to_string(), CLOSE_POLICY_VIOLATION);
            }
            Err(error) => {
                error!(%error, "Failed to start session");
                return FrameReply::fail(error.to_string(), CLOSE_INTERNAL_ERROR);
            }
        };

        let start = ServerEvent::Start(StartData {
            npc: session.character().name().to_string(),
            session: session.id(),
        });
        match orchestrator.greet(&mut session).await {
            Ok(greeting) => {
                self.session = Some(session);
                FrameReply::send(vec![start, ServerEvent::Message(greeting.reply)])
            }
            Err(error) => {
                error!(%error, "Greeting failed");
                FrameReply::close(vec![start, ServerEvent::Error(error.to_string())], CLOSE_INTERNAL_ERROR)
            }
        }
    }

    async fn handle_chat(&mut self, mut session: DialogueSession, text: &str) -> FrameReply {
        let request: ChatRequest = match serde_json::from_str(text) {
            Ok(request) => request,
            Err(error) => {
                warn!(session_id = %session.id(), %error, "Malformed chat frame");
                return FrameReply::fail(format!("Invalid chat request: {}", error), CLOSE_PROTOCOL_ERROR);
            }
        };

        let orchestrator = &self.state.orchestrator;
        let mut events = Vec::new();
        if !request.prompt.trim().is_empty() {
            match orchestrator.process_turn(&mut session, &request.prompt).await {
                Ok(outcome) => events.push(ServerEvent::Message(outcome.reply)),
                Err(error) => {
                    error!(session_id = %session.id(), %error, "Turn failed");
                    return FrameReply::fail(error.to_string(), CLOSE_INTERNAL_ERROR);
                }
            }
        }

        let name = session.character().name().to_string();
        if session.phase() == ConversationPhase::Ended {
            events.push(ServerEvent::End(format!("{} ended the conversation", name)));
            return FrameReply::close(events, CLOSE_NORMAL);
        }
        if request.end {
            orchestrator.end_session(&mut session);
            events.push(ServerEvent::End(format!("Conversation with {} closed", name)));
            return FrameReply::close(events, CLOSE_NORMAL);
        }

        self.session = Some(session);
        FrameReply::send(events)
    }
}

/// Build the HTTP router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/talk-to-npc", get(talk_handler))
        .with_state(state)
}

/// Bind `addr` and serve until interrupted
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                error!(%error, "Failed to listen for shutdown signal");
            }
            info!("Shutting down");
        })
        .await
}

pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn talk_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let mut connection = ChatConnection::new(state);
    debug!("Websocket connected");

    while let Some(message) = socket.recv().await {
        let reply = match message {
            Ok(Message::Text(text)) => connection.handle_frame(text.as_str()).await,
            Ok(Message::Binary(_)) => {
                FrameReply::fail("Binary frames are not supported", CLOSE_PROTOCOL_ERROR)
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(error) => {
                warn!(%error, "Websocket receive failed");
                break;
            }
        };

        for event in &reply.events {
            if let Err(error) = socket.send(Message::Text(event.to_json().into())).await {
                warn!(%error, "Websocket send failed");
                return;
            }
        }
        if let Some(code) = reply.close {
            let frame = CloseFrame {
                code,
                reason: "".into(),
            };
            if let Err(error) = socket.send(Message::Close(Some(frame))).await {
                debug!(%error, "Close frame not delivered");
            }
            break;
        }
    }

    if let Some(session) = connection.session() {
        info!(session_id = %session.id(), "Websocket closed with session open");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_reports_ok() {
        let Json(body) = health().await;
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[test]
    fn test_frame_reply_helpers() {
        let reply = FrameReply::fail("bad", CLOSE_PROTOCOL_ERROR);
        assert_eq!(reply.events, vec![ServerEvent::Error("bad".to_string())]);
        assert_eq!(reply.close, Some(1002));
        assert_eq!(FrameReply::send(Vec::new()).close, None);
    }
}
