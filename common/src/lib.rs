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

//! NPC Mind Common Types and Protocols
//!
//! This crate defines the shared types used between the dialogue server and
//! its clients:
//! - Persona and faction lore records as they are authored in world data
//! - The chat websocket protocol (client requests and server events)

pub mod persona;
pub mod protocol;

pub use self::persona::{Faction, FactionLore, PersonaRecord, UnknownFaction, WorldData};
pub use self::protocol::{ChatRequest, InitChatRequest, ServerEvent, StartData};
