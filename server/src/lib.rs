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

//! NPC Mind Dialogue Server
//!
//! Persona-grounded, retrieval-augmented conversations with non-player
//! characters:
//! - [`memory`]: embedded records with metadata filters and chunked seeding
//! - [`models`]: chat completion and embedding providers
//! - [`dialogue`]: tool dispatch, conversation state, prompts and turns
//! - [`listener`]: the websocket API

pub mod config;
pub mod dialogue;
pub mod listener;
pub mod memory;
pub mod models;
pub mod seed;
