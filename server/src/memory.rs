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

//! # Memory Store
//!
//! Semantic memory for characters and factions. Every record is a short
//! document with an embedding and a small set of metadata fields:
//!
//! - **faction**: the faction the record belongs to, `world` for shared lore
//! - **name**: the character the record is about, absent for faction lore
//! - **type**: `faction` or `character`
//! - **category**: `knowledge`, `past`, `sentiment`, `memory`, `relations` or `lore`
//!
//! Retrieval embeds the query text and ranks the records that satisfy a
//! [`FilterClause`] by cosine distance. Records are written once and only
//! replaced by an upsert on the same id.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use npcmind_server::memory::{FilterClause, MemoryStore, MetadataField};
//!
//! let store = MemoryStore::in_memory(embedder);
//! store.add_record("raccoon-tom-past-0", "Tom grew up in the harbour.", metadata).await?;
//!
//! let filter = FilterClause::all([(MetadataField::Name, "Tom")]);
//! let hits = store.query_top_k("Where are you from?", Some(&filter), 5).await?;
//! ```

mod backend;
mod chunking;
mod filter;
mod postgres;
mod store;

pub use self::backend::{InMemoryVectorStore, VectorStore};
pub use self::chunking::{
    ChunkWindow, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, chunk_id, chunk_words,
};
pub use self::filter::{Conjunction, FilterClause, MetadataField, Predicate};
pub use self::postgres::PgVectorStore;
pub use self::store::{MemoryStore, concatenate, concatenate_top1_per_group};

use crate::models::EmbeddingError;
use chrono::{DateTime, Utc};
use npcmind_common::Faction;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during memory operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to embed a document or query.
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Chunk overlap must be smaller than the chunk size.
    #[error("Invalid chunk window: size {size}, overlap {overlap}")]
    InvalidChunkWindow { size: usize, overlap: usize },
}

/// Result type for memory operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Whether a record describes a faction or a single character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataType {
    Faction,
    Character,
}

impl MetadataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataType::Faction => "faction",
            MetadataType::Character => "character",
        }
    }
}

/// Kind of information a record holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataCategory {
    Knowledge,
    Past,
    Sentiment,
    Memory,
    Relations,
    Lore,
}

impl MetadataCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataCategory::Knowledge => "knowledge",
            MetadataCategory::Past => "past",
            MetadataCategory::Sentiment => "sentiment",
            MetadataCategory::Memory => "memory",
            MetadataCategory::Relations => "relations",
            MetadataCategory::Lore => "lore",
        }
    }
}

impl fmt::Display for MetadataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata attached to every record, stored as a flat JSON object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faction: Option<Faction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: MetadataType,
    pub category: MetadataCategory,
}

impl RecordMetadata {
    /// Metadata for a record about a single character
    pub fn character(
        faction: Faction,
        name: impl Into<String>,
        category: MetadataCategory,
    ) -> Self {
        Self {
            faction: Some(faction),
            name: Some(name.into()),
            kind: MetadataType::Character,
            category,
        }
    }

    /// Metadata for a record shared by a whole faction
    pub fn faction(faction: Faction, category: MetadataCategory) -> Self {
        Self {
            faction: Some(faction),
            name: None,
            kind: MetadataType::Faction,
            category,
        }
    }

    /// Value of a metadata field as it is compared by filters
    pub fn value_of(&self, field: MetadataField) -> Option<&str> {
        match field {
            MetadataField::Faction => self.faction.as_ref().map(Faction::as_str),
            MetadataField::Name => self.name.as_deref(),
            MetadataField::Type => Some(self.kind.as_str()),
            MetadataField::Category => Some(self.category.as_str()),
        }
    }
}

/// A stored document with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub document: String,
    pub embedding: Vec<f32>,
    pub metadata: RecordMetadata,
    pub created_at: DateTime<Utc>,
}

/// A query hit. Lower distance means closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub id: String,
    pub document: String,
    pub distance: f32,
}

/// Tuning for the memory store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Results returned when the caller does not ask for a count
    pub default_top_k: usize,
    /// Words per chunk when splitting long fields
    pub chunk_size: usize,
    /// Words shared by consecutive chunks
    pub chunk_overlap: usize,
    /// Maximum number of cached query embeddings
    pub embedding_cache_capacity: u64,
    /// Time-to-live for cached query embeddings
    pub embedding_cache_ttl_seconds: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            embedding_cache_capacity: 1_000,
            embedding_cache_ttl_seconds: 600,
        }
    }
}

/// Calculate cosine similarity between two vectors.
///
/// Returns a value between -1.0 and 1.0, where 1.0 means identical direction.
/// Vectors of different length or zero magnitude score 0.0.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

/// Cosine distance used for ranking, in `[0.0, 2.0]`
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_metadata_serializes_flat() {
        let metadata = RecordMetadata::character(Faction::Raccoon, "Tom", MetadataCategory::Past);
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "faction": "raccoon",
                "name": "Tom",
                "type": "character",
                "category": "past",
            })
        );

        let lore = RecordMetadata::faction(Faction::World, MetadataCategory::Lore);
        let value = serde_json::to_value(&lore).unwrap();
        assert!(value.get("name").is_none());
        assert_eq!(lore.value_of(MetadataField::Faction), Some("world"));
        assert_eq!(lore.value_of(MetadataField::Name), None);
    }
}
