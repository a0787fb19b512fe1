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

use super::backend::{InMemoryVectorStore, VectorStore};
use super::chunking::{ChunkWindow, chunk_id, chunk_words};
use super::{
    FilterClause, MemoryConfig, MemoryRecord, RecordMetadata, ScoredDocument, StoreResult,
};
use crate::models::Embedder;
use chrono::Utc;
use metrics::{counter, histogram};
use moka::future::Cache;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Embeds documents and queries and delegates storage to a [`VectorStore`].
///
/// Shared between sessions behind an `Arc`; all methods take `&self`.
pub struct MemoryStore {
    embedder: Arc<dyn Embedder>,
    backend: Arc<dyn VectorStore>,
    config: MemoryConfig,
    window: ChunkWindow,
    /// Cache for query embeddings
    embedding_cache: Cache<String, Arc<Vec<f32>>>,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("embedder", &self.embedder.model())
            .field("config", &self.config)
            .field("embedding_cache", &"Cache<String, Arc<Vec<f32>>>")
            .finish()
    }
}

impl MemoryStore {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        backend: Arc<dyn VectorStore>,
        config: MemoryConfig,
    ) -> StoreResult<Self> {
        let window = ChunkWindow::new(config.chunk_size, config.chunk_overlap)?;
        let embedding_cache = Cache::builder()
            .max_capacity(config.embedding_cache_capacity)
            .time_to_live(Duration::from_secs(config.embedding_cache_ttl_seconds))
            .build();

        info!(
            embedder = embedder.model(),
            embedding_cache_capacity = config.embedding_cache_capacity,
            chunk_size = config.chunk_size,
            chunk_overlap = config.chunk_overlap,
            "Memory store initialized"
        );

        Ok(Self {
            embedder,
            backend,
            config,
            window,
            embedding_cache,
        })
    }

    /// Store backed by process memory with default configuration
    pub fn in_memory(embedder: Arc<dyn Embedder>) -> Self {
        let config = MemoryConfig::default();
        let embedding_cache = Cache::builder()
            .max_capacity(config.embedding_cache_capacity)
            .time_to_live(Duration::from_secs(config.embedding_cache_ttl_seconds))
            .build();
        Self {
            embedder,
            backend: Arc::new(InMemoryVectorStore::new()),
            config,
            window: ChunkWindow::default(),
            embedding_cache,
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Embed a query, consulting the cache first
    async fn embed_query(&self, text: &str) -> StoreResult<Arc<Vec<f32>>> {
        if let Some(cached) = self.embedding_cache.get(text).await {
            counter!("memory.cache.hits", "type" => "embedding").increment(1);
            debug!("Embedding cache hit for query");
            return Ok(cached);
        }

        counter!("memory.cache.misses", "type" => "embedding").increment(1);
        let embedding = Arc::new(self.embedder.embed(text).await?);
        self.embedding_cache
            .insert(text.to_string(), embedding.clone())
            .await;
        Ok(embedding)
    }

    /// Embed and persist `text` under `id`.
    ///
    /// Blank text is ignored and reported as `false`. Re-adding an id
    /// replaces the earlier record.
    #[instrument(skip(self, text, metadata), fields(id = %id))]
    pub async fn add_record(
        &self,
        id: &str,
        text: &str,
        metadata: RecordMetadata,
    ) -> StoreResult<bool> {
        if text.trim().is_empty() {
            debug!("Skipping blank memory record");
            return Ok(false);
        }

        let embedding = self.embedder.embed(text).await?;
        self.backend
            .upsert(MemoryRecord {
                id: id.to_string(),
                document: text.to_string(),
                embedding,
                metadata,
                created_at: Utc::now(),
            })
            .await?;

        counter!("memory.records.added").increment(1);
        Ok(true)
    }

    /// Split `text` into overlapping word windows and store each one as
    /// `"{entity_id}-{category}-{index}"`. Returns the number of records written.
    pub async fn add_chunked(
        &self,
        entity_id: &str,
        text: &str,
        metadata: RecordMetadata,
    ) -> StoreResult<usize> {
        let mut written = 0;
        for (index, chunk) in chunk_words(text, self.window).into_iter().enumerate() {
            let id = chunk_id(entity_id, metadata.category, index);
            if self.add_record(&id, &chunk, metadata.clone()).await? {
                written += 1;
            }
        }
        Ok(written)
    }

    /// The `k` closest documents to `query_text` that satisfy `filter`.
    ///
    /// `None` searches every record. An empty result is not an error.
    #[instrument(skip(self, filter), fields(filter = ?filter.map(ToString::to_string)))]
    pub async fn query_top_k(
        &self,
        query_text: &str,
        filter: Option<&FilterClause>,
        k: usize,
    ) -> StoreResult<Vec<ScoredDocument>> {
        let start = std::time::Instant::now();
        let embedding = self.embed_query(query_text).await?;
        let results = self.backend.query(&embedding, k, filter).await?;

        let duration = start.elapsed().as_secs_f64();
        counter!("memory.queries").increment(1);
        histogram!("memory.query.duration").record(duration);
        debug!(
            count = results.len(),
            duration_ms = duration * 1000.0,
            "Memory query completed"
        );
        Ok(results)
    }

    /// [`query_top_k`](Self::query_top_k) with the configured default `k`
    pub async fn query(
        &self,
        query_text: &str,
        filter: Option<&FilterClause>,
    ) -> StoreResult<Vec<ScoredDocument>> {
        self.query_top_k(query_text, filter, self.config.default_top_k)
            .await
    }

    /// Run one top-1 query per filter and join the winners.
    pub async fn query_top1_per_group(
        &self,
        query_text: &str,
        filters: &[FilterClause],
    ) -> StoreResult<String> {
        let mut results = Vec::with_capacity(filters.len());
        for filter in filters {
            results.push(self.query_top_k(query_text, Some(filter), 1).await?);
        }
        Ok(concatenate_top1_per_group(&results))
    }

    pub async fn count(&self) -> StoreResult<usize> {
        self.backend.count().await
    }
}

/// Join documents with newlines, in order
pub fn concatenate(documents: &[ScoredDocument]) -> String {
    documents
        .iter()
        .map(|hit| hit.document.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Join the closest document of each independent query with newlines.
/// Queries without hits contribute nothing.
pub fn concatenate_top1_per_group(results: &[Vec<ScoredDocument>]) -> String {
    results
        .iter()
        .filter_map(|hits| hits.first())
        .map(|hit| hit.document.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
