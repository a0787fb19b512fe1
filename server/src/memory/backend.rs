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

//! Vector store backends

use super::{FilterClause, MemoryRecord, ScoredDocument, StoreResult, cosine_distance};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Storage and nearest-neighbour lookup for embedded records
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert a record, replacing any record with the same id
    async fn upsert(&self, record: MemoryRecord) -> StoreResult<()>;

    /// Up to `k` documents matching `filter`, closest first
    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&FilterClause>,
    ) -> StoreResult<Vec<ScoredDocument>>;

    /// Number of stored records
    async fn count(&self) -> StoreResult<usize>;
}

/// Rank candidates by distance, ties broken by id, and keep the first `k`.
pub(crate) fn rank<'a>(
    embedding: &[f32],
    k: usize,
    candidates: impl IntoIterator<Item = (&'a str, &'a str, &'a [f32])>,
) -> Vec<ScoredDocument> {
    let mut scored: Vec<ScoredDocument> = candidates
        .into_iter()
        .map(|(id, document, vector)| ScoredDocument {
            id: id.to_string(),
            document: document.to_string(),
            distance: cosine_distance(embedding, vector),
        })
        .collect();
    scored.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    scored.truncate(k);
    scored
}

/// Process-local store, used without a database and in tests
#[derive(Default)]
pub struct InMemoryVectorStore {
    records: RwLock<BTreeMap<String, MemoryRecord>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of a stored record
    pub async fn get(&self, id: &str) -> Option<MemoryRecord> {
        self.records.read().await.get(id).cloned()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, record: MemoryRecord) -> StoreResult<()> {
        self.records.write().await.insert(record.id.clone(), record);
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&FilterClause>,
    ) -> StoreResult<Vec<ScoredDocument>> {
        let records = self.records.read().await;
        let candidates = records
            .values()
            .filter(|record| filter.is_none_or(|clause| clause.matches(&record.metadata)))
            .map(|record| {
                (
                    record.id.as_str(),
                    record.document.as_str(),
                    record.embedding.as_slice(),
                )
            });
        Ok(rank(embedding, k, candidates))
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.records.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MetadataCategory, MetadataField, RecordMetadata};
    use chrono::Utc;
    use npcmind_common::Faction;

    fn record(id: &str, embedding: Vec<f32>, category: MetadataCategory) -> MemoryRecord {
        MemoryRecord {
            id: id.to_string(),
            document: format!("doc {}", id),
            embedding,
            metadata: RecordMetadata::character(Faction::Raccoon, "Tom", category),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_distance() {
        let store = InMemoryVectorStore::new();
        store.upsert(record("far", vec![0.0, 1.0], MetadataCategory::Past)).await.unwrap();
        store.upsert(record("near", vec![1.0, 0.1], MetadataCategory::Past)).await.unwrap();

        let hits = store.query(&[1.0, 0.0], 5, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "near");
        assert!(hits[0].distance < hits[1].distance);
    }

    #[tokio::test]
    async fn test_query_respects_filter_and_k() {
        let store = InMemoryVectorStore::new();
        store.upsert(record("a", vec![1.0, 0.0], MetadataCategory::Past)).await.unwrap();
        store.upsert(record("b", vec![1.0, 0.0], MetadataCategory::Relations)).await.unwrap();
        store.upsert(record("c", vec![0.9, 0.1], MetadataCategory::Past)).await.unwrap();

        let filter = FilterClause::all([(MetadataField::Category, "past")]);
        let hits = store.query(&[1.0, 0.0], 1, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");

        let none = FilterClause::all([(MetadataField::Category, "lore")]);
        assert!(store.query(&[1.0, 0.0], 5, Some(&none)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = InMemoryVectorStore::new();
        store.upsert(record("a", vec![1.0, 0.0], MetadataCategory::Past)).await.unwrap();
        let mut replacement = record("a", vec![0.0, 1.0], MetadataCategory::Past);
        replacement.document = "rewritten".to_string();
        store.upsert(replacement).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.get("a").await.unwrap().document, "rewritten");
    }
}
