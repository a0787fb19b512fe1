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

//! Postgres-backed vector store
//!
//! Embeddings live in a `REAL[]` column and metadata in `JSONB`. Filters are
//! pushed down as equality predicates on `metadata->>'field'`; distance
//! ranking happens in process over the filtered rows.

use super::backend::{VectorStore, rank};
use super::{FilterClause, MemoryRecord, ScoredDocument, StoreResult};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info, instrument};

pub struct PgVectorStore {
    pool: PgPool,
}

impl PgVectorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `url` and bring the schema up to date
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(max_connections, "Memory database connected and migrated");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Append a `WHERE` clause for `filter` to `builder`.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &FilterClause) {
    builder.push(" WHERE ");
    for (index, group) in filter.groups().iter().enumerate() {
        if index > 0 {
            builder.push(" OR ");
        }
        builder.push("(");
        if group.predicates().is_empty() {
            builder.push("TRUE");
        }
        for (position, predicate) in group.predicates().iter().enumerate() {
            if position > 0 {
                builder.push(" AND ");
            }
            builder
                .push("metadata->>'")
                .push(predicate.field.key())
                .push("' = ")
                .push_bind(predicate.value.clone());
        }
        builder.push(")");
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn upsert(&self, record: MemoryRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO npcmind.memory_record (id, document, embedding, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET document = EXCLUDED.document,
                embedding = EXCLUDED.embedding,
                metadata = EXCLUDED.metadata
            "#,
        )
        .bind(&record.id)
        .bind(&record.document)
        .bind(&record.embedding)
        .bind(Json(&record.metadata))
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, embedding, filter), fields(k = k))]
    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&FilterClause>,
    ) -> StoreResult<Vec<ScoredDocument>> {
        let mut builder =
            QueryBuilder::<Postgres>::new("SELECT id, document, embedding FROM npcmind.memory_record");
        if let Some(filter) = filter {
            push_filter(&mut builder, filter);
        }

        let rows: Vec<(String, String, Vec<f32>)> =
            builder.build_query_as().fetch_all(&self.pool).await?;
        debug!(candidates = rows.len(), "Filtered memory rows loaded");

        Ok(rank(
            embedding,
            k,
            rows.iter()
                .map(|(id, document, vector)| (id.as_str(), document.as_str(), vector.as_slice())),
        ))
    }

    async fn count(&self) -> StoreResult<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM npcmind.memory_record")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
