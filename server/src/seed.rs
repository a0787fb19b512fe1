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

//! Loads persona and lore text into the memory store

use crate::dialogue::PersonaCatalog;
use crate::memory::{MemoryStore, MetadataCategory, RecordMetadata, StoreResult};
use npcmind_common::{Faction, FactionLore, PersonaRecord};
use std::collections::HashMap;
use tracing::{info, instrument};

/// Counts of what a seeding run wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub characters: usize,
    pub lore_entries: usize,
    pub records: usize,
}

/// Store the knowledge, past, relations and sentiment of one character.
/// Returns the number of records written.
pub async fn seed_character(store: &MemoryStore, record: &PersonaRecord) -> StoreResult<usize> {
    let entity = record.entity_id();
    let fields = [
        (MetadataCategory::Knowledge, &record.knowledge),
        (MetadataCategory::Past, &record.past),
        (MetadataCategory::Relations, &record.relations),
        (MetadataCategory::Sentiment, &record.sentiment),
    ];

    let mut written = 0;
    for (category, text) in fields {
        let metadata = RecordMetadata::character(record.faction, record.name.trim(), category);
        written += store.add_chunked(&entity, text, metadata).await?;
    }
    Ok(written)
}

/// Store one lore entry. `ordinal` separates entries of the same faction.
pub async fn seed_lore(store: &MemoryStore, lore: &FactionLore, ordinal: usize) -> StoreResult<usize> {
    let entity = format!("{}-{}", lore.faction, ordinal);
    let metadata = RecordMetadata::faction(lore.faction, MetadataCategory::Lore);
    store.add_chunked(&entity, &lore.lore, metadata).await
}

/// Seed every character and lore entry of `catalog`
#[instrument(skip_all)]
pub async fn seed_world(store: &MemoryStore, catalog: &PersonaCatalog) -> StoreResult<SeedReport> {
    let mut report = SeedReport::default();

    for record in catalog.characters() {
        report.records += seed_character(store, record).await?;
        report.characters += 1;
    }

    let mut ordinals: HashMap<Faction, usize> = HashMap::new();
    for lore in catalog.lore() {
        let ordinal = ordinals.entry(lore.faction).or_default();
        report.records += seed_lore(store, lore, *ordinal).await?;
        *ordinal += 1;
        report.lore_entries += 1;
    }

    info!(
        characters = report.characters,
        lore_entries = report.lore_entries,
        records = report.records,
        "World data seeded"
    );
    Ok(report)
}
