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

//! Performance benchmarks for the dialogue hot path
//!
//! Run with: cargo bench --bench dialogue_benchmarks

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use npcmind_common::Faction;
use npcmind_server::dialogue::prompt::{PromptInput, compose};
use npcmind_server::dialogue::{CognitiveAction, CognitiveActionResolver};
use npcmind_server::memory::{
    ChunkWindow, MemoryStore, MetadataCategory, RecordMetadata, chunk_words,
};
use npcmind_server::models::{Embedder, EmbeddingResult};
use std::hint::black_box;
use std::sync::Arc;

/// Hashes words into a small fixed vector
struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        let mut vector = vec![0.01; 32];
        for word in text.split_whitespace() {
            let bucket = word.bytes().fold(0usize, |hash, byte| hash.wrapping_mul(31).wrapping_add(byte as usize));
            vector[bucket % 32] += 1.0;
        }
        Ok(vector)
    }

    fn model(&self) -> &str {
        "hash"
    }
}

fn text(words: usize) -> String {
    (0..words)
        .map(|i| format!("word{}", i % 97))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Benchmark word-window chunking
fn bench_chunk_words(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_words");
    for size in [100, 1_000, 10_000].iter() {
        let input = text(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| chunk_words(black_box(input), ChunkWindow::default()));
        });
    }
    group.finish();
}

/// Benchmark resolving every cognitive action into a filter and evaluating it
fn bench_resolve_and_match(c: &mut Criterion) {
    let resolver = CognitiveActionResolver::new("Tom", Faction::Raccoon);
    let metadata = RecordMetadata::faction(Faction::World, MetadataCategory::Lore);

    c.bench_function("resolve_all_actions", |b| {
        b.iter(|| resolver.resolve(black_box(&CognitiveAction::ALL)));
    });

    let filter = resolver.resolve(&CognitiveAction::ALL);
    c.bench_function("filter_matches", |b| {
        b.iter(|| {
            filter
                .as_ref()
                .map(|filter| filter.matches(black_box(&metadata)))
        });
    });
}

/// Benchmark prompt assembly
fn bench_compose(c: &mut Criterion) {
    let context = text(300);
    let input = PromptInput {
        name: "Tom",
        persona_sheet: "[{{char}}: raccoon, smuggler, sly, curious]",
        example_dialogue: "{{user}}: Hello.\n{{char}}: Well well, a new face.",
        situation: "{{user}} meets {{char}} in a tavern in the village of Rack.",
        sentiment: "skeptical: strangers rarely bring good news",
        context: &context,
        intention: Some("deceive"),
        utterance: "What do you know about the tunnels?",
    };

    c.bench_function("compose_prompt", |b| {
        b.iter(|| compose(black_box(&input)));
    });
}

/// Benchmark filtered retrieval over the in-process store
fn bench_query(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = MemoryStore::in_memory(Arc::new(HashEmbedder));
    rt.block_on(async {
        for index in 0..500 {
            let metadata = if index % 2 == 0 {
                RecordMetadata::character(Faction::Raccoon, "Tom", MetadataCategory::Past)
            } else {
                RecordMetadata::faction(Faction::World, MetadataCategory::Lore)
            };
            store
                .add_record(&format!("record-{}", index), &text(40 + index % 60), metadata)
                .await
                .unwrap();
        }
    });
    let resolver = CognitiveActionResolver::new("Tom", Faction::Raccoon);
    let filter = resolver.resolve(&[CognitiveAction::Remember, CognitiveAction::Research]);

    c.bench_function("query_top_k_500", |b| {
        b.to_async(&rt).iter(|| async {
            store
                .query_top_k(black_box("word3 word7 word11"), filter.as_ref(), 5)
                .await
                .unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_chunk_words,
    bench_resolve_and_match,
    bench_compose,
    bench_query,
);
criterion_main!(benches);
