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

//! Overlapping word windows for long source fields

use super::{MetadataCategory, StoreError, StoreResult};

pub const DEFAULT_CHUNK_SIZE: usize = 100;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Window geometry. `overlap < size` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow {
    size: usize,
    overlap: usize,
}

impl ChunkWindow {
    pub fn new(size: usize, overlap: usize) -> StoreResult<Self> {
        if size == 0 || overlap >= size {
            return Err(StoreError::InvalidChunkWindow { size, overlap });
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Words between the starts of consecutive chunks
    pub fn step(&self) -> usize {
        self.size - self.overlap
    }
}

impl Default for ChunkWindow {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Split `text` into windows of whitespace-separated words.
///
/// Windows start every `step` words and stop at the first window that reaches
/// the end of the text, so a text of `L > overlap` words yields
/// `ceil((L - overlap) / step)` chunks. Text that fits in one window,
/// including text shorter than the overlap, is a single chunk. Blank text
/// yields nothing.
pub fn chunk_words(text: &str, window: ChunkWindow) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + window.size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += window.step();
    }
    chunks
}

/// Identifier of the `index`th chunk of an entity field
pub fn chunk_id(entity_id: &str, category: MetadataCategory, index: usize) -> String {
    format!("{}-{}-{}", entity_id, category, index)
}
