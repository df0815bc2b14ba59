// Copyright 2026 StrataKV Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Pending-mutation batch
//!
//! Write operations stage their mutations here, then hand the batch to
//! the write worker for a single atomic apply. Entries are applied in
//! insertion order, so a later entry for the same key wins.

/// One staged put or delete
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub key: Vec<u8>,
    /// `None` deletes the key
    pub value: Option<Vec<u8>>,
    /// Mirrors the mixed record's flag byte for latest-namespace puts;
    /// zero for old-namespace payloads
    pub user_meta: u8,
}

/// Ordered set of staged mutations with per-batch atomicity
#[derive(Debug, Default)]
pub struct WriteBatch {
    entries: Vec<BatchEntry>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Stages a put carrying a user-meta byte
    pub fn set_with_meta(&mut self, key: Vec<u8>, value: Vec<u8>, user_meta: u8) {
        self.entries.push(BatchEntry {
            key,
            value: Some(value),
            user_meta,
        });
    }

    /// Stages a delete
    pub fn delete(&mut self, key: Vec<u8>) {
        self.entries.push(BatchEntry {
            key,
            value: None,
            user_meta: 0,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }
}
