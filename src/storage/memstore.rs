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

//! In-memory backing store
//!
//! Implements the backing-store contract the MVCC engine is written
//! against: a single ordered key space with point `get`, seek-style
//! iteration in both directions, a per-entry `user_meta` byte and
//! monotonically increasing `version`, atomic batch apply, and a read
//! view that is immutable for the duration of one operation.
//!
//! A [`ReadView`] holds a read guard on the whole map: writers (the
//! single write worker) block until in-flight readers finish, which gives
//! every operation a consistent snapshot without copying.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::core::Result;
use crate::storage::write_batch::WriteBatch;

/// One stored entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    pub value: Vec<u8>,
    /// Mirror of the record's flag byte (zero for old-version payloads)
    pub user_meta: u8,
    /// Batch sequence number assigned when the entry was written. Used by
    /// GC for optimistic concurrency: delete only if unchanged since scan.
    pub version: u64,
}

#[derive(Debug, Default)]
struct StoreInner {
    map: BTreeMap<Vec<u8>, StoreEntry>,
    next_version: u64,
}

/// Ordered in-memory store with snapshot read views
#[derive(Debug, Default)]
pub struct MemStore {
    inner: RwLock<StoreInner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a read view. The view pins the store contents until dropped;
    /// keep views scoped to one operation.
    pub fn view(&self) -> ReadView<'_> {
        ReadView {
            guard: self.inner.read(),
        }
    }

    /// Applies a batch atomically. Every entry written by the batch gets
    /// the same fresh version number.
    pub fn apply(&self, batch: &WriteBatch) -> Result<()> {
        let mut inner = self.inner.write();
        inner.next_version += 1;
        let version = inner.next_version;
        for entry in batch.entries() {
            match &entry.value {
                Some(value) => {
                    inner.map.insert(
                        entry.key.clone(),
                        StoreEntry {
                            value: value.clone(),
                            user_meta: entry.user_meta,
                            version,
                        },
                    );
                }
                None => {
                    inner.map.remove(&entry.key);
                }
            }
        }
        Ok(())
    }

    /// Number of live entries across both namespaces
    pub fn len(&self) -> usize {
        self.inner.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Immutable snapshot of the store for one operation
pub struct ReadView<'a> {
    guard: RwLockReadGuard<'a, StoreInner>,
}

impl ReadView<'_> {
    /// Point lookup
    pub fn get(&self, key: &[u8]) -> Option<&StoreEntry> {
        self.guard.map.get(key)
    }

    /// First entry with key >= `key`
    pub fn seek(&self, key: &[u8]) -> Option<(&[u8], &StoreEntry)> {
        self.guard
            .map
            .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
            .next()
            .map(|(k, e)| (k.as_slice(), e))
    }

    /// Forward iteration from `key` (inclusive)
    pub fn iter_from<'v>(
        &'v self,
        key: &[u8],
    ) -> impl Iterator<Item = (&'v [u8], &'v StoreEntry)> + 'v {
        self.guard
            .map
            .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
            .map(|(k, e)| (k.as_slice(), e))
    }

    /// Reverse iteration over `[start, end)`, largest key first
    pub fn iter_rev<'v>(
        &'v self,
        start: &[u8],
        end: &[u8],
    ) -> impl Iterator<Item = (&'v [u8], &'v StoreEntry)> + 'v {
        self.guard
            .map
            .range::<[u8], _>((Bound::Included(start), Bound::Excluded(end)))
            .rev()
            .map(|(k, e)| (k.as_slice(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(batch: &mut WriteBatch, key: &[u8], value: &[u8]) {
        batch.set_with_meta(key.to_vec(), value.to_vec(), 0);
    }

    fn store_with(pairs: &[(&[u8], &[u8])]) -> MemStore {
        let store = MemStore::new();
        let mut batch = WriteBatch::new();
        for (k, v) in pairs {
            put(&mut batch, k, v);
        }
        store.apply(&batch).unwrap();
        store
    }

    #[test]
    fn test_get_and_len() {
        let store = store_with(&[(b"a", b"1"), (b"b", b"2")]);
        let view = store.view();
        assert_eq!(view.get(b"a").unwrap().value, b"1");
        assert!(view.get(b"c").is_none());
        drop(view);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_seek_lands_on_first_at_or_after() {
        let store = store_with(&[(b"b", b"2"), (b"d", b"4")]);
        let view = store.view();
        assert_eq!(view.seek(b"a").unwrap().0, b"b");
        assert_eq!(view.seek(b"b").unwrap().0, b"b");
        assert_eq!(view.seek(b"c").unwrap().0, b"d");
        assert!(view.seek(b"e").is_none());
    }

    #[test]
    fn test_iter_rev_is_half_open_descending() {
        let store = store_with(&[(b"a", b"1"), (b"b", b"2"), (b"c", b"3")]);
        let view = store.view();
        let keys: Vec<_> = view.iter_rev(b"a", b"c").map(|(k, _)| k.to_vec()).collect();
        assert_eq!(keys, vec![b"b".to_vec(), b"a".to_vec()]);
    }

    #[test]
    fn test_batch_atomic_last_write_wins() {
        let store = MemStore::new();
        let mut batch = WriteBatch::new();
        put(&mut batch, b"k", b"old");
        put(&mut batch, b"k", b"new");
        batch.delete(b"gone".to_vec());
        store.apply(&batch).unwrap();
        let view = store.view();
        assert_eq!(view.get(b"k").unwrap().value, b"new");
        assert!(view.get(b"gone").is_none());
    }

    #[test]
    fn test_versions_increase_per_batch() {
        let store = MemStore::new();
        let mut b1 = WriteBatch::new();
        put(&mut b1, b"a", b"1");
        put(&mut b1, b"b", b"1");
        store.apply(&b1).unwrap();
        let mut b2 = WriteBatch::new();
        put(&mut b2, b"b", b"2");
        store.apply(&b2).unwrap();

        let view = store.view();
        let va = view.get(b"a").unwrap().version;
        let vb = view.get(b"b").unwrap().version;
        assert!(vb > va, "rewritten entry must carry a newer version");
    }
}
