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

//! Range deletion and garbage collection
//!
//! GC runs two passes. The old-version pass drops superseded versions at
//! or below the safe point, always keeping a key's newest such version
//! while it is still the one a reader above the safe point would resolve
//! to. The second pass collects standalone rollback markers and tombstone
//! records, deleting optimistically: a record whose store version moved
//! since the scan is left alone.

use tracing::debug;

use crate::core::{OpContext, Result, LOCK_VER};
use crate::mvcc::codec::{
    decode_mixed, decode_value, encode_old_key, old_key_ts, ValueType, DEL_FLAG, LOCK_FLAG,
    OLD_KEY_SUFFIX_LEN, VALUE_FLAG,
};
use crate::mvcc::engine::{exceeds_end, MvccEngine};
use crate::region::RegionCtx;
use crate::storage::memstore::ReadView;
use crate::storage::WriteBatch;
use rustc_hash::FxHashSet;

impl MvccEngine {
    /// Deletes every record in `[start_key, end_key)` together with its
    /// old-version shadows, in bounded latched batches. One call collects
    /// at most one batch worth of keys; callers loop until the range
    /// reads empty.
    pub fn delete_range(
        &self,
        region: &RegionCtx,
        ctx: &OpContext,
        start_key: &[u8],
        end_key: &[u8],
    ) -> Result<()> {
        let cap = self.config.delete_range_batch_size;
        let mut keys = Vec::with_capacity(cap);
        {
            let view = self.view();
            collect_range_keys(&view, start_key, end_key, false, cap, &mut keys);
            // The shadow range interleaves with latest records of keys at
            // or past end_key; collect only old-version entries here.
            let old_start = encode_old_key(start_key, LOCK_VER);
            let old_end = old_namespace_end(end_key);
            collect_range_keys(&view, &old_start, &old_end, true, cap, &mut keys);
        }
        self.delete_keys_in_batches(region, ctx, &keys, cap)
    }

    /// Garbage-collects versions no longer visible to any reader above
    /// `safe_point`
    pub fn gc(&self, region: &RegionCtx, ctx: &OpContext, safe_point: u64) -> Result<()> {
        self.gc_old_versions(region, ctx, safe_point)?;
        self.gc_tombstones_and_rollbacks(region, ctx, safe_point)
    }

    fn gc_old_versions(&self, region: &RegionCtx, ctx: &OpContext, safe_point: u64) -> Result<()> {
        let mut gc_keys = Vec::new();
        {
            let view = self.view();
            let old_start = encode_old_key(region.start_key(), LOCK_VER);
            let old_end = old_namespace_end(region.end_key());
            let mut kept: FxHashSet<Vec<u8>> = FxHashSet::default();
            for (key, entry) in view.iter_from(&old_start) {
                if exceeds_end(key, &old_end) {
                    break;
                }
                if entry.user_meta & (LOCK_FLAG | VALUE_FLAG) != 0 {
                    // Latest-namespace record interleaved into the range.
                    continue;
                }
                let ts = old_key_ts(key)?;
                if ts > safe_point {
                    continue;
                }
                let user_key = &key[..key.len() - OLD_KEY_SUFFIX_LEN];
                if !kept.contains(user_key) {
                    kept.insert(user_key.to_vec());
                    // Newest version at or below the safe point: a reader
                    // just above the safe point may still resolve to it.
                    if must_keep_newest(&view, user_key, safe_point, &entry.value)? {
                        continue;
                    }
                }
                gc_keys.push(key.to_vec());
            }
        }
        debug!(keys = gc_keys.len(), safe_point, "gc old versions");
        self.delete_keys_in_batches(region, ctx, &gc_keys, self.config.gc_batch_size)
    }

    fn gc_tombstones_and_rollbacks(
        &self,
        region: &RegionCtx,
        ctx: &OpContext,
        safe_point: u64,
    ) -> Result<()> {
        let mut gc_keys = Vec::new();
        let mut gc_versions = Vec::new();
        {
            let view = self.view();
            for (key, entry) in view.iter_from(region.start_key()) {
                if exceeds_end(key, region.end_key()) {
                    break;
                }
                if entry.user_meta & (DEL_FLAG | LOCK_FLAG) == 0 {
                    continue;
                }
                let mixed = decode_mixed(&entry.value)?;
                if mixed.has_lock() && !mixed.has_value() {
                    if let Some(lock) = &mixed.lock {
                        if lock.op == crate::mvcc::codec::Op::Rollback
                            && lock.start_ts <= safe_point
                        {
                            gc_keys.push(key.to_vec());
                            gc_versions.push(entry.version);
                        }
                    }
                } else if mixed.is_delete() && !mixed.has_lock() {
                    if let Some(val) = &mixed.value {
                        if val.commit_ts <= safe_point {
                            gc_keys.push(key.to_vec());
                            gc_versions.push(entry.version);
                        }
                    }
                }
            }
        }
        debug!(keys = gc_keys.len(), safe_point, "gc tombstones and rollbacks");
        self.delete_versioned_in_batches(region, ctx, &gc_keys, &gc_versions)
    }

    /// Deletes keys in latched chunks; each chunk is one atomic batch
    fn delete_keys_in_batches(
        &self,
        region: &RegionCtx,
        ctx: &OpContext,
        keys: &[Vec<u8>],
        batch_size: usize,
    ) -> Result<()> {
        for chunk in keys.chunks(batch_size.max(1)) {
            let guard = self.latch_keys(region, chunk, ctx)?;
            let mut batch = WriteBatch::with_capacity(chunk.len());
            for key in chunk {
                batch.delete(key.clone());
            }
            self.write(batch)?;
            drop(guard);
        }
        Ok(())
    }

    /// Deletes keys only when their store version is unchanged since the
    /// collecting scan: concurrent writers win over GC.
    fn delete_versioned_in_batches(
        &self,
        region: &RegionCtx,
        ctx: &OpContext,
        keys: &[Vec<u8>],
        versions: &[u64],
    ) -> Result<()> {
        let batch_size = self.config.gc_batch_size.max(1);
        for (key_chunk, version_chunk) in keys.chunks(batch_size).zip(versions.chunks(batch_size)) {
            let guard = self.latch_keys(region, key_chunk, ctx)?;
            let mut batch = WriteBatch::with_capacity(key_chunk.len());
            {
                let view = self.view();
                for (key, &version) in key_chunk.iter().zip(version_chunk) {
                    match view.get(key) {
                        Some(entry) if entry.version == version => batch.delete(key.clone()),
                        _ => {}
                    }
                }
            }
            self.write(batch)?;
            drop(guard);
        }
        Ok(())
    }
}

/// Exclusive upper bound of the old-version shadow of `[_, end_key)`; an
/// unbounded region stays unbounded
fn old_namespace_end(end_key: &[u8]) -> Vec<u8> {
    if end_key.is_empty() {
        Vec::new()
    } else {
        encode_old_key(end_key, LOCK_VER)
    }
}

fn collect_range_keys(
    view: &ReadView<'_>,
    start_key: &[u8],
    end_key: &[u8],
    shadows_only: bool,
    cap: usize,
    keys: &mut Vec<Vec<u8>>,
) {
    for (key, entry) in view.iter_from(start_key) {
        if exceeds_end(key, end_key) {
            break;
        }
        if shadows_only && entry.user_meta & (LOCK_FLAG | VALUE_FLAG) != 0 {
            continue;
        }
        keys.push(key.to_vec());
        if keys.len() >= cap {
            break;
        }
    }
}

/// The newest old version at or below the safe point must survive while
/// the latest value is still above the safe point and the version itself
/// is a real put. Tombstones never need to survive: readers resolve to
/// "absent" either way. Old versions under a latest record without a
/// committed value are unreachable.
fn must_keep_newest(
    view: &ReadView<'_>,
    user_key: &[u8],
    safe_point: u64,
    old_payload: &[u8],
) -> Result<bool> {
    let old = decode_value(old_payload)?;
    if old.value_type == ValueType::Delete {
        return Ok(false);
    }
    let Some(entry) = view.get(user_key) else {
        return Ok(false);
    };
    let mixed = decode_mixed(&entry.value)?;
    match &mixed.value {
        Some(latest) => Ok(latest.commit_ts > safe_point),
        None => Ok(false),
    }
}
