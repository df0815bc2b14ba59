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

//! MVCC engine: snapshot reads
//!
//! Every write operation follows one skeleton: hash the keys, latch them
//! through the region context, open a read view, stage a write batch,
//! hand the batch to the write worker and await the ack, then release the
//! latches. Read-only operations skip the latches entirely; a lock that
//! blocks a read is returned to the caller as `KeyIsLocked` rather than
//! waited on.

use std::sync::Arc;

use crate::core::{extract_physical, Error, OpContext, Result, LOCK_VER};
use crate::mvcc::codec::{self, decode_mixed, encode_old_key, Lock, Op, ValueType};
use crate::region::{LatchGuard, RegionCtx};
use crate::storage::memstore::ReadView;
use crate::storage::{EngineConfig, MemStore, WriteBatch, WriteWorker};

/// A key with the value visible at the read timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Multi-version two-phase-commit engine over the backing store
pub struct MvccEngine {
    store: Arc<MemStore>,
    writer: WriteWorker,
    pub(super) config: EngineConfig,
}

impl Default for MvccEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MvccEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let store = Arc::new(MemStore::new());
        let writer = WriteWorker::spawn(store.clone());
        Self {
            store,
            writer,
            config,
        }
    }

    /// The backing store, exposed for inspection and direct views
    pub fn store(&self) -> &Arc<MemStore> {
        &self.store
    }

    /// Opens a read view of the backing store
    pub(super) fn view(&self) -> ReadView<'_> {
        self.store.view()
    }

    /// Hands a batch to the write worker and waits for it to apply.
    /// Callers must have dropped their read view first.
    pub(super) fn write(&self, batch: WriteBatch) -> Result<()> {
        self.writer.write(batch)
    }

    /// Latches the buckets of the given keys, honouring cancellation
    pub(super) fn latch_keys<'r, I>(
        &self,
        region: &'r RegionCtx,
        keys: I,
        ctx: &OpContext,
    ) -> Result<LatchGuard<'r>>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        region.acquire_latches(region.buckets_for(keys), ctx)
    }

    /// Snapshot point lookup at `start_ts`
    pub fn get(&self, region: &RegionCtx, key: &[u8], start_ts: u64) -> Result<Option<Vec<u8>>> {
        let view = self.view();
        Ok(read_key(&view, region, key, start_ts)?.map(|(_, value)| value))
    }

    /// Snapshot lookup of several keys in one view. Absent keys and empty
    /// values are skipped; a locked key yields a per-key error.
    pub fn batch_get(
        &self,
        region: &RegionCtx,
        keys: &[Vec<u8>],
        start_ts: u64,
    ) -> Vec<Result<KvPair>> {
        let view = self.view();
        let mut pairs = Vec::new();
        for key in keys {
            match read_key(&view, region, key, start_ts) {
                Ok(Some((_, value))) if !value.is_empty() => pairs.push(Ok(KvPair {
                    key: key.clone(),
                    value,
                })),
                Ok(_) => {}
                Err(e) => pairs.push(Err(e)),
            }
        }
        pairs
    }
}

/// Resolves the value of `key` visible at `start_ts`: the latest value if
/// committed early enough, otherwise the newest old version at or below
/// the read timestamp. Tombstones read as absent.
pub(super) fn read_key(
    view: &ReadView<'_>,
    region: &RegionCtx,
    key: &[u8],
    start_ts: u64,
) -> Result<Option<(u64, Vec<u8>)>> {
    let Some(entry) = view.get(key) else {
        return Ok(None);
    };
    let mixed = decode_mixed(&entry.value)?;
    if let Some(lock) = &mixed.lock {
        check_lock(region, lock, key, start_ts)?;
    }
    let Some(val) = &mixed.value else {
        return Ok(None);
    };
    if val.commit_ts <= start_ts {
        if val.value_type == ValueType::Delete {
            return Ok(None);
        }
        return Ok(Some((val.commit_ts, val.value.clone())));
    }
    match seek_old_version(view, key, start_ts)? {
        Some(old) if old.value_type == ValueType::Put => Ok(Some((old.commit_ts, old.value))),
        _ => Ok(None),
    }
}

/// Seeks the newest old version of `key` visible at `start_ts`. The
/// complemented suffix makes this a single forward seek, in reverse scans
/// too.
pub(super) fn seek_old_version(
    view: &ReadView<'_>,
    key: &[u8],
    start_ts: u64,
) -> Result<Option<codec::Value>> {
    let old_key = encode_old_key(key, start_ts);
    match view.seek(&old_key) {
        Some((found, entry)) if codec::is_old_version_of(found, key) => {
            Ok(Some(codec::decode_value(&entry.value)?))
        }
        _ => Ok(None),
    }
}

/// Lock-visibility rule for reads: a write lock of an older transaction
/// blocks the read unless it is the primary-probe sentinel. Trips over a
/// TTL-expired lock leave a hint in the transaction index so resolvers
/// can find it.
pub(super) fn check_lock(
    region: &RegionCtx,
    lock: &Lock,
    key: &[u8],
    start_ts: u64,
) -> Result<()> {
    let lock_visible = lock.start_ts < start_ts;
    let is_write_lock = matches!(lock.op, Op::Put | Op::Del);
    let is_primary_probe = lock.start_ts == LOCK_VER && lock.primary == key;
    if lock_visible && is_write_lock && !is_primary_probe {
        if extract_physical(lock.start_ts) + lock.ttl < extract_physical(start_ts) {
            region.add_txn_key(lock.start_ts, key);
        }
        return Err(Error::KeyIsLocked {
            key: key.to_vec(),
            start_ts: lock.start_ts,
            primary: lock.primary.clone(),
            ttl: lock.ttl,
        });
    }
    Ok(())
}

/// True once `key` passes the exclusive upper bound; an empty bound is
/// unbounded
pub(super) fn exceeds_end(key: &[u8], end_key: &[u8]) -> bool {
    !end_key.is_empty() && key >= end_key
}
