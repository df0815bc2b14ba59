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

//! Two-phase-commit operations
//!
//! Prewrite stages a lock per key, Commit promotes locks into committed
//! values (moving the superseded latest value into old-version space),
//! and Rollback leaves markers that fence off late-arriving prewrites.
//! Commit is idempotent under retry; Rollback after a successful commit
//! fails `AlreadyCommitted` without mutating anything.

use std::sync::atomic::{AtomicI64, Ordering};

use tracing::debug;

use crate::core::{extract_physical, Error, OpContext, Result};
use crate::mvcc::codec::{
    decode_mixed, decode_value, encode_old_key, encode_value, is_old_version_of, is_visible_key,
    Lock, MixedRecord, Op, Value, ValueType, LOCK_FLAG,
};
use crate::mvcc::engine::MvccEngine;
use crate::region::RegionCtx;
use crate::storage::memstore::ReadView;
use crate::storage::WriteBatch;

/// One key mutation inside a Prewrite request. `Insert` is accepted on
/// the wire and behaves as `Put`.
#[derive(Debug, Clone)]
pub struct Mutation {
    pub op: Op,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Mutation {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            op: Op::Put,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        Self {
            op: Op::Del,
            key: key.into(),
            value: Vec::new(),
        }
    }
}

/// A live lock reported by ScanLock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    pub primary: Vec<u8>,
    pub lock_ts: u64,
    pub key: Vec<u8>,
    pub ttl: u64,
}

impl MvccEngine {
    /// Stages a lock for every mutation under `start_ts`. Returns one
    /// error slot per mutation; if any slot is `Some`, nothing was
    /// persisted and no keys entered the transaction index.
    pub fn prewrite(
        &self,
        region: &RegionCtx,
        ctx: &OpContext,
        mutations: &[Mutation],
        primary: &[u8],
        start_ts: u64,
        ttl_ms: u64,
    ) -> Result<Vec<Option<Error>>> {
        if mutations.is_empty() {
            return Ok(Vec::new());
        }
        let guard = self.latch_keys(region, mutations.iter().map(|m| &m.key), ctx)?;
        let mut batch = WriteBatch::with_capacity(mutations.len());
        let mut errors = Vec::with_capacity(mutations.len());
        let mut any_error = false;
        {
            let view = self.view();
            for mutation in mutations {
                match prewrite_mutation(&view, &mut batch, region, mutation, primary, start_ts, ttl_ms)
                {
                    Ok(()) => errors.push(None),
                    Err(e) if e.is_recoverable() => {
                        any_error = true;
                        errors.push(Some(e));
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        if any_error {
            return Ok(errors);
        }
        region.add_txn_keys(start_ts, mutations.iter().map(|m| m.key.clone()));
        self.write(batch)?;
        drop(guard);
        Ok(errors)
    }

    /// Promotes the locks of `start_ts` on the given keys into values
    /// committed at `commit_ts`. The staged size delta is accumulated
    /// into `diff`.
    pub fn commit(
        &self,
        region: &RegionCtx,
        ctx: &OpContext,
        keys: &[Vec<u8>],
        start_ts: u64,
        commit_ts: u64,
        diff: &AtomicI64,
    ) -> Result<()> {
        let _guard = self.latch_keys(region, keys, ctx)?;
        let mut batch = WriteBatch::with_capacity(keys.len());
        let mut delta = 0i64;
        {
            let view = self.view();
            for key in keys {
                commit_key(&view, &mut batch, key, start_ts, commit_ts, &mut delta)?;
            }
        }
        diff.fetch_add(delta, Ordering::Relaxed);
        region.remove_txn_keys(start_ts);
        self.write(batch)
    }

    /// Rolls back `start_ts` on the given keys, leaving markers against
    /// late prewrites
    pub fn rollback(
        &self,
        region: &RegionCtx,
        ctx: &OpContext,
        keys: &[Vec<u8>],
        start_ts: u64,
    ) -> Result<()> {
        let _guard = self.latch_keys(region, keys, ctx)?;
        let mut batch = WriteBatch::with_capacity(keys.len());
        {
            let view = self.view();
            for key in keys {
                rollback_key(&view, &mut batch, key, start_ts)?;
            }
        }
        region.remove_txn_keys(start_ts);
        self.write(batch)
    }

    /// Single-key rollback used to clear an abandoned lock. Unlike
    /// `rollback` it drops only this key from the transaction index.
    pub fn cleanup(
        &self,
        region: &RegionCtx,
        ctx: &OpContext,
        key: &[u8],
        start_ts: u64,
    ) -> Result<()> {
        let _guard = self.latch_keys(region, [key], ctx)?;
        let mut batch = WriteBatch::new();
        {
            let view = self.view();
            rollback_key(&view, &mut batch, key, start_ts)?;
        }
        region.remove_txn_key(start_ts, key);
        self.write(batch)
    }

    /// Reports live write locks of transactions older than `max_ts`,
    /// re-reading the store so stale index hints are skipped
    pub fn scan_lock(&self, region: &RegionCtx, max_ts: u64) -> Result<Vec<LockInfo>> {
        let candidates = region.all_txn_keys(max_ts);
        let view = self.view();
        let mut locks = Vec::new();
        for key in candidates {
            let Some(entry) = view.get(&key) else {
                continue;
            };
            let mixed = decode_mixed(&entry.value)?;
            let Some(lock) = &mixed.lock else {
                continue;
            };
            if lock.op == Op::Rollback {
                continue;
            }
            if lock.start_ts < max_ts {
                locks.push(LockInfo {
                    primary: lock.primary.clone(),
                    lock_ts: lock.start_ts,
                    key,
                    ttl: lock.ttl,
                });
            }
        }
        Ok(locks)
    }

    /// Resolves every indexed key of `start_ts` in one batch: commits
    /// them when `commit_ts > 0`, rolls them back otherwise. Keys whose
    /// lock vanished or was replaced are skipped.
    pub fn resolve_lock(
        &self,
        region: &RegionCtx,
        ctx: &OpContext,
        start_ts: u64,
        commit_ts: u64,
        diff: &AtomicI64,
    ) -> Result<()> {
        let lock_keys = region.txn_keys(start_ts);
        if lock_keys.is_empty() {
            debug!(start_ts, commit_ts, "no lock keys to resolve");
            return Ok(());
        }
        let _guard = self.latch_keys(region, &lock_keys, ctx)?;
        let mut batch = WriteBatch::with_capacity(lock_keys.len());
        let mut delta = 0i64;
        {
            let view = self.view();
            for key in &lock_keys {
                let Some(entry) = view.get(key) else {
                    continue;
                };
                let mixed = decode_mixed(&entry.value)?;
                let Some(lock) = &mixed.lock else {
                    continue;
                };
                if lock.start_ts != start_ts {
                    continue;
                }
                if commit_ts > 0 {
                    commit_key(&view, &mut batch, key, start_ts, commit_ts, &mut delta)?;
                } else {
                    rollback_key(&view, &mut batch, key, start_ts)?;
                }
            }
        }
        if batch.is_empty() {
            return Ok(());
        }
        diff.fetch_add(delta, Ordering::Relaxed);
        region.remove_txn_keys(start_ts);
        self.write(batch)
    }
}

fn prewrite_mutation(
    view: &ReadView<'_>,
    batch: &mut WriteBatch,
    region: &RegionCtx,
    mutation: &Mutation,
    primary: &[u8],
    start_ts: u64,
    ttl_ms: u64,
) -> Result<()> {
    let mut mixed = match view.get(&mutation.key) {
        Some(entry) => decode_mixed(&entry.value)?,
        None => MixedRecord::default(),
    };
    if let Some(lock) = &mixed.lock {
        if lock.op != Op::Rollback {
            if lock.start_ts != start_ts {
                if extract_physical(lock.start_ts) + lock.ttl < extract_physical(start_ts) {
                    region.add_txn_key(lock.start_ts, &mutation.key);
                }
                return Err(Error::KeyIsLocked {
                    key: mutation.key.clone(),
                    start_ts: lock.start_ts,
                    primary: lock.primary.clone(),
                    ttl: lock.ttl,
                });
            }
            // Same transaction retrying: the lock is already in place.
            return Ok(());
        }
        if lock.start_ts >= start_ts {
            return Err(Error::aborted("already rolled back"));
        }
        // An older rollback marker is superseded by this newer transaction.
    }
    if let Some(val) = &mixed.value {
        if val.commit_ts > start_ts {
            return Err(Error::WriteConflict {
                start_ts,
                conflict_commit_ts: val.commit_ts,
            });
        }
    }
    let op = if mutation.op == Op::Insert {
        Op::Put
    } else {
        mutation.op
    };
    mixed.set_lock(Lock {
        start_ts,
        primary: primary.to_vec(),
        value: mutation.value.clone(),
        op,
        ttl: ttl_ms,
        rollback_ts: 0,
    });
    batch.set_with_meta(mutation.key.clone(), mixed.encode(), mixed.flags);
    Ok(())
}

pub(super) fn commit_key(
    view: &ReadView<'_>,
    batch: &mut WriteBatch,
    key: &[u8],
    start_ts: u64,
    commit_ts: u64,
    delta: &mut i64,
) -> Result<()> {
    let Some(entry) = view.get(key) else {
        return Err(Error::LockNotFound);
    };
    let mut mixed = decode_mixed(&entry.value)?;
    let Some(lock) = mixed.lock.take() else {
        if let Some(val) = &mixed.value {
            if val.start_ts == start_ts {
                // Already committed in place.
                return Ok(());
            }
        }
        // A retried commit may find its write already promoted to
        // old-version space.
        if view.get(&encode_old_key(key, commit_ts)).is_some() {
            return Ok(());
        }
        return Err(Error::LockNotFound);
    };
    if lock.start_ts != start_ts {
        return Err(Error::Replaced);
    }
    if lock.op == Op::Rollback {
        return Err(Error::aborted("already rolled back"));
    }

    mixed.flags &= !LOCK_FLAG;
    let rollback_ts = lock.rollback_ts;
    let count_diff = lock.op != Op::Lock;
    if lock.op != Op::Lock {
        // Promote the superseded latest value into old-version space.
        if let Some(prev) = &mixed.value {
            batch.set_with_meta(encode_old_key(key, prev.commit_ts), encode_value(prev), 0);
        }
        let value_type = if lock.op == Op::Del {
            ValueType::Delete
        } else {
            ValueType::Put
        };
        mixed.set_value(Value {
            value_type,
            start_ts,
            commit_ts,
            value: lock.value,
        });
    }
    if rollback_ts != 0 {
        // A newer rollback piggy-backed on this lock; keep its marker.
        mixed.set_lock(Lock::rollback_marker(rollback_ts));
    }
    if mixed.is_empty() {
        batch.delete(key.to_vec());
    } else {
        let encoded = mixed.encode();
        if count_diff {
            *delta += (key.len() + encoded.len()) as i64;
        }
        batch.set_with_meta(key.to_vec(), encoded, mixed.flags);
    }
    Ok(())
}

pub(super) fn rollback_key(
    view: &ReadView<'_>,
    batch: &mut WriteBatch,
    key: &[u8],
    start_ts: u64,
) -> Result<()> {
    let Some(entry) = view.get(key) else {
        // The prewrite has not arrived; fence it off.
        let mut mixed = MixedRecord::default();
        mixed.set_lock(Lock::rollback_marker(start_ts));
        batch.set_with_meta(key.to_vec(), mixed.encode(), mixed.flags);
        return Ok(());
    };
    let mut mixed = decode_mixed(&entry.value)?;
    let mut newer_lock = false;
    if let Some(lock) = mixed.lock.as_mut() {
        if lock.start_ts < start_ts {
            if lock.rollback_ts >= start_ts {
                return Ok(());
            }
            // The lock belongs to an older transaction; piggy-back the
            // rollback so its commit preserves the marker.
            lock.rollback_ts = start_ts;
            batch.set_with_meta(key.to_vec(), mixed.encode(), mixed.flags);
            return Ok(());
        }
        if lock.start_ts == start_ts {
            if lock.op == Op::Rollback {
                return Ok(());
            }
            // Prewrite may be retried; replace rather than delete.
            *lock = Lock::rollback_marker(start_ts);
            batch.set_with_meta(key.to_vec(), mixed.encode(), mixed.flags);
            return Ok(());
        }
        newer_lock = true;
    }
    let Some(val) = &mixed.value else {
        if !newer_lock {
            mixed.set_lock(Lock::rollback_marker(start_ts));
            batch.set_with_meta(key.to_vec(), mixed.encode(), mixed.flags);
        }
        return Ok(());
    };
    if val.start_ts == start_ts {
        return Err(Error::AlreadyCommitted(val.commit_ts));
    }
    if val.start_ts < start_ts {
        // Neither prewrite nor commit arrived for this transaction.
        mixed.set_lock(Lock::rollback_marker(start_ts));
        batch.set_with_meta(key.to_vec(), mixed.encode(), mixed.flags);
        return Ok(());
    }
    // The latest value is newer than the rollback target: look for the
    // transaction among superseded versions.
    let from = encode_old_key(key, val.commit_ts);
    for (found, old_entry) in view.iter_from(&from) {
        if !is_old_version_of(found, key) {
            break;
        }
        if is_visible_key(found, start_ts) {
            break;
        }
        let old = decode_value(&old_entry.value)?;
        if old.start_ts == start_ts {
            return Err(Error::AlreadyCommitted(old.commit_ts));
        }
    }
    if !newer_lock {
        mixed.set_lock(Lock::rollback_marker(start_ts));
        batch.set_with_meta(key.to_vec(), mixed.encode(), mixed.flags);
    }
    Ok(())
}
