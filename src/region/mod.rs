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

//! Per-region context
//!
//! A region owns a contiguous `[start_key, end_key)` slice of the key
//! space and carries two pieces of shared state:
//!
//! - A **latch table** mapping `hash(user_key) % latch_buckets` to a
//!   latch with a FIFO waiter queue. Write operations latch all their
//!   keys as one atomic step: buckets are sorted and deduplicated, and on
//!   any collision the attempt releases what it took and parks on the
//!   failing bucket's queue before retrying, so concurrent multi-key
//!   transactions cannot deadlock.
//! - A **transaction index** mapping `start_ts` to the user keys
//!   prewritten under it, consulted by Commit, Rollback, ScanLock and
//!   ResolveLock instead of rescanning the store. Reads also drop hint
//!   entries here when they trip over a TTL-expired lock.

use std::collections::VecDeque;
use std::hash::Hasher;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use smallvec::SmallVec;
use tracing::warn;

use crate::core::{Error, OpContext, Result};

/// Latch acquisitions slower than this log a warning
const SLOW_ACQUIRE: Duration = Duration::from_millis(50);

/// Poll interval for cancellation while parked on a latch
const WAIT_POLL: Duration = Duration::from_millis(5);

/// Sorted, deduplicated latch bucket set for one operation
pub type LatchBuckets = SmallVec<[u64; 8]>;

/// A parked latch waiter. Queued FIFO on the bucket it collided with.
pub struct LatchWaiter {
    bucket: u64,
    notified: Mutex<bool>,
    cond: Condvar,
}

impl LatchWaiter {
    fn new(bucket: u64) -> Self {
        Self {
            bucket,
            notified: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    fn notify(&self) {
        *self.notified.lock() = true;
        self.cond.notify_one();
    }
}

#[derive(Default)]
struct LatchTable {
    held: FxHashSet<u64>,
    waiters: FxHashMap<u64, VecDeque<std::sync::Arc<LatchWaiter>>>,
}

impl LatchTable {
    fn release_one(&mut self, bucket: u64) {
        self.held.remove(&bucket);
        self.notify_next(bucket);
    }

    fn notify_next(&mut self, bucket: u64) {
        if let Some(queue) = self.waiters.get_mut(&bucket) {
            if let Some(waiter) = queue.pop_front() {
                waiter.notify();
            }
            if queue.is_empty() {
                self.waiters.remove(&bucket);
            }
        }
    }
}

/// Per-shard context: key range, latch table and transaction index
pub struct RegionCtx {
    start_key: Vec<u8>,
    end_key: Vec<u8>,
    latch_buckets: u64,
    latches: Mutex<LatchTable>,
    txn_keys: Mutex<FxHashMap<u64, FxHashSet<Vec<u8>>>>,
}

impl RegionCtx {
    /// Default latch bucket count. Distinct user keys may share a
    /// bucket; that only costs false contention, never correctness.
    pub const DEFAULT_LATCH_BUCKETS: usize = 256;

    /// Creates a region over `[start_key, end_key)`. An empty `end_key`
    /// means unbounded above.
    pub fn new(start_key: impl Into<Vec<u8>>, end_key: impl Into<Vec<u8>>) -> Self {
        Self::with_latch_buckets(start_key, end_key, Self::DEFAULT_LATCH_BUCKETS)
    }

    pub fn with_latch_buckets(
        start_key: impl Into<Vec<u8>>,
        end_key: impl Into<Vec<u8>>,
        latch_buckets: usize,
    ) -> Self {
        Self {
            start_key: start_key.into(),
            end_key: end_key.into(),
            latch_buckets: latch_buckets.max(1) as u64,
            latches: Mutex::new(LatchTable::default()),
            txn_keys: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn start_key(&self) -> &[u8] {
        &self.start_key
    }

    pub fn end_key(&self) -> &[u8] {
        &self.end_key
    }

    // =========================================================================
    // Latch table
    // =========================================================================

    /// Latch bucket for one user key
    pub fn bucket_of(&self, key: &[u8]) -> u64 {
        let mut hasher = FxHasher::default();
        hasher.write(key);
        hasher.finish() % self.latch_buckets
    }

    /// Maps a key set to its sorted, deduplicated latch buckets
    pub fn buckets_for<I>(&self, keys: I) -> LatchBuckets
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut buckets: LatchBuckets = keys
            .into_iter()
            .map(|key| self.bucket_of(key.as_ref()))
            .collect();
        buckets.sort_unstable();
        buckets.dedup();
        buckets
    }

    /// Latches the whole bucket set, parking FIFO on collisions until the
    /// set is acquired or the context is cancelled. Returns a guard that
    /// releases on drop.
    pub fn acquire_latches(&self, buckets: LatchBuckets, ctx: &OpContext) -> Result<LatchGuard<'_>> {
        let start = Instant::now();
        loop {
            match self.try_acquire(&buckets) {
                Ok(total_held) => {
                    let elapsed = start.elapsed();
                    if elapsed > SLOW_ACQUIRE {
                        warn!(
                            buckets = buckets.len(),
                            held = total_held,
                            elapsed_ms = elapsed.as_millis() as u64,
                            "slow latch acquisition"
                        );
                    }
                    return Ok(LatchGuard {
                        region: self,
                        buckets,
                    });
                }
                Err(waiter) => self.wait_latch(&waiter, ctx)?,
            }
        }
    }

    /// One atomic acquisition attempt. On collision, everything taken in
    /// this attempt is released (waking next waiters) and the caller gets
    /// a waiter queued on the failing bucket.
    fn try_acquire(
        &self,
        buckets: &[u64],
    ) -> std::result::Result<usize, std::sync::Arc<LatchWaiter>> {
        let mut table = self.latches.lock();
        for (i, &bucket) in buckets.iter().enumerate() {
            if table.held.contains(&bucket) {
                let waiter = std::sync::Arc::new(LatchWaiter::new(bucket));
                table
                    .waiters
                    .entry(bucket)
                    .or_default()
                    .push_back(waiter.clone());
                for &taken in &buckets[..i] {
                    table.release_one(taken);
                }
                return Err(waiter);
            }
            table.held.insert(bucket);
        }
        Ok(table.held.len())
    }

    fn wait_latch(&self, waiter: &std::sync::Arc<LatchWaiter>, ctx: &OpContext) -> Result<()> {
        let mut notified = waiter.notified.lock();
        loop {
            if *notified {
                return Ok(());
            }
            if ctx.is_cancelled() {
                drop(notified);
                self.abandon_wait(waiter);
                return Err(Error::Cancelled);
            }
            waiter.cond.wait_for(&mut notified, WAIT_POLL);
        }
    }

    /// Removes a cancelled waiter from its queue. If the waiter was
    /// already notified, its wake-up is handed to the next in line so the
    /// latch cannot go idle with waiters parked on it.
    fn abandon_wait(&self, waiter: &std::sync::Arc<LatchWaiter>) {
        let mut table = self.latches.lock();
        if let Some(queue) = table.waiters.get_mut(&waiter.bucket) {
            queue.retain(|queued| !std::sync::Arc::ptr_eq(queued, waiter));
            if queue.is_empty() {
                table.waiters.remove(&waiter.bucket);
            }
        }
        let was_notified = *waiter.notified.lock();
        if was_notified && !table.held.contains(&waiter.bucket) {
            table.notify_next(waiter.bucket);
        }
    }

    fn release_latches(&self, buckets: &[u64]) {
        let mut table = self.latches.lock();
        for &bucket in buckets {
            table.release_one(bucket);
        }
    }

    // =========================================================================
    // Transaction index
    // =========================================================================

    /// Records one key under a transaction's start timestamp
    pub fn add_txn_key(&self, start_ts: u64, key: &[u8]) {
        self.txn_keys
            .lock()
            .entry(start_ts)
            .or_default()
            .insert(key.to_vec());
    }

    /// Records a transaction's full key set
    pub fn add_txn_keys(&self, start_ts: u64, keys: impl IntoIterator<Item = Vec<u8>>) {
        let mut index = self.txn_keys.lock();
        let entry = index.entry(start_ts).or_default();
        for key in keys {
            entry.insert(key);
        }
        if entry.is_empty() {
            index.remove(&start_ts);
        }
    }

    /// Drops every key recorded under `start_ts`
    pub fn remove_txn_keys(&self, start_ts: u64) {
        self.txn_keys.lock().remove(&start_ts);
    }

    /// Drops a single key; removes the entry once its key set is empty
    pub fn remove_txn_key(&self, start_ts: u64, key: &[u8]) {
        let mut index = self.txn_keys.lock();
        if let Some(keys) = index.get_mut(&start_ts) {
            keys.remove(key);
            if keys.is_empty() {
                index.remove(&start_ts);
            }
        }
    }

    /// Keys recorded under `start_ts`
    pub fn txn_keys(&self, start_ts: u64) -> Vec<Vec<u8>> {
        self.txn_keys
            .lock()
            .get(&start_ts)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Keys of every transaction with `start_ts < max_ts`
    pub fn all_txn_keys(&self, max_ts: u64) -> Vec<Vec<u8>> {
        let index = self.txn_keys.lock();
        let mut out = Vec::new();
        for (&ts, keys) in index.iter() {
            if ts < max_ts {
                out.extend(keys.iter().cloned());
            }
        }
        out
    }
}

/// Holds a set of latched buckets; releases them on drop
pub struct LatchGuard<'a> {
    region: &'a RegionCtx,
    buckets: LatchBuckets,
}

impl Drop for LatchGuard<'_> {
    fn drop(&mut self) {
        self.region.release_latches(&self.buckets);
    }
}

impl std::fmt::Debug for LatchGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatchGuard")
            .field("buckets", &self.buckets)
            .finish()
    }
}
