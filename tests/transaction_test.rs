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

//! Transaction Tests
//!
//! Commit visibility, idempotency, rollback semantics, snapshot
//! isolation, lock TTL hints and resolution.

use std::sync::atomic::AtomicI64;

use stratakv::mvcc::codec::decode_mixed;
use stratakv::{compose_ts, Error, Mutation, MvccEngine, OpContext, RegionCtx};

fn setup() -> (MvccEngine, RegionCtx, OpContext) {
    (
        MvccEngine::new(),
        RegionCtx::new(b"".as_slice(), b"".as_slice()),
        OpContext::new(),
    )
}

fn must_prewrite(
    engine: &MvccEngine,
    region: &RegionCtx,
    ctx: &OpContext,
    mutations: &[Mutation],
    start_ts: u64,
) {
    let primary = mutations[0].key.clone();
    let errs = engine
        .prewrite(region, ctx, mutations, &primary, start_ts, 3000)
        .expect("prewrite failed");
    assert!(errs.iter().all(Option::is_none), "prewrite errors: {errs:?}");
}

fn must_commit(
    engine: &MvccEngine,
    region: &RegionCtx,
    ctx: &OpContext,
    keys: &[Vec<u8>],
    start_ts: u64,
    commit_ts: u64,
) {
    let diff = AtomicI64::new(0);
    engine
        .commit(region, ctx, keys, start_ts, commit_ts, &diff)
        .expect("commit failed");
}

fn put_committed(
    engine: &MvccEngine,
    region: &RegionCtx,
    ctx: &OpContext,
    key: &[u8],
    value: &[u8],
    start_ts: u64,
    commit_ts: u64,
) {
    must_prewrite(engine, region, ctx, &[Mutation::put(key, value)], start_ts);
    must_commit(engine, region, ctx, &[key.to_vec()], start_ts, commit_ts);
}

#[test]
fn test_single_key_commit() {
    let (engine, region, ctx) = setup();
    put_committed(&engine, &region, &ctx, &[3], &[42], 100, 101);

    assert_eq!(engine.get(&region, &[3], 102).unwrap().unwrap(), vec![42]);
    // Reads below the commit timestamp see nothing.
    assert_eq!(engine.get(&region, &[3], 100).unwrap(), None);

    let view = engine.store().view();
    let mixed = decode_mixed(&view.get(&[3]).unwrap().value).unwrap();
    assert!(mixed.lock.is_none());
    let val = mixed.value.unwrap();
    assert_eq!(val.value, vec![42]);
    assert_eq!(val.start_ts, 100);
    assert_eq!(val.commit_ts, 101);
}

#[test]
fn test_commit_is_idempotent() {
    let (engine, region, ctx) = setup();
    put_committed(&engine, &region, &ctx, &[3], &[42], 100, 101);

    // Retrying the same commit succeeds and changes nothing.
    must_commit(&engine, &region, &ctx, &[vec![3]], 100, 101);
    assert_eq!(engine.get(&region, &[3], 102).unwrap().unwrap(), vec![42]);

    // Even after the write moved to old-version space.
    put_committed(&engine, &region, &ctx, &[3], &[43], 110, 111);
    must_commit(&engine, &region, &ctx, &[vec![3]], 100, 101);
    assert_eq!(engine.get(&region, &[3], 120).unwrap().unwrap(), vec![43]);
    assert_eq!(engine.get(&region, &[3], 105).unwrap().unwrap(), vec![42]);
}

#[test]
fn test_commit_without_lock_fails() {
    let (engine, region, ctx) = setup();
    put_committed(&engine, &region, &ctx, &[3], &[42], 100, 101);
    let diff = AtomicI64::new(0);

    let err = engine
        .commit(&region, &ctx, &[vec![9]], 100, 101, &diff)
        .unwrap_err();
    assert_eq!(err, Error::LockNotFound);

    let err = engine
        .commit(&region, &ctx, &[vec![3]], 200, 201, &diff)
        .unwrap_err();
    assert_eq!(err, Error::LockNotFound);
}

#[test]
fn test_commit_replaced_lock_fails() {
    let (engine, region, ctx) = setup();
    must_prewrite(&engine, &region, &ctx, &[Mutation::put([3], [42])], 100);
    let diff = AtomicI64::new(0);
    let err = engine
        .commit(&region, &ctx, &[vec![3]], 90, 95, &diff)
        .unwrap_err();
    assert_eq!(err, Error::Replaced);
}

#[test]
fn test_commit_del_leaves_tombstone() {
    let (engine, region, ctx) = setup();
    put_committed(&engine, &region, &ctx, &[3], &[42], 100, 101);
    must_prewrite(&engine, &region, &ctx, &[Mutation::delete([3])], 110);
    must_commit(&engine, &region, &ctx, &[vec![3]], 110, 111);

    assert_eq!(engine.get(&region, &[3], 120).unwrap(), None);
    // The old value stays readable below the delete.
    assert_eq!(engine.get(&region, &[3], 105).unwrap().unwrap(), vec![42]);
}

#[test]
fn test_commit_accumulates_diff() {
    let (engine, region, ctx) = setup();
    must_prewrite(&engine, &region, &ctx, &[Mutation::put([3], [42])], 100);
    let diff = AtomicI64::new(0);
    engine
        .commit(&region, &ctx, &[vec![3]], 100, 101, &diff)
        .unwrap();
    assert!(diff.load(std::sync::atomic::Ordering::Relaxed) > 0);
}

#[test]
fn test_rollback_after_commit_fails_and_preserves_state() {
    let (engine, region, ctx) = setup();
    put_committed(&engine, &region, &ctx, &[3], &[42], 100, 101);

    let err = engine
        .rollback(&region, &ctx, &[vec![3]], 100)
        .unwrap_err();
    assert_eq!(err, Error::AlreadyCommitted(101));
    assert_eq!(engine.get(&region, &[3], 102).unwrap().unwrap(), vec![42]);

    // Same when the write was already promoted to old-version space.
    put_committed(&engine, &region, &ctx, &[3], &[43], 110, 111);
    let err = engine
        .rollback(&region, &ctx, &[vec![3]], 100)
        .unwrap_err();
    assert_eq!(err, Error::AlreadyCommitted(101));
}

#[test]
fn test_rollback_replaces_own_lock() {
    let (engine, region, ctx) = setup();
    must_prewrite(&engine, &region, &ctx, &[Mutation::put([3], [42])], 100);
    engine.rollback(&region, &ctx, &[vec![3]], 100).unwrap();

    // The key reads as absent and the transaction can never return.
    assert_eq!(engine.get(&region, &[3], 200).unwrap(), None);
    let errs = engine
        .prewrite(&region, &ctx, &[Mutation::put([3], [42])], &[3], 100, 3000)
        .unwrap();
    assert!(matches!(errs[0], Some(Error::Aborted(_))));
}

#[test]
fn test_rollback_piggybacks_on_older_lock() {
    let (engine, region, ctx) = setup();
    must_prewrite(&engine, &region, &ctx, &[Mutation::put([3], [42])], 100);

    // A newer transaction rolls back while the older lock is still live.
    engine.rollback(&region, &ctx, &[vec![3]], 150).unwrap();
    {
        let view = engine.store().view();
        let mixed = decode_mixed(&view.get(&[3]).unwrap().value).unwrap();
        assert_eq!(mixed.lock.as_ref().unwrap().rollback_ts, 150);
    }

    // Committing the older transaction preserves the rollback marker.
    must_commit(&engine, &region, &ctx, &[vec![3]], 100, 120);
    let view = engine.store().view();
    let mixed = decode_mixed(&view.get(&[3]).unwrap().value).unwrap();
    let marker = mixed.lock.unwrap();
    assert_eq!(marker.start_ts, 150);
    assert_eq!(marker.op, stratakv::Op::Rollback);
    assert_eq!(mixed.value.unwrap().value, vec![42]);

    // And the marker still fences ts 150.
    let errs = engine
        .prewrite(&region, &ctx, &[Mutation::put([3], [9])], &[3], 150, 3000)
        .unwrap();
    assert!(matches!(errs[0], Some(Error::Aborted(_))));
}

#[test]
fn test_snapshot_read_under_concurrent_commit() {
    let (engine, region, ctx) = setup();
    put_committed(&engine, &region, &ctx, &[3], &[1], 100, 110);

    // A newer commit lands above the reader's timestamp.
    put_committed(&engine, &region, &ctx, &[3], &[2], 155, 160);

    // The reader at 150 still resolves the old version.
    assert_eq!(engine.get(&region, &[3], 150).unwrap().unwrap(), vec![1]);
    assert_eq!(engine.get(&region, &[3], 160).unwrap().unwrap(), vec![2]);
}

#[test]
fn test_read_blocked_by_lock() {
    let (engine, region, ctx) = setup();
    put_committed(&engine, &region, &ctx, &[3], &[1], 100, 110);
    must_prewrite(&engine, &region, &ctx, &[Mutation::put([3], [2])], 120);

    // Readers above the lock are blocked...
    let err = engine.get(&region, &[3], 130).unwrap_err();
    assert!(matches!(err, Error::KeyIsLocked { start_ts: 120, .. }));
    // ...readers below it are not.
    assert_eq!(engine.get(&region, &[3], 115).unwrap().unwrap(), vec![1]);
}

#[test]
fn test_batch_get_mixes_values_and_lock_errors() {
    let (engine, region, ctx) = setup();
    put_committed(&engine, &region, &ctx, &[1], &[11], 100, 101);
    must_prewrite(&engine, &region, &ctx, &[Mutation::put([2], [22])], 110);

    let results = engine.batch_get(&region, &[vec![1], vec![2], vec![9]], 120);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap().value, vec![11]);
    assert!(matches!(
        results[1],
        Err(Error::KeyIsLocked { start_ts: 110, .. })
    ));
}

#[test]
fn test_cleanup_single_key() {
    let (engine, region, ctx) = setup();
    must_prewrite(
        &engine,
        &region,
        &ctx,
        &[Mutation::put([1], [11]), Mutation::put([2], [22])],
        100,
    );

    engine.cleanup(&region, &ctx, &[1], 100).unwrap();

    // Only the cleaned key left the transaction index.
    assert_eq!(region.txn_keys(100), vec![vec![2]]);
    assert_eq!(engine.get(&region, &[1], 200).unwrap(), None);
    assert!(matches!(
        engine.get(&region, &[2], 200).unwrap_err(),
        Error::KeyIsLocked { .. }
    ));
}

#[test]
fn test_expired_lock_hint_and_resolve_rollback() {
    let (engine, region, ctx) = setup();
    let start_ts = compose_ts(100, 0);
    let errs = engine
        .prewrite(
            &region,
            &ctx,
            &[Mutation::put([3], [42])],
            &[3],
            start_ts,
            10,
        )
        .unwrap();
    assert!(errs.iter().all(Option::is_none));
    // Prewrite indexed its own keys; drop them to exercise the hint path.
    region.remove_txn_keys(start_ts);

    let read_ts = compose_ts(200, 0);
    let err = engine.get(&region, &[3], read_ts).unwrap_err();
    assert!(matches!(err, Error::KeyIsLocked { .. }));
    assert_eq!(region.txn_keys(start_ts), vec![vec![3]]);

    // A resolver can now roll the transaction back from the hint alone.
    let diff = AtomicI64::new(0);
    engine
        .resolve_lock(&region, &ctx, start_ts, 0, &diff)
        .unwrap();
    assert_eq!(engine.get(&region, &[3], read_ts).unwrap(), None);
    assert!(region.txn_keys(start_ts).is_empty());
}

#[test]
fn test_scan_lock_reports_live_write_locks() {
    let (engine, region, ctx) = setup();
    must_prewrite(
        &engine,
        &region,
        &ctx,
        &[Mutation::put([1], [11]), Mutation::put([2], [22])],
        100,
    );
    engine.rollback(&region, &ctx, &[vec![5]], 90).unwrap();
    region.add_txn_key(90, &[5]);

    let mut locks = engine.scan_lock(&region, 150).unwrap();
    locks.sort_by(|a, b| a.key.cmp(&b.key));
    // The rollback marker is not a live lock.
    assert_eq!(locks.len(), 2);
    assert_eq!(locks[0].key, vec![1]);
    assert_eq!(locks[0].lock_ts, 100);
    assert_eq!(locks[1].key, vec![2]);

    // Locks at or above max_ts are out of scope.
    assert!(engine.scan_lock(&region, 100).unwrap().is_empty());
}

#[test]
fn test_resolve_lock_commits() {
    let (engine, region, ctx) = setup();
    must_prewrite(
        &engine,
        &region,
        &ctx,
        &[Mutation::put([1], [11]), Mutation::put([2], [22])],
        100,
    );

    let diff = AtomicI64::new(0);
    engine
        .resolve_lock(&region, &ctx, 100, 120, &diff)
        .unwrap();
    assert_eq!(engine.get(&region, &[1], 130).unwrap().unwrap(), vec![11]);
    assert_eq!(engine.get(&region, &[2], 130).unwrap().unwrap(), vec![22]);
    assert!(region.txn_keys(100).is_empty());
}

#[test]
fn test_resolve_lock_skips_foreign_locks() {
    let (engine, region, ctx) = setup();
    must_prewrite(&engine, &region, &ctx, &[Mutation::put([1], [11])], 100);
    // Stale index entry pointing at a key now locked by someone else.
    region.add_txn_key(90, &[1]);

    let diff = AtomicI64::new(0);
    engine.resolve_lock(&region, &ctx, 90, 95, &diff).unwrap();

    // The live lock survived.
    assert!(matches!(
        engine.get(&region, &[1], 130).unwrap_err(),
        Error::KeyIsLocked { start_ts: 100, .. }
    ));
}

#[test]
fn test_cancelled_context_aborts_before_staging() {
    let (engine, region, ctx) = setup();
    must_prewrite(&engine, &region, &ctx, &[Mutation::put([1], [11])], 100);

    let cancelled = OpContext::new();
    cancelled.cancel();
    // The latch wait observes cancellation only while actually waiting;
    // an uncontended acquisition proceeds, so force contention first.
    let buckets = region.buckets_for([[1u8].as_slice()]);
    let _guard = region.acquire_latches(buckets, &ctx).unwrap();
    let err = engine
        .rollback(&region, &cancelled, &[vec![1]], 100)
        .unwrap_err();
    assert_eq!(err, Error::Cancelled);
    drop(_guard);
    // Nothing was mutated.
    assert!(matches!(
        engine.get(&region, &[1], 130).unwrap_err(),
        Error::KeyIsLocked { start_ts: 100, .. }
    ));
}

#[test]
fn test_concurrent_single_key_counter() {
    use std::sync::Arc;

    let engine = Arc::new(MvccEngine::new());
    let region = Arc::new(RegionCtx::new(b"".as_slice(), b"".as_slice()));

    let threads: Vec<_> = (0..4u64)
        .map(|t| {
            let engine = engine.clone();
            let region = region.clone();
            std::thread::spawn(move || {
                let ctx = OpContext::new();
                for i in 0..16u64 {
                    let start_ts = 1000 + t * 100 + i * 2;
                    let key = vec![t as u8];
                    let errs = engine
                        .prewrite(
                            &region,
                            &ctx,
                            &[Mutation::put(key.clone(), vec![i as u8])],
                            &key,
                            start_ts,
                            3000,
                        )
                        .unwrap();
                    assert!(errs.iter().all(Option::is_none));
                    let diff = AtomicI64::new(0);
                    engine
                        .commit(&region, &ctx, &[key], start_ts, start_ts + 1, &diff)
                        .unwrap();
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    for t in 0..4u8 {
        let value = engine.get(&region, &[t], u64::MAX - 1).unwrap().unwrap();
        assert_eq!(value, vec![15]);
    }
}
