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

//! Prewrite Tests
//!
//! Covers lock staging: batch atomicity, duplicate keys inside one
//! batch, lock conflicts between transactions, and rollback fencing.

use stratakv::mvcc::codec::{decode_mixed, Op};
use stratakv::{Error, Mutation, MvccEngine, OpContext, RegionCtx};

struct Harness {
    engine: MvccEngine,
    region: RegionCtx,
    ctx: OpContext,
    next_ts: u64,
}

impl Harness {
    fn new() -> Self {
        Self {
            engine: MvccEngine::new(),
            region: RegionCtx::new(b"".as_slice(), b"".as_slice()),
            ctx: OpContext::new(),
            next_ts: 100,
        }
    }

    fn prewrite(&mut self, mutations: Vec<Mutation>) -> Vec<Option<Error>> {
        let start_ts = self.next_ts;
        self.next_ts += 1;
        self.engine
            .prewrite(&self.region, &self.ctx, &mutations, &[1], start_ts, 3000)
            .expect("prewrite failed")
    }

    fn lock_of(&self, key: &[u8]) -> stratakv::mvcc::codec::Lock {
        let view = self.engine.store().view();
        let entry = view.get(key).expect("key not found");
        let mixed = decode_mixed(&entry.value).expect("bad record");
        mixed.lock.expect("no lock on key")
    }
}

fn mutation(key: u8, value: Vec<u8>, op: Op) -> Mutation {
    Mutation {
        op,
        key: vec![key],
        value,
    }
}

#[test]
fn test_empty_prewrite() {
    let mut h = Harness::new();
    let errs = h.prewrite(vec![]);
    assert!(errs.is_empty());
    assert_eq!(h.engine.store().len(), 0);
}

#[test]
fn test_single_prewrite() {
    let mut h = Harness::new();
    let errs = h.prewrite(vec![mutation(3, vec![42], Op::Put)]);
    assert!(errs.iter().all(Option::is_none));
    assert_eq!(h.engine.store().len(), 1);

    let lock = h.lock_of(&[3]);
    assert_eq!(lock.start_ts, 100);
    assert_eq!(lock.value, vec![42]);
    assert_eq!(lock.primary, vec![1]);
    assert_eq!(lock.op, Op::Put);
}

#[test]
fn test_conflicting_prewrites() {
    let mut h = Harness::new();
    let errs = h.prewrite(vec![mutation(3, vec![42], Op::Put)]);
    assert!(errs.iter().all(Option::is_none));

    let errs = h.prewrite(vec![mutation(3, vec![53], Op::Put)]);
    assert_eq!(errs.len(), 1);
    match errs[0].as_ref().expect("expected lock error") {
        Error::KeyIsLocked { start_ts, .. } => assert_eq!(*start_ts, 100),
        other => panic!("unexpected error {other:?}"),
    }

    // The loser left no trace: still one record, locked by the winner.
    assert_eq!(h.engine.store().len(), 1);
    let lock = h.lock_of(&[3]);
    assert_eq!(lock.start_ts, 100);
    assert_eq!(lock.value, vec![42]);
}

#[test]
fn test_prewrites_to_different_keys() {
    let mut h = Harness::new();
    let errs = h.prewrite(vec![mutation(3, vec![42], Op::Put)]);
    assert!(errs.iter().all(Option::is_none));
    let errs = h.prewrite(vec![mutation(4, vec![53], Op::Put)]);
    assert!(errs.iter().all(Option::is_none));

    assert_eq!(h.engine.store().len(), 2);
    assert_eq!(h.lock_of(&[3]).start_ts, 100);
    assert_eq!(h.lock_of(&[4]).start_ts, 101);
}

#[test]
fn test_prewrite_overwrite_within_batch() {
    let mut h = Harness::new();
    let errs = h.prewrite(vec![
        mutation(3, vec![42], Op::Put),
        mutation(3, vec![45], Op::Put),
    ]);
    assert!(errs.iter().all(Option::is_none));

    assert_eq!(h.engine.store().len(), 1);
    let lock = h.lock_of(&[3]);
    assert_eq!(lock.start_ts, 100);
    assert_eq!(lock.value, vec![45]);
}

#[test]
fn test_prewrite_multiple_mutations() {
    let mut h = Harness::new();
    let errs = h.prewrite(vec![
        mutation(3, vec![42], Op::Put),
        mutation(4, vec![43], Op::Put),
        mutation(5, vec![44], Op::Insert),
        mutation(4, vec![], Op::Del),
        mutation(4, vec![1, 3, 5], Op::Insert),
        mutation(255, vec![45], Op::Put),
    ]);
    assert!(errs.iter().all(Option::is_none));

    assert_eq!(h.engine.store().len(), 4);
    for key in [3u8, 4, 5, 255] {
        let lock = h.lock_of(&[key]);
        assert_eq!(lock.start_ts, 100, "key {key}");
    }
    assert_eq!(h.lock_of(&[4]).value, vec![1, 3, 5]);
    // Insert is stored as a plain write lock.
    assert_eq!(h.lock_of(&[5]).op, Op::Put);
}

#[test]
fn test_prewrite_same_txn_is_idempotent() {
    let mut h = Harness::new();
    let errs = h.prewrite(vec![mutation(3, vec![42], Op::Put)]);
    assert!(errs.iter().all(Option::is_none));

    // Retrying the same transaction must not double-lock or overwrite.
    let errs = h
        .engine
        .prewrite(
            &h.region,
            &h.ctx,
            &[mutation(3, vec![99], Op::Put)],
            &[1],
            100,
            3000,
        )
        .unwrap();
    assert!(errs.iter().all(Option::is_none));
    assert_eq!(h.engine.store().len(), 1);
    assert_eq!(h.lock_of(&[3]).value, vec![42]);
}

#[test]
fn test_prewrite_after_rollback_marker() {
    let mut h = Harness::new();
    h.engine
        .rollback(&h.region, &h.ctx, &[vec![7]], 200)
        .unwrap();
    let marker = h.lock_of(&[7]);
    assert_eq!(marker.op, Op::Rollback);
    assert_eq!(marker.start_ts, 200);

    // The rolled-back transaction can never prewrite this key again.
    let errs = h
        .engine
        .prewrite(
            &h.region,
            &h.ctx,
            &[mutation(7, vec![1], Op::Put)],
            &[1],
            200,
            3000,
        )
        .unwrap();
    assert!(matches!(errs[0], Some(Error::Aborted(_))));

    // A newer transaction supersedes the marker.
    let errs = h
        .engine
        .prewrite(
            &h.region,
            &h.ctx,
            &[mutation(7, vec![2], Op::Put)],
            &[1],
            201,
            3000,
        )
        .unwrap();
    assert!(errs.iter().all(Option::is_none));
    let lock = h.lock_of(&[7]);
    assert_eq!(lock.start_ts, 201);
    assert_eq!(lock.op, Op::Put);
}

#[test]
fn test_failed_batch_stages_nothing() {
    let mut h = Harness::new();
    let errs = h.prewrite(vec![mutation(3, vec![42], Op::Put)]);
    assert!(errs.iter().all(Option::is_none));

    // One conflicting mutation poisons the whole batch.
    let errs = h.prewrite(vec![
        mutation(9, vec![1], Op::Put),
        mutation(3, vec![2], Op::Put),
    ]);
    assert!(errs[0].is_none());
    assert!(errs[1].is_some());
    let view = h.engine.store().view();
    assert!(view.get(&[9]).is_none(), "failed batch must not persist");
    drop(view);
    // And the failed transaction is not indexed.
    assert!(h.region.txn_keys(101).is_empty());
}

#[test]
fn test_prewrite_write_conflict() {
    let mut h = Harness::new();
    let errs = h.prewrite(vec![mutation(3, vec![42], Op::Put)]);
    assert!(errs.iter().all(Option::is_none));
    let diff = std::sync::atomic::AtomicI64::new(0);
    h.engine
        .commit(&h.region, &h.ctx, &[vec![3]], 100, 150, &diff)
        .unwrap();

    // A transaction older than the commit must fail with a conflict.
    let errs = h
        .engine
        .prewrite(
            &h.region,
            &h.ctx,
            &[mutation(3, vec![9], Op::Put)],
            &[1],
            120,
            3000,
        )
        .unwrap();
    match errs[0].as_ref().expect("expected conflict") {
        Error::WriteConflict {
            start_ts,
            conflict_commit_ts,
        } => {
            assert_eq!(*start_ts, 120);
            assert_eq!(*conflict_commit_ts, 150);
        }
        other => panic!("unexpected error {other:?}"),
    }
}
