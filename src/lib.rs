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

//! # StrataKV - transactional multi-version KV engine
//!
//! StrataKV is the storage core of a distributed-transaction key-value
//! node: percolator-style two-phase-commit transactions layered on an
//! ordered single-version backing store, plus a coprocessor-style
//! executor pipeline over its snapshot reads.
//!
//! ## Key Features
//!
//! - **Snapshot reads** - Get/BatchGet/Scan/ReverseScan honour a
//!   caller-supplied read timestamp against latest and old-version space
//! - **Two-phase commit** - Prewrite/Commit/Rollback/Cleanup with
//!   idempotent retries, write-conflict detection and rollback fencing
//! - **Lock resolution** - TTL-expiry hints, ScanLock and batched
//!   ResolveLock driven by the per-region transaction index
//! - **Garbage collection** - safe-point GC over old versions,
//!   tombstones and rollback markers, optimistic against live writers
//! - **Query executors** - table scan, index scan, selection, limit and
//!   top-N operators materialising coprocessor rows
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::atomic::AtomicI64;
//! use stratakv::{Mutation, MvccEngine, OpContext, RegionCtx};
//!
//! let engine = MvccEngine::new();
//! let region = RegionCtx::new(b"".as_slice(), b"".as_slice());
//! let ctx = OpContext::new();
//!
//! let muts = vec![Mutation::put(b"k".as_slice(), b"v".as_slice())];
//! let errs = engine.prewrite(&region, &ctx, &muts, b"k", 100, 3000).unwrap();
//! assert!(errs.iter().all(Option::is_none));
//!
//! let diff = AtomicI64::new(0);
//! engine.commit(&region, &ctx, &[b"k".to_vec()], 100, 101, &diff).unwrap();
//! assert_eq!(engine.get(&region, b"k", 102).unwrap().unwrap(), b"v");
//! ```
//!
//! ## Modules
//!
//! - [`core`] - Timestamps, errors, operation context
//! - [`storage`] - Backing store, write batches, the single write worker
//! - [`region`] - Per-shard latch table and transaction index
//! - [`mvcc`] - The transactional engine and its record codec
//! - [`executor`] - Pull-model query operators

pub mod core;
pub mod executor;
pub mod mvcc;
pub mod region;
pub mod storage;

// Re-export main types for convenience
pub use crate::core::{compose_ts, extract_physical, Error, OpContext, Result, LOCK_VER};
pub use executor::{
    CmpOp, ColumnInfo, Datum, Executor, Expr, FieldType, IndexScanExec, KeyRange, LimitExec,
    OrderBy, OutputRow, PkStatus, SelectionExec, TableScanExec, TopNExec,
};
pub use mvcc::codec::Op;
pub use mvcc::{KvPair, LockInfo, Mutation, MvccEngine};
pub use region::RegionCtx;
pub use storage::{EngineConfig, MemStore, WriteBatch};
