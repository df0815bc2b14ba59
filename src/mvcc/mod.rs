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

//! Multi-version two-phase-commit engine
//!
//! Percolator-style transactions over the backing store: Prewrite stages
//! locks, Commit promotes them to committed values, Rollback and Cleanup
//! fence aborted transactions, ScanLock/ResolveLock recover stranded
//! ones, and GC reclaims versions below the safe point. Reads resolve a
//! caller-supplied timestamp against the mixed latest record and the
//! old-version namespace.

pub mod codec;
mod engine;
mod gc;
mod scan;
mod txn;

pub use engine::{KvPair, MvccEngine};
pub use txn::{LockInfo, Mutation};
