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

//! Storage substrate: the ordered backing store, staged write batches,
//! and the single-writer worker that applies them.

pub mod config;
pub mod memstore;
pub mod write_batch;
pub mod writer;

pub use config::EngineConfig;
pub use memstore::{MemStore, ReadView, StoreEntry};
pub use write_batch::{BatchEntry, WriteBatch};
pub use writer::{WriteAck, WriteWorker};
