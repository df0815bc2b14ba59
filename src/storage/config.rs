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

//! Engine configuration
//!

/// Tunables for the MVCC engine. Latch sizing lives on the region
/// context, which is owned by the shard layer rather than the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum keys collected per namespace in one DeleteRange call, and
    /// the latched chunk size used when deleting them.
    /// Default: 4096
    pub delete_range_batch_size: usize,

    /// Latched chunk size for garbage-collection deletes.
    /// Default: 256
    pub gc_batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            delete_range_batch_size: 4096,
            gc_batch_size: 256,
        }
    }
}
