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

//! Hybrid timestamps
//!
//! A timestamp is a 64-bit value whose high 46 bits carry a physical
//! wall-clock component (milliseconds) and whose low 18 bits carry a
//! logical counter. Transactions are identified by the timestamp assigned
//! at their start (`start_ts`) and become visible at their `commit_ts`.

/// Number of low bits reserved for the logical component
pub const PHYSICAL_SHIFT: u32 = 18;

/// Sentinel version marking lock records in old-version key space.
/// Its bitwise complement is all zeroes, so `encode_old_key(k, LOCK_VER)`
/// sorts before every real version of `k`.
pub const LOCK_VER: u64 = u64::MAX;

/// Extracts the physical (wall-clock) component of a timestamp
#[inline]
pub fn extract_physical(ts: u64) -> u64 {
    ts >> PHYSICAL_SHIFT
}

/// Composes a timestamp from physical and logical components
#[inline]
pub fn compose_ts(physical: u64, logical: u64) -> u64 {
    (physical << PHYSICAL_SHIFT) | (logical & ((1 << PHYSICAL_SHIFT) - 1))
}
