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

//! MVCC range scans
//!
//! Both directions iterate the latest namespace over `[start_key,
//! end_key)` and fall back to old-version space per key when the latest
//! commit is newer than the read timestamp. Old-version shadows are
//! filtered out up front by their zero user-meta byte, without decoding.

use crate::core::Result;
use crate::mvcc::codec::{decode_mixed, ValueType, LOCK_FLAG, VALUE_FLAG};
use crate::mvcc::engine::{check_lock, exceeds_end, seek_old_version, KvPair, MvccEngine};
use crate::region::RegionCtx;

impl MvccEngine {
    /// Forward snapshot scan over `[start_key, end_key)`, ascending,
    /// returning at most `limit` pairs. An empty `end_key` is unbounded.
    /// The first locked key aborts the scan with `KeyIsLocked`.
    pub fn scan(
        &self,
        region: &RegionCtx,
        start_key: &[u8],
        end_key: &[u8],
        limit: usize,
        start_ts: u64,
    ) -> Result<Vec<KvPair>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let view = self.view();
        let mut pairs = Vec::new();
        for (key, entry) in view.iter_from(start_key) {
            if exceeds_end(key, end_key) {
                break;
            }
            if entry.user_meta & (LOCK_FLAG | VALUE_FLAG) == 0 {
                continue;
            }
            let mixed = decode_mixed(&entry.value)?;
            if let Some(lock) = &mixed.lock {
                check_lock(region, lock, key, start_ts)?;
            }
            let Some(val) = &mixed.value else {
                continue;
            };
            let visible = if val.commit_ts <= start_ts {
                Some(val.clone())
            } else {
                seek_old_version(&view, key, start_ts)?
            };
            let Some(visible) = visible else {
                continue;
            };
            if visible.value_type == ValueType::Delete {
                continue;
            }
            pairs.push(KvPair {
                key: key.to_vec(),
                value: visible.value,
            });
            if pairs.len() >= limit {
                break;
            }
        }
        Ok(pairs)
    }

    /// Reverse snapshot scan over the same half-open range, descending
    /// from `end_key`. Old-version probes still use the forward seek: the
    /// complemented suffix already orders versions newest-first.
    pub fn reverse_scan(
        &self,
        region: &RegionCtx,
        start_key: &[u8],
        end_key: &[u8],
        limit: usize,
        start_ts: u64,
    ) -> Result<Vec<KvPair>> {
        if limit == 0 || start_key >= end_key {
            return Ok(Vec::new());
        }
        let view = self.view();
        let mut pairs = Vec::new();
        for (key, entry) in view.iter_rev(start_key, end_key) {
            if entry.user_meta & (LOCK_FLAG | VALUE_FLAG) == 0 {
                continue;
            }
            let mixed = decode_mixed(&entry.value)?;
            if let Some(lock) = &mixed.lock {
                check_lock(region, lock, key, start_ts)?;
            }
            let Some(val) = &mixed.value else {
                continue;
            };
            let visible = if val.commit_ts <= start_ts {
                Some(val.clone())
            } else {
                seek_old_version(&view, key, start_ts)?
            };
            let Some(visible) = visible else {
                continue;
            };
            if visible.value_type == ValueType::Delete {
                continue;
            }
            pairs.push(KvPair {
                key: key.to_vec(),
                value: visible.value,
            });
            if pairs.len() >= limit {
                break;
            }
        }
        Ok(pairs)
    }
}
