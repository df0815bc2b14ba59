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

//! Index scan leaf
//!
//! Cuts the composite index key back into column datums and appends the
//! row handle, taken from the index value on unique indexes and from the
//! trailing key remainder otherwise. Point lookups are only taken on
//! unique indexes; everything else goes through chunked range scans.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::core::Result;
use crate::executor::datum::{encoded, Datum};
use crate::executor::table_codec::{cut_index_key, decode_handle};
use crate::executor::{ColumnInfo, Executor, KeyRange, OutputRow, SCAN_CHUNK};
use crate::mvcc::codec::{prefix_next, prefix_prev};
use crate::mvcc::{KvPair, MvccEngine};
use crate::region::RegionCtx;

/// Whether and how the handle column appears in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkStatus {
    NotExists,
    Signed,
    Unsigned,
}

pub struct IndexScanExec {
    engine: Arc<MvccEngine>,
    region: Arc<RegionCtx>,
    /// Number of indexed columns cut out of the key
    cols_len: usize,
    pk_status: PkStatus,
    unique: bool,
    kv_ranges: Vec<KeyRange>,
    start_ts: u64,
    desc: bool,

    range_cursor: usize,
    range_done: bool,
    rows: VecDeque<OutputRow>,
    seek_key: Option<Vec<u8>>,
    counts: Vec<i64>,
    counts_start: usize,
}

impl IndexScanExec {
    pub fn new(
        engine: Arc<MvccEngine>,
        region: Arc<RegionCtx>,
        columns: &[ColumnInfo],
        pk_status: PkStatus,
        unique: bool,
        kv_ranges: Vec<KeyRange>,
        start_ts: u64,
        desc: bool,
    ) -> Self {
        let mut cols_len = columns.len();
        if pk_status != PkStatus::NotExists {
            cols_len -= 1;
        }
        let counts = vec![0; kv_ranges.len()];
        Self {
            engine,
            region,
            cols_len,
            pk_status,
            unique,
            kv_ranges,
            start_ts,
            desc,
            range_cursor: 0,
            range_done: false,
            rows: VecDeque::new(),
            seek_key: None,
            counts,
            counts_start: 0,
        }
    }

    fn is_point(&self, range: &KeyRange) -> bool {
        self.unique && range.is_point()
    }

    fn decode_index_kv(&self, pair: &KvPair) -> Result<OutputRow> {
        let (mut values, remainder) = cut_index_key(&pair.key, self.cols_len)?;
        if self.pk_status == PkStatus::NotExists {
            return Ok(values);
        }
        if !remainder.is_empty() {
            // Non-unique index: the handle datum trails the key.
            values.push(remainder);
        } else {
            let handle = decode_handle(&pair.value)?;
            let datum = if self.pk_status == PkStatus::Unsigned {
                Datum::UInt(handle as u64)
            } else {
                Datum::Int(handle)
            };
            values.push(encoded(&datum));
        }
        Ok(values)
    }

    fn fill_rows(&mut self) -> Result<()> {
        while self.range_cursor < self.kv_ranges.len() {
            let range = self.kv_ranges[self.range_cursor].clone();
            if self.is_point(&range) {
                self.fill_from_point(&range)?;
                self.range_cursor += 1;
                self.seek_key = None;
            } else {
                self.fill_from_range(&range)?;
                if self.rows.is_empty() {
                    self.range_cursor += 1;
                    self.seek_key = None;
                    self.range_done = false;
                }
            }
            if !self.rows.is_empty() {
                return Ok(());
            }
        }
        Ok(())
    }

    fn fill_from_point(&mut self, range: &KeyRange) -> Result<()> {
        let Some(value) = self.engine.get(&self.region, &range.start, self.start_ts)? else {
            return Ok(());
        };
        if value.is_empty() {
            return Ok(());
        }
        let row = self.decode_index_kv(&KvPair {
            key: range.start.clone(),
            value,
        })?;
        self.counts[self.range_cursor] += 1;
        self.rows.push_back(row);
        Ok(())
    }

    fn fill_from_range(&mut self, range: &KeyRange) -> Result<()> {
        if self.range_done {
            return Ok(());
        }
        let pairs = if self.desc {
            let upper = match &self.seek_key {
                Some(key) => prefix_next(key),
                None => range.end.clone(),
            };
            self.engine
                .reverse_scan(&self.region, &range.start, &upper, SCAN_CHUNK, self.start_ts)?
        } else {
            let lower = match &self.seek_key {
                Some(key) => key.clone(),
                None => range.start.clone(),
            };
            self.engine
                .scan(&self.region, &lower, &range.end, SCAN_CHUNK, self.start_ts)?
        };
        if pairs.is_empty() {
            return Ok(());
        }
        let last_key = pairs[pairs.len() - 1].key.clone();
        for pair in &pairs {
            let row = self.decode_index_kv(pair)?;
            self.counts[self.range_cursor] += 1;
            self.rows.push_back(row);
        }
        if self.desc {
            match prefix_prev(&last_key) {
                Some(prev) => self.seek_key = Some(prev),
                None => self.range_done = true,
            }
        } else {
            self.seek_key = Some(prefix_next(&last_key));
        }
        Ok(())
    }
}

impl Executor for IndexScanExec {
    fn next(&mut self) -> Result<Option<OutputRow>> {
        loop {
            if let Some(row) = self.rows.pop_front() {
                return Ok(Some(row));
            }
            self.fill_rows()?;
            if self.rows.is_empty() {
                return Ok(None);
            }
        }
    }

    fn cursor(&self) -> (Vec<u8>, bool) {
        if let Some(seek_key) = &self.seek_key {
            return (seek_key.clone(), self.desc);
        }
        if let Some(range) = self.kv_ranges.get(self.range_cursor) {
            if self.is_point(range) || !self.desc {
                return (range.start.clone(), self.desc);
            }
            return (range.end.clone(), self.desc);
        }
        match self.kv_ranges.last() {
            Some(last) if self.desc => (last.start.clone(), self.desc),
            Some(last) => (last.end.clone(), self.desc),
            None => (Vec::new(), self.desc),
        }
    }

    fn reset_counts(&mut self) {
        self.counts_start = self.range_cursor;
        if let Some(slot) = self.counts.get_mut(self.counts_start) {
            *slot = 0;
        }
    }

    fn counts(&self) -> &[i64] {
        if self.seek_key.is_none() {
            &self.counts[self.counts_start..self.range_cursor]
        } else {
            &self.counts[self.counts_start..self.range_cursor + 1]
        }
    }
}
