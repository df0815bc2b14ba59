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

//! Table scan leaf
//!
//! Walks the declared KV ranges in order, issuing point Gets for
//! single-key ranges and chunked snapshot scans otherwise. Row bytes are
//! decoded into the declared column order, synthesising the handle
//! column and declared defaults.

use std::collections::VecDeque;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::core::Result;
use crate::executor::table_codec::{build_row, column_offsets, decode_record_key};
use crate::executor::{ColumnInfo, Executor, KeyRange, OutputRow, SCAN_CHUNK};
use crate::mvcc::codec::{prefix_next, prefix_prev};
use crate::mvcc::MvccEngine;
use crate::region::RegionCtx;

pub struct TableScanExec {
    engine: Arc<MvccEngine>,
    region: Arc<RegionCtx>,
    columns: Vec<ColumnInfo>,
    col_offsets: FxHashMap<i64, usize>,
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

impl TableScanExec {
    pub fn new(
        engine: Arc<MvccEngine>,
        region: Arc<RegionCtx>,
        columns: Vec<ColumnInfo>,
        kv_ranges: Vec<KeyRange>,
        start_ts: u64,
        desc: bool,
    ) -> Self {
        let col_offsets = column_offsets(&columns);
        let counts = vec![0; kv_ranges.len()];
        Self {
            engine,
            region,
            columns,
            col_offsets,
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

    fn fill_rows(&mut self) -> Result<()> {
        while self.range_cursor < self.kv_ranges.len() {
            let range = self.kv_ranges[self.range_cursor].clone();
            if range.is_point() {
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
        let handle = decode_record_key(&range.start)?;
        let row = build_row(&self.columns, &self.col_offsets, handle, &value)?;
        self.counts[self.range_cursor] += 1;
        self.rows.push_back(row);
        Ok(())
    }

    fn fill_from_range(&mut self, range: &KeyRange) -> Result<()> {
        if self.range_done {
            return Ok(());
        }
        let pairs = if self.desc {
            // A stored seek key is the inclusive upper resume point; the
            // scan itself takes an exclusive bound.
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
            let handle = decode_record_key(&pair.key)?;
            let row = build_row(&self.columns, &self.col_offsets, handle, &pair.value)?;
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

impl Executor for TableScanExec {
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
            if range.is_point() || !self.desc {
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
