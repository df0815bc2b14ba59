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

//! Top-N operator
//!
//! Fully drains its source, keeping the best `n` rows in a bounded
//! max-heap keyed by the compound order expression, then emits them in
//! sorted order. Because it must block on the full input, top-N does not
//! participate in streaming resumption.

use std::cmp::Ordering;

use crate::core::Result;
use crate::executor::datum::{cmp_datum, Datum};
use crate::executor::expression::{related_columns, Expr};
use crate::executor::selection::decode_related_columns;
use crate::executor::{Executor, OutputRow};

/// One component of the compound order key
#[derive(Debug, Clone)]
pub struct OrderBy {
    pub expr: Expr,
    pub desc: bool,
}

struct SortRow {
    key: Vec<Datum>,
    data: OutputRow,
}

/// Compound-key comparison honouring per-column direction
fn cmp_keys(descs: &[bool], a: &[Datum], b: &[Datum]) -> Ordering {
    for (i, desc) in descs.iter().enumerate() {
        let ord = cmp_datum(&a[i], &b[i]);
        let ord = if *desc { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Bounded max-heap over sort keys: the root is the worst row kept, so a
/// better candidate replaces it in O(log n)
struct TopNHeap {
    rows: Vec<SortRow>,
    limit: usize,
    descs: Vec<bool>,
}

impl TopNHeap {
    fn new(limit: usize, descs: Vec<bool>) -> Self {
        Self {
            rows: Vec::with_capacity(limit.min(1024)),
            limit,
            descs,
        }
    }

    fn cmp_keys(&self, a: &[Datum], b: &[Datum]) -> Ordering {
        cmp_keys(&self.descs, a, b)
    }

    fn try_add(&mut self, row: SortRow) {
        if self.limit == 0 {
            return;
        }
        if self.rows.len() < self.limit {
            self.rows.push(row);
            self.sift_up(self.rows.len() - 1);
        } else if self.cmp_keys(&row.key, &self.rows[0].key) == Ordering::Less {
            self.rows[0] = row;
            self.sift_down(0);
        }
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.cmp_keys(&self.rows[i].key, &self.rows[parent].key) != Ordering::Greater {
                break;
            }
            self.rows.swap(i, parent);
            i = parent;
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        loop {
            let mut largest = i;
            for child in [2 * i + 1, 2 * i + 2] {
                if child < self.rows.len()
                    && self.cmp_keys(&self.rows[child].key, &self.rows[largest].key)
                        == Ordering::Greater
                {
                    largest = child;
                }
            }
            if largest == i {
                return;
            }
            self.rows.swap(i, largest);
            i = largest;
        }
    }

    fn into_sorted(self) -> Vec<SortRow> {
        let TopNHeap {
            mut rows, descs, ..
        } = self;
        rows.sort_by(|a, b| cmp_keys(&descs, &a.key, &b.key));
        rows
    }
}

pub struct TopNExec {
    order_by: Vec<OrderBy>,
    related_offsets: Vec<usize>,
    row_buf: Vec<Datum>,
    heap: Option<TopNHeap>,
    sorted: Vec<SortRow>,
    cursor: usize,
    executed: bool,
    src: Box<dyn Executor>,
}

impl TopNExec {
    pub fn new(src: Box<dyn Executor>, order_by: Vec<OrderBy>, limit: usize, num_columns: usize) -> Self {
        let exprs: Vec<Expr> = order_by.iter().map(|o| o.expr.clone()).collect();
        let related_offsets = related_columns(&exprs);
        let descs = order_by.iter().map(|o| o.desc).collect();
        Self {
            order_by,
            related_offsets,
            row_buf: vec![Datum::Null; num_columns],
            heap: Some(TopNHeap::new(limit, descs)),
            sorted: Vec::new(),
            cursor: 0,
            executed: false,
            src,
        }
    }

    fn drain_source(&mut self) -> Result<()> {
        while let Some(value) = self.src.next()? {
            decode_related_columns(&self.related_offsets, &value, &mut self.row_buf)?;
            let mut key = Vec::with_capacity(self.order_by.len());
            for order in &self.order_by {
                key.push(order.expr.eval(&self.row_buf)?);
            }
            if let Some(heap) = self.heap.as_mut() {
                heap.try_add(SortRow { key, data: value });
            }
        }
        if let Some(heap) = self.heap.take() {
            self.sorted = heap.into_sorted();
        }
        Ok(())
    }
}

impl Executor for TopNExec {
    fn next(&mut self) -> Result<Option<OutputRow>> {
        if !self.executed {
            self.drain_source()?;
            self.executed = true;
        }
        if self.cursor >= self.sorted.len() {
            return Ok(None);
        }
        let row = std::mem::take(&mut self.sorted[self.cursor].data);
        self.cursor += 1;
        Ok(Some(row))
    }

    fn cursor(&self) -> (Vec<u8>, bool) {
        panic!("top-n blocks on its full input and has no streaming cursor");
    }

    fn reset_counts(&mut self) {
        self.src.reset_counts();
    }

    fn counts(&self) -> &[i64] {
        self.src.counts()
    }
}
