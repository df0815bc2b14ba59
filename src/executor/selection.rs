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

//! Selection operator
//!
//! Pulls rows from its source and emits those for which every predicate
//! of the conjunction is truthy. Only the columns the predicates read
//! are decoded; the row passes through in its encoded form.

use crate::core::Result;
use crate::executor::datum::{decode_datum, Datum};
use crate::executor::expression::{eval_bool, related_columns, Expr};
use crate::executor::{Executor, OutputRow};

pub struct SelectionExec {
    conditions: Vec<Expr>,
    related_offsets: Vec<usize>,
    row_buf: Vec<Datum>,
    src: Box<dyn Executor>,
}

impl SelectionExec {
    pub fn new(src: Box<dyn Executor>, conditions: Vec<Expr>, num_columns: usize) -> Self {
        let related_offsets = related_columns(&conditions);
        Self {
            conditions,
            related_offsets,
            row_buf: vec![Datum::Null; num_columns],
            src,
        }
    }
}

/// Decodes the listed column slots of an encoded row into the buffer
pub(super) fn decode_related_columns(
    offsets: &[usize],
    value: &OutputRow,
    row_buf: &mut [Datum],
) -> Result<()> {
    for &offset in offsets {
        let raw = value
            .get(offset)
            .ok_or_else(|| crate::core::Error::decode("row narrower than expression"))?;
        let slot = row_buf
            .get_mut(offset)
            .ok_or_else(|| crate::core::Error::decode("row buffer narrower than expression"))?;
        *slot = decode_datum(raw)?.0;
    }
    Ok(())
}

impl Executor for SelectionExec {
    fn next(&mut self) -> Result<Option<OutputRow>> {
        loop {
            let Some(value) = self.src.next()? else {
                return Ok(None);
            };
            decode_related_columns(&self.related_offsets, &value, &mut self.row_buf)?;
            if eval_bool(&self.conditions, &self.row_buf)? {
                return Ok(Some(value));
            }
        }
    }

    fn cursor(&self) -> (Vec<u8>, bool) {
        self.src.cursor()
    }

    fn reset_counts(&mut self) {
        self.src.reset_counts();
    }

    fn counts(&self) -> &[i64] {
        self.src.counts()
    }
}
