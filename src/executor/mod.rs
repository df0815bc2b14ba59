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

//! Coprocessor-style query executors
//!
//! Pull-model operator pipeline over MVCC snapshot reads: a scan leaf
//! (table or index) feeds selection, limit and top-N operators, each
//! owning its source exclusively. Rows travel as on-wire column values;
//! decoding to datums happens only where expressions are evaluated.

pub mod datum;
pub mod expression;
pub mod index_scan;
pub mod limit;
pub mod selection;
pub mod table_codec;
pub mod table_scan;
pub mod topn;

pub use datum::{Datum, FieldType};
pub use expression::{CmpOp, Expr};
pub use index_scan::{IndexScanExec, PkStatus};
pub use limit::LimitExec;
pub use selection::SelectionExec;
pub use table_scan::TableScanExec;
pub use topn::{OrderBy, TopNExec};

use crate::core::Result;
use crate::mvcc::codec::prefix_next;

/// Rows are pulled from scan leaves in chunks of this many keys, the
/// cursor advancing by prefix arithmetic on the last returned key
pub const SCAN_CHUNK: usize = 128;

/// One output row: each slot is a datum-encoded column value
pub type OutputRow = Vec<Vec<u8>>;

/// Half-open key range `[start, end)` pushed down to a scan leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub start: Vec<u8>,
    pub end: Vec<u8>,
}

impl KeyRange {
    pub fn new(start: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// The range that covers exactly one key
    pub fn point(key: impl Into<Vec<u8>>) -> Self {
        let start = key.into();
        let end = prefix_next(&start);
        Self { start, end }
    }

    pub fn is_point(&self) -> bool {
        self.end == prefix_next(&self.start)
    }
}

/// Pull-model operator interface.
///
/// `cursor` reports the key the next pull would scan from together with
/// the direction flag, so a streaming caller can resume a chunked
/// response where it stopped. Per-range counters support cost accounting;
/// non-leaf operators delegate both to their source.
pub trait Executor {
    /// Returns the next row, or `None` once the operator is exhausted
    fn next(&mut self) -> Result<Option<OutputRow>>;

    /// The resume position: `(seek key, descending)`
    fn cursor(&self) -> (Vec<u8>, bool);

    /// Restarts per-range row counting at the current range
    fn reset_counts(&mut self);

    /// Rows produced per KV range since the last reset
    fn counts(&self) -> &[i64];
}

/// Schema of one output column as declared by the pushdown request
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub col_id: i64,
    pub field_type: FieldType,
    /// This column is the row handle itself
    pub pk_handle: bool,
    /// Synthesised handles decode as unsigned
    pub unsigned: bool,
    pub not_null: bool,
    /// Datum-encoded default, empty when the column has none
    pub default_value: Vec<u8>,
}

impl ColumnInfo {
    pub fn new(col_id: i64, field_type: FieldType) -> Self {
        Self {
            col_id,
            field_type,
            pk_handle: false,
            unsigned: false,
            not_null: false,
            default_value: Vec::new(),
        }
    }

    pub fn handle(col_id: i64) -> Self {
        Self {
            pk_handle: true,
            ..Self::new(col_id, FieldType::Int)
        }
    }
}
