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

//! Record and index key codec
//!
//! Record keys: `['t'][table_id]['r'][handle]`, both numbers in
//! order-preserving form so handle order equals key order. Index keys:
//! `['t'][table_id]['i'][index_id][datum...]` with the row handle either
//! stored in the value (unique index) or appended as a trailing encoded
//! datum. Row values are flat `[col_id datum][value datum]` pairs.

use rustc_hash::FxHashMap;

use crate::core::{Error, Result};
use crate::executor::datum::{datum_len, encode_datum, encoded, Datum, NIL_FLAG};
use crate::executor::{ColumnInfo, OutputRow};

const TABLE_PREFIX: u8 = b't';
const RECORD_SEP: u8 = b'r';
const INDEX_SEP: u8 = b'i';

/// Record-key length: prefix byte + table id + separator + handle
const RECORD_KEY_LEN: usize = 1 + 8 + 1 + 8;

/// Index-key prefix length before the first column datum
const INDEX_PREFIX_LEN: usize = 1 + 8 + 1 + 8;

/// Column id of the synthesised handle column when the table has no
/// integer primary key
pub const EXTRA_HANDLE_COL_ID: i64 = -1;

#[inline]
fn comparable_i64(v: i64) -> [u8; 8] {
    ((v as u64) ^ (1 << 63)).to_be_bytes()
}

#[inline]
fn decode_comparable_i64(raw: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&raw[..8]);
    (u64::from_be_bytes(buf) ^ (1 << 63)) as i64
}

/// Key of the row with the given handle
pub fn encode_record_key(table_id: i64, handle: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(RECORD_KEY_LEN);
    key.push(TABLE_PREFIX);
    key.extend_from_slice(&comparable_i64(table_id));
    key.push(RECORD_SEP);
    key.extend_from_slice(&comparable_i64(handle));
    key
}

/// Smallest record key of a table, for building scan ranges
pub fn record_prefix(table_id: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 8 + 1);
    key.push(TABLE_PREFIX);
    key.extend_from_slice(&comparable_i64(table_id));
    key.push(RECORD_SEP);
    key
}

/// Extracts the row handle from a record key
pub fn decode_record_key(key: &[u8]) -> Result<i64> {
    if key.len() != RECORD_KEY_LEN || key[0] != TABLE_PREFIX || key[9] != RECORD_SEP {
        return Err(Error::decode("malformed record key"));
    }
    Ok(decode_comparable_i64(&key[10..]))
}

/// Smallest index key of `(table_id, index_id)`, for building scan ranges
pub fn index_prefix(table_id: i64, index_id: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(INDEX_PREFIX_LEN);
    key.push(TABLE_PREFIX);
    key.extend_from_slice(&comparable_i64(table_id));
    key.push(INDEX_SEP);
    key.extend_from_slice(&comparable_i64(index_id));
    key
}

/// Builds an index key from column datums, appending the handle as a
/// trailing datum for non-unique indexes
pub fn encode_index_key(
    table_id: i64,
    index_id: i64,
    values: &[Datum],
    handle: Option<i64>,
) -> Vec<u8> {
    let mut key = index_prefix(table_id, index_id);
    for value in values {
        encode_datum(&mut key, value);
    }
    if let Some(handle) = handle {
        encode_datum(&mut key, &Datum::Int(handle));
    }
    key
}

/// Cuts an index key into its first `cols_len` column datums plus the
/// raw remainder (the trailing handle datum, or empty for unique keys)
pub fn cut_index_key(key: &[u8], cols_len: usize) -> Result<(Vec<Vec<u8>>, Vec<u8>)> {
    if key.len() < INDEX_PREFIX_LEN {
        return Err(Error::decode("index key shorter than prefix"));
    }
    let mut rest = &key[INDEX_PREFIX_LEN..];
    let mut values = Vec::with_capacity(cols_len);
    for _ in 0..cols_len {
        let len = datum_len(rest)?;
        values.push(rest[..len].to_vec());
        rest = &rest[len..];
    }
    Ok((values, rest.to_vec()))
}

/// The value stored under a unique index key: the raw big-endian handle
pub fn encode_index_value(handle: i64) -> Vec<u8> {
    handle.to_be_bytes().to_vec()
}

/// Decodes the handle out of a unique index value
pub fn decode_handle(value: &[u8]) -> Result<i64> {
    if value.len() != 8 {
        return Err(Error::decode("index value is not a handle"));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(value);
    Ok(i64::from_be_bytes(buf))
}

/// Encodes a row as `[col_id][value]` datum pairs
pub fn encode_row(col_ids: &[i64], values: &[Datum]) -> Result<Vec<u8>> {
    if col_ids.len() != values.len() {
        return Err(Error::decode("row column/value arity mismatch"));
    }
    let mut buf = Vec::new();
    for (col_id, value) in col_ids.iter().zip(values) {
        encode_datum(&mut buf, &Datum::Int(*col_id));
        encode_datum(&mut buf, value);
    }
    Ok(buf)
}

/// Cuts a row value into per-column slices positioned by `col_offsets`
/// (column id to output slot). Columns absent from the row stay `None`.
pub fn cut_row(
    raw: &[u8],
    col_offsets: &FxHashMap<i64, usize>,
    out_len: usize,
) -> Result<Vec<Option<Vec<u8>>>> {
    let mut out = vec![None; out_len];
    let mut rest = raw;
    while !rest.is_empty() {
        let (id, used) = crate::executor::datum::decode_datum(rest)?;
        rest = &rest[used..];
        let Datum::Int(col_id) = id else {
            return Err(Error::decode("row column id is not an integer"));
        };
        let len = datum_len(rest)?;
        if let Some(&offset) = col_offsets.get(&col_id) {
            out[offset] = Some(rest[..len].to_vec());
        }
        rest = &rest[len..];
    }
    Ok(out)
}

/// Materialises one output row from raw row bytes: cuts stored columns,
/// synthesises the handle column, and fills gaps from declared defaults
/// or NULL
pub fn build_row(
    columns: &[ColumnInfo],
    col_offsets: &FxHashMap<i64, usize>,
    handle: i64,
    raw: &[u8],
) -> Result<OutputRow> {
    let mut values = cut_row(raw, col_offsets, columns.len())?;
    for column in columns {
        let Some(&offset) = col_offsets.get(&column.col_id) else {
            continue;
        };
        if column.pk_handle || column.col_id == EXTRA_HANDLE_COL_ID {
            let datum = if column.unsigned {
                Datum::UInt(handle as u64)
            } else {
                Datum::Int(handle)
            };
            values[offset] = Some(encoded(&datum));
            continue;
        }
        if values[offset].is_some() {
            continue;
        }
        if !column.default_value.is_empty() {
            values[offset] = Some(column.default_value.clone());
            continue;
        }
        if column.not_null {
            return Err(Error::decode(format!(
                "missing value for non-null column {}",
                column.col_id
            )));
        }
        values[offset] = Some(vec![NIL_FLAG]);
    }
    Ok(values
        .into_iter()
        .map(|v| v.unwrap_or_else(|| vec![NIL_FLAG]))
        .collect())
}

/// Output slot per column id, in declaration order
pub fn column_offsets(columns: &[ColumnInfo]) -> FxHashMap<i64, usize> {
    columns
        .iter()
        .enumerate()
        .map(|(offset, column)| (column.col_id, offset))
        .collect()
}
