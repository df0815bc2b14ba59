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

//! On-disk record codec
//!
//! Two logical namespaces share one ordered key space:
//!
//! - *Latest*: `user_key -> mixed record`, a self-describing structure
//!   holding at most one lock and at most one latest committed value,
//!   with a one-byte flag header mirrored into the entry's user meta.
//! - *Old*: `user_key || be_u64(!commit_ts) -> value payload`. The
//!   complemented suffix makes newer versions sort first inside a user
//!   key's prefix, so a forward seek lands on the newest visible version.

use crate::core::{Error, Result};

/// Flag bit: the mixed record carries a lock
pub const LOCK_FLAG: u8 = 1 << 0;
/// Flag bit: the mixed record carries a latest committed value
pub const VALUE_FLAG: u8 = 1 << 1;
/// Flag bit: the latest committed value is a tombstone
pub const DEL_FLAG: u8 = 1 << 2;

/// Length of the complemented commit-ts suffix on old-version keys
pub const OLD_KEY_SUFFIX_LEN: usize = 8;

/// Mutation / lock operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    Put = 1,
    Del = 2,
    Lock = 3,
    Rollback = 4,
    Insert = 5,
}

impl Op {
    fn from_u8(v: u8) -> Result<Op> {
        match v {
            1 => Ok(Op::Put),
            2 => Ok(Op::Del),
            3 => Ok(Op::Lock),
            4 => Ok(Op::Rollback),
            5 => Ok(Op::Insert),
            other => Err(Error::decode(format!("unknown op {other}"))),
        }
    }
}

/// Kind of a committed value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueType {
    Put = 1,
    Delete = 2,
}

impl ValueType {
    fn from_u8(v: u8) -> Result<ValueType> {
        match v {
            1 => Ok(ValueType::Put),
            2 => Ok(ValueType::Delete),
            other => Err(Error::decode(format!("unknown value type {other}"))),
        }
    }
}

/// A transaction lock embedded in a mixed record.
///
/// `rollback_ts` piggy-backs a rollback marker of a *newer* transaction
/// onto the lock of an older one; commit downgrades such a lock to a
/// standalone rollback marker instead of clearing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    pub start_ts: u64,
    pub primary: Vec<u8>,
    pub value: Vec<u8>,
    pub op: Op,
    pub ttl: u64,
    pub rollback_ts: u64,
}

impl Lock {
    /// A standalone rollback marker for `start_ts`
    pub fn rollback_marker(start_ts: u64) -> Lock {
        Lock {
            start_ts,
            primary: Vec::new(),
            value: Vec::new(),
            op: Op::Rollback,
            ttl: 0,
            rollback_ts: 0,
        }
    }
}

/// A committed value, either latest (inside a mixed record) or an
/// old-version payload keyed by its complemented commit timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    pub value_type: ValueType,
    pub start_ts: u64,
    pub commit_ts: u64,
    pub value: Vec<u8>,
}

/// The latest-namespace record: flag header plus optional lock and value.
///
/// The flag byte is kept in sync by `set_lock`/`clear_lock`/`set_value`
/// and mirrored into the backing-store entry's user meta so scans and GC
/// can filter without a full decode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MixedRecord {
    pub flags: u8,
    pub lock: Option<Lock>,
    pub value: Option<Value>,
}

impl MixedRecord {
    pub fn has_lock(&self) -> bool {
        self.flags & LOCK_FLAG != 0
    }

    pub fn has_value(&self) -> bool {
        self.flags & VALUE_FLAG != 0
    }

    /// True when the latest committed value is a tombstone
    pub fn is_delete(&self) -> bool {
        self.flags & DEL_FLAG != 0 && self.has_value()
    }

    /// True when the record carries neither lock nor value
    pub fn is_empty(&self) -> bool {
        self.flags & (LOCK_FLAG | VALUE_FLAG) == 0
    }

    pub fn set_lock(&mut self, lock: Lock) {
        self.flags |= LOCK_FLAG;
        self.lock = Some(lock);
    }

    pub fn clear_lock(&mut self) {
        self.flags &= !LOCK_FLAG;
        self.lock = None;
    }

    pub fn set_value(&mut self, value: Value) {
        self.flags |= VALUE_FLAG;
        if value.value_type == ValueType::Delete {
            self.flags |= DEL_FLAG;
        } else {
            self.flags &= !DEL_FLAG;
        }
        self.value = Some(value);
    }

    /// Serialises the record: `[flags][lock?][value?]`, value last so its
    /// bytes run to the end of the buffer
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + 64);
        buf.push(self.flags);
        if let Some(lock) = &self.lock {
            encode_lock(&mut buf, lock);
        }
        if let Some(value) = &self.value {
            encode_value_into(&mut buf, value);
        }
        buf
    }
}

/// Decodes a mixed record, enforcing `decode(encode(x)) == x`
pub fn decode_mixed(raw: &[u8]) -> Result<MixedRecord> {
    let mut r = ByteReader::new(raw);
    let flags = r.read_u8()?;
    let lock = if flags & LOCK_FLAG != 0 {
        Some(decode_lock(&mut r)?)
    } else {
        None
    };
    let value = if flags & VALUE_FLAG != 0 {
        Some(decode_value_from(&mut r)?)
    } else {
        None
    };
    if !r.is_empty() {
        return Err(Error::decode("trailing bytes after mixed record"));
    }
    Ok(MixedRecord { flags, lock, value })
}

fn encode_lock(buf: &mut Vec<u8>, lock: &Lock) {
    buf.extend_from_slice(&lock.start_ts.to_be_bytes());
    buf.extend_from_slice(&lock.ttl.to_be_bytes());
    buf.extend_from_slice(&lock.rollback_ts.to_be_bytes());
    buf.push(lock.op as u8);
    buf.extend_from_slice(&(lock.primary.len() as u32).to_be_bytes());
    buf.extend_from_slice(&lock.primary);
    buf.extend_from_slice(&(lock.value.len() as u32).to_be_bytes());
    buf.extend_from_slice(&lock.value);
}

fn decode_lock(r: &mut ByteReader<'_>) -> Result<Lock> {
    let start_ts = r.read_u64()?;
    let ttl = r.read_u64()?;
    let rollback_ts = r.read_u64()?;
    let op = Op::from_u8(r.read_u8()?)?;
    let primary_len = r.read_u32()? as usize;
    let primary = r.read_bytes(primary_len)?.to_vec();
    let value_len = r.read_u32()? as usize;
    let value = r.read_bytes(value_len)?.to_vec();
    Ok(Lock {
        start_ts,
        primary,
        value,
        op,
        ttl,
        rollback_ts,
    })
}

fn encode_value_into(buf: &mut Vec<u8>, value: &Value) {
    buf.push(value.value_type as u8);
    buf.extend_from_slice(&value.start_ts.to_be_bytes());
    buf.extend_from_slice(&value.commit_ts.to_be_bytes());
    buf.extend_from_slice(&value.value);
}

fn decode_value_from(r: &mut ByteReader<'_>) -> Result<Value> {
    let value_type = ValueType::from_u8(r.read_u8()?)?;
    let start_ts = r.read_u64()?;
    let commit_ts = r.read_u64()?;
    let value = r.read_rest().to_vec();
    Ok(Value {
        value_type,
        start_ts,
        commit_ts,
        value,
    })
}

/// Serialises an old-version value payload
pub fn encode_value(value: &Value) -> Vec<u8> {
    let mut buf = Vec::with_capacity(17 + value.value.len());
    encode_value_into(&mut buf, value);
    buf
}

/// Decodes an old-version value payload
pub fn decode_value(raw: &[u8]) -> Result<Value> {
    let mut r = ByteReader::new(raw);
    decode_value_from(&mut r)
}

/// Encodes an old-version key: `key || be_u64(!ts)`. Complementing the
/// timestamp makes larger (newer) versions sort first within the prefix.
pub fn encode_old_key(key: &[u8], ts: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(key.len() + OLD_KEY_SUFFIX_LEN);
    buf.extend_from_slice(key);
    buf.extend_from_slice(&(!ts).to_be_bytes());
    buf
}

/// Extracts the commit timestamp from an old-version key suffix
pub fn old_key_ts(encoded: &[u8]) -> Result<u64> {
    if encoded.len() < OLD_KEY_SUFFIX_LEN {
        return Err(Error::decode("old-version key shorter than suffix"));
    }
    let mut suffix = [0u8; OLD_KEY_SUFFIX_LEN];
    suffix.copy_from_slice(&encoded[encoded.len() - OLD_KEY_SUFFIX_LEN..]);
    Ok(!u64::from_be_bytes(suffix))
}

/// True if `encoded` is an old-version key of exactly this user key
pub fn is_old_version_of(encoded: &[u8], user_key: &[u8]) -> bool {
    encoded.len() == user_key.len() + OLD_KEY_SUFFIX_LEN && encoded.starts_with(user_key)
}

/// True iff the version in the old-key suffix is visible at `start_ts`
pub fn is_visible_key(encoded: &[u8], start_ts: u64) -> bool {
    match old_key_ts(encoded) {
        Ok(ts) => ts <= start_ts,
        Err(_) => false,
    }
}

/// The smallest byte string strictly greater than every string prefixed
/// by `key`. Used to advance forward-scan cursors past the last returned
/// key.
pub fn prefix_next(key: &[u8]) -> Vec<u8> {
    let mut buf = key.to_vec();
    for i in (0..buf.len()).rev() {
        buf[i] = buf[i].wrapping_add(1);
        if buf[i] != 0 {
            return buf;
        }
    }
    // All bytes carried: no sibling prefix exists above, extend instead.
    buf.copy_from_slice(key);
    buf.push(0);
    buf
}

/// Reverse counterpart of `prefix_next`: decrements trailing bytes,
/// borrowing through underflow. Returns `None` when `key` is all zeroes.
pub fn prefix_prev(key: &[u8]) -> Option<Vec<u8>> {
    let mut buf = key.to_vec();
    for i in (0..buf.len()).rev() {
        buf[i] = buf[i].wrapping_sub(1);
        if buf[i] != 0xFF {
            return Some(buf);
        }
    }
    None
}

struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn read_u8(&mut self) -> Result<u8> {
        let b = self.read_bytes(1)?;
        Ok(b[0])
    }

    fn read_u32(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let b = self.read_bytes(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_be_bytes(arr))
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.pos + len > self.buf.len() {
            return Err(Error::decode("record truncated"));
        }
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn read_rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }
}
