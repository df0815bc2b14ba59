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

//! Error types for StrataKV
//!
//! Per-key transaction errors (`KeyIsLocked`, `WriteConflict`, `Aborted`,
//! `AlreadyCommitted`, `LockNotFound`, `Replaced`) are recoverable at the
//! client after lock resolution. The remaining variants surface as
//! region-level failures.

use thiserror::Error;

/// Result type alias for StrataKV operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for StrataKV storage operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // =========================================================================
    // Transaction errors (recoverable per key)
    // =========================================================================
    /// The key holds a live write lock of another transaction
    #[error("key is locked by transaction {start_ts} (ttl {ttl}ms)")]
    KeyIsLocked {
        key: Vec<u8>,
        start_ts: u64,
        primary: Vec<u8>,
        ttl: u64,
    },

    /// A newer commit landed after the reader's start_ts
    #[error("write conflict: transaction {start_ts} overlaps commit at {conflict_commit_ts}")]
    WriteConflict {
        start_ts: u64,
        conflict_commit_ts: u64,
    },

    /// The transaction can no longer proceed and must restart
    #[error("transaction aborted: {0}")]
    Aborted(String),

    /// The transaction already committed at the given timestamp
    #[error("already committed at {0}")]
    AlreadyCommitted(u64),

    /// Commit found neither a matching lock nor a committed trace
    #[error("lock not found")]
    LockNotFound,

    /// The lock was replaced by another transaction
    #[error("replaced by another transaction")]
    Replaced,

    /// Transient failure, the client may retry as-is
    #[error("retryable: {0}")]
    Retryable(String),

    // =========================================================================
    // Region-level errors
    // =========================================================================
    /// A stored record failed to decode
    #[error("decode error: {0}")]
    Decode(String),

    /// The caller cancelled the operation while it was waiting
    #[error("operation cancelled")]
    Cancelled,

    /// The backing store failed
    #[error("storage error: {0}")]
    Store(String),
}

impl Error {
    /// Shorthand for a retryable error with a detail message
    pub fn retryable(detail: impl Into<String>) -> Self {
        Error::Retryable(detail.into())
    }

    /// Shorthand for an abort with a reason
    pub fn aborted(reason: impl Into<String>) -> Self {
        Error::Aborted(reason.into())
    }

    /// Shorthand for a decode failure
    pub fn decode(detail: impl Into<String>) -> Self {
        Error::Decode(detail.into())
    }

    /// Returns true for errors the client can recover from by resolving
    /// locks or restarting the transaction, false for region-level failures
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::KeyIsLocked { .. }
                | Error::WriteConflict { .. }
                | Error::Aborted(_)
                | Error::AlreadyCommitted(_)
                | Error::LockNotFound
                | Error::Replaced
                | Error::Retryable(_)
        )
    }
}
