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

//! Per-operation caller context
//!
//! Write operations carry an [`OpContext`] so that blocking waits (latch
//! acquisition) can observe cancellation and bail out without mutating
//! state. Reads never suspend and do not take a context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Caller context for cancellable operations.
///
/// Cloning shares the underlying token: cancelling any clone cancels all.
#[derive(Clone, Debug, Default)]
pub struct OpContext {
    cancelled: Arc<AtomicBool>,
}

impl OpContext {
    /// Creates a fresh, non-cancelled context
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Waits in progress return `Error::Cancelled`;
    /// writes already handed to the write worker are not undone.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns true once `cancel` has been called
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
