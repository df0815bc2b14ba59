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

//! Limit operator

use crate::core::Result;
use crate::executor::{Executor, OutputRow};

/// Emits at most `limit` rows from its source
pub struct LimitExec {
    limit: u64,
    cursor: u64,
    src: Box<dyn Executor>,
}

impl LimitExec {
    pub fn new(src: Box<dyn Executor>, limit: u64) -> Self {
        Self {
            limit,
            cursor: 0,
            src,
        }
    }
}

impl Executor for LimitExec {
    fn next(&mut self) -> Result<Option<OutputRow>> {
        if self.cursor >= self.limit {
            return Ok(None);
        }
        let Some(value) = self.src.next()? else {
            return Ok(None);
        };
        self.cursor += 1;
        Ok(Some(value))
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
