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

//! Single-writer background worker
//!
//! All durable writes funnel through one background thread, which applies
//! batches to the store in submission order. Submitters block until their
//! batch is acknowledged, so a successful write call means the batch is
//! visible to subsequent read views. Atomicity holds per batch; there are
//! no cross-batch guarantees beyond FIFO order.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use tracing::warn;

use crate::core::{Error, Result};
use crate::storage::memstore::MemStore;
use crate::storage::write_batch::WriteBatch;

struct WriteJob {
    batch: WriteBatch,
    ack: Sender<Result<()>>,
}

/// Pending acknowledgement for a submitted batch
pub struct WriteAck {
    rx: Receiver<Result<()>>,
}

impl WriteAck {
    /// Blocks until the write worker has applied the batch
    pub fn wait(self) -> Result<()> {
        self.rx
            .recv()
            .unwrap_or_else(|_| Err(Error::Store("write worker stopped".into())))
    }
}

/// Handle to the background writer thread
pub struct WriteWorker {
    tx: Option<Sender<WriteJob>>,
    handle: Option<JoinHandle<()>>,
}

impl WriteWorker {
    /// Spawns the worker thread over the given store
    pub fn spawn(store: Arc<MemStore>) -> Self {
        let (tx, rx) = unbounded::<WriteJob>();
        let handle = std::thread::spawn(move || {
            for job in rx.iter() {
                let result = store.apply(&job.batch);
                if let Err(e) = &result {
                    warn!(error = %e, entries = job.batch.len(), "write batch failed");
                }
                // A dropped ack receiver just means the submitter went away.
                let _ = job.ack.send(result);
            }
        });
        Self {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    /// Hands a batch to the worker and returns a pending acknowledgement.
    /// Empty batches are acknowledged immediately without a round trip.
    pub fn submit(&self, batch: WriteBatch) -> Result<WriteAck> {
        let (ack_tx, ack_rx) = bounded(1);
        if batch.is_empty() {
            let _ = ack_tx.send(Ok(()));
            return Ok(WriteAck { rx: ack_rx });
        }
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| Error::Store("write worker stopped".into()))?;
        tx.send(WriteJob { batch, ack: ack_tx })
            .map_err(|_| Error::Store("write worker stopped".into()))?;
        Ok(WriteAck { rx: ack_rx })
    }

    /// Submits a batch and waits for it to be applied
    pub fn write(&self, batch: WriteBatch) -> Result<()> {
        self.submit(batch)?.wait()
    }
}

impl Drop for WriteWorker {
    fn drop(&mut self) {
        // Closing the channel drains remaining jobs, then the thread exits.
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
