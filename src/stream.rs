// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Lazy views over stored blocks handed to pipes.
//!
//! A [`BlockStream`] is computed from the metadata store when a node is
//! invoked: the blocks its upstream produced that the node has not consumed
//! yet, oldest first. Records stay in block storage until the pipe asks for
//! them, and only blocks the pipe actually pulls are recorded as read.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::errors::StorageError;
use crate::model::{BlockId, DataBlock, Records};
use crate::storage::BlockStorage;

/// Blocks read by the running node since its last commit.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReadLog(Arc<Mutex<Vec<BlockId>>>);

impl ReadLog {
    pub(crate) fn record(&self, id: &BlockId) {
        let mut reads = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !reads.contains(id) {
            reads.push(id.clone());
        }
    }

    /// Drain the reads recorded so far, in first-read order.
    pub(crate) fn take(&self) -> Vec<BlockId> {
        let mut reads = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *reads)
    }

    /// Forget reads without committing them.
    pub(crate) fn discard(&self) {
        self.take();
    }
}

/// A stored block plus a lazy handle on its records.
#[derive(Clone)]
pub struct ManagedBlock {
    metadata: DataBlock,
    storage: Arc<dyn BlockStorage>,
    reads: ReadLog,
    record_on_access: bool,
}

impl ManagedBlock {
    /// A block whose consumption was already recorded when it was handed out.
    pub(crate) fn consumed(metadata: DataBlock, storage: Arc<dyn BlockStorage>) -> Self {
        Self {
            metadata,
            storage,
            reads: ReadLog::default(),
            record_on_access: false,
        }
    }

    /// A block that is recorded as read only if the pipe loads its records.
    pub(crate) fn reference(
        metadata: DataBlock,
        storage: Arc<dyn BlockStorage>,
        reads: ReadLog,
    ) -> Self {
        Self {
            metadata,
            storage,
            reads,
            record_on_access: true,
        }
    }

    pub fn metadata(&self) -> &DataBlock {
        &self.metadata
    }

    pub fn id(&self) -> &BlockId {
        &self.metadata.id
    }

    pub fn record_count(&self) -> usize {
        self.metadata.record_count
    }

    pub fn schema_key(&self) -> &str {
        &self.metadata.realized_schema_key
    }

    /// Load the block's records from storage.
    pub fn records(&self) -> Result<Records, StorageError> {
        if self.record_on_access {
            self.reads.record(&self.metadata.id);
        }
        self.storage.read(&self.metadata.storage_ref)
    }
}

impl fmt::Debug for ManagedBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedBlock")
            .field("id", &self.metadata.id)
            .field("record_count", &self.metadata.record_count)
            .field("storage", &self.storage.class())
            .finish()
    }
}

/// Unconsumed upstream blocks, yielded oldest first.
pub struct BlockStream {
    pending: VecDeque<DataBlock>,
    storage: Arc<dyn BlockStorage>,
    reads: ReadLog,
}

impl BlockStream {
    pub(crate) fn new(blocks: Vec<DataBlock>, storage: Arc<dyn BlockStorage>, reads: ReadLog) -> Self {
        Self {
            pending: blocks.into(),
            storage,
            reads,
        }
    }

    /// Blocks not pulled yet.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Metadata of the next block without pulling it.
    pub fn peek(&self) -> Option<&DataBlock> {
        self.pending.front()
    }

    /// Pull every remaining block and concatenate their records.
    pub fn read_all(&mut self) -> Result<Records, StorageError> {
        let mut records = Records::new();
        for block in self.by_ref() {
            records.extend(block.records()?);
        }
        Ok(records)
    }
}

impl Iterator for BlockStream {
    type Item = ManagedBlock;

    fn next(&mut self) -> Option<Self::Item> {
        let metadata = self.pending.pop_front()?;
        self.reads.record(&metadata.id);
        Some(ManagedBlock::consumed(metadata, Arc::clone(&self.storage)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.pending.len(), Some(self.pending.len()))
    }
}

impl fmt::Debug for BlockStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockStream")
            .field("remaining", &self.pending.len())
            .finish()
    }
}
