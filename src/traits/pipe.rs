// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::engine::PipeContext;
use crate::model::Records;
use crate::stream::{BlockStream, ManagedBlock};

/// One batch of output records; becomes one data block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub records: Records,
    /// Schema the pipe claims for these records, if any
    pub schema: Option<String>,
}

impl Batch {
    pub fn new(records: Records) -> Self {
        Self {
            records,
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<Records> for Batch {
    fn from(records: Records) -> Self {
        Self::new(records)
    }
}

/// What one input port receives for an invocation.
#[derive(Debug)]
pub enum PortInput {
    /// One block (block-mode ports and `this`)
    Block(ManagedBlock),
    /// Every unconsumed upstream block (stream ports)
    Stream(BlockStream),
}

/// Inputs of one invocation, keyed by port name. Unbound optional ports are absent.
#[derive(Debug, Default)]
pub struct PipeInputs {
    ports: BTreeMap<String, PortInput>,
}

impl PipeInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, port: impl Into<String>, input: PortInput) {
        self.ports.insert(port.into(), input);
    }

    pub fn contains(&self, port: &str) -> bool {
        self.ports.contains_key(port)
    }

    pub fn block(&self, port: &str) -> Option<&ManagedBlock> {
        match self.ports.get(port) {
            Some(PortInput::Block(block)) => Some(block),
            _ => None,
        }
    }

    /// Take the stream bound to `port`, leaving nothing behind.
    pub fn take_stream(&mut self, port: &str) -> Option<BlockStream> {
        match self.ports.remove(port) {
            Some(PortInput::Stream(stream)) => Some(stream),
            Some(other) => {
                self.ports.insert(port.to_string(), other);
                None
            }
            None => None,
        }
    }

    pub fn take(&mut self, port: &str) -> Option<PortInput> {
        self.ports.remove(port)
    }

    /// Records of the block bound to `port`, or `None` when no block is bound.
    pub fn records(&self, port: &str) -> anyhow::Result<Option<Records>> {
        match self.block(port) {
            Some(block) => Ok(Some(block.records()?)),
            None => Ok(None),
        }
    }

    pub fn port_names(&self) -> impl Iterator<Item = &str> {
        self.ports.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

/// A natively implemented pipe body.
///
/// `open` receives the invocation's inputs and returns a cursor the engine
/// pulls one batch at a time; every batch is committed before the next pull.
#[async_trait]
pub trait PipeFunction: Send + Sync {
    async fn open(
        &self,
        inputs: PipeInputs,
        ctx: &mut PipeContext,
    ) -> anyhow::Result<Box<dyn BatchCursor>>;
}

/// Lazy sequence of output batches.
#[async_trait]
pub trait BatchCursor: Send {
    /// Produce the next batch, or `None` when the invocation is done.
    ///
    /// State written to `ctx` before an error is returned is still persisted.
    async fn next_batch(&mut self, ctx: &mut PipeContext) -> anyhow::Result<Option<Batch>>;
}

/// Executes query-language pipes.
#[async_trait]
pub trait QueryRuntime: Send + Sync {
    async fn open(
        &self,
        query: &str,
        inputs: PipeInputs,
        ctx: &mut PipeContext,
    ) -> anyhow::Result<Box<dyn BatchCursor>>;
}
