// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::anyhow;
use async_trait::async_trait;

use super::INPUT_PORT;
use crate::backends::native::Batches;
use crate::config::consts::SELF_PORT;
use crate::engine::PipeContext;
use crate::traits::{Batch, BatchCursor, PipeFunction, PipeInputs};

/// Appends every unconsumed upstream block to the node's previous output.
///
/// Emits nothing when the stream is empty, so an idle upstream never produces
/// a duplicate snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct Accumulator;

#[async_trait]
impl PipeFunction for Accumulator {
    async fn open(
        &self,
        mut inputs: PipeInputs,
        _ctx: &mut PipeContext,
    ) -> anyhow::Result<Box<dyn BatchCursor>> {
        let mut stream = inputs
            .take_stream(INPUT_PORT)
            .ok_or_else(|| anyhow!("accumulator expects a stream on port '{}'", INPUT_PORT))?;
        if stream.is_empty() {
            return Ok(Box::new(Batches::empty()));
        }

        let mut records = inputs.records(SELF_PORT)?.unwrap_or_default();
        records.extend(stream.read_all()?);
        Ok(Box::new(Batches::new([Batch::new(records)])))
    }
}
