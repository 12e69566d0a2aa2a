// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;

use crate::engine::PipeContext;
use crate::traits::{Batch, BatchCursor, PipeFunction, PipeInputs};

/// Cursor over batches computed up front.
#[derive(Debug, Default)]
pub struct Batches(VecDeque<Batch>);

impl Batches {
    pub fn new(batches: impl IntoIterator<Item = Batch>) -> Self {
        Self(batches.into_iter().collect())
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BatchCursor for Batches {
    async fn next_batch(&mut self, _ctx: &mut PipeContext) -> anyhow::Result<Option<Batch>> {
        Ok(self.0.pop_front())
    }
}

/// Pipe backed by a synchronous closure returning all of its batches at once.
pub struct FnPipe<F>(F);

impl<F> FnPipe<F>
where
    F: Fn(PipeInputs, &mut PipeContext) -> anyhow::Result<Vec<Batch>> + Send + Sync,
{
    pub fn new(function: F) -> Self {
        Self(function)
    }
}

#[async_trait]
impl<F> PipeFunction for FnPipe<F>
where
    F: Fn(PipeInputs, &mut PipeContext) -> anyhow::Result<Vec<Batch>> + Send + Sync,
{
    async fn open(
        &self,
        inputs: PipeInputs,
        ctx: &mut PipeContext,
    ) -> anyhow::Result<Box<dyn BatchCursor>> {
        let batches = (self.0)(inputs, ctx)?;
        Ok(Box::new(Batches::new(batches)))
    }
}

/// Wrap a closure as a shareable pipe function.
pub fn native_fn<F>(function: F) -> Arc<dyn PipeFunction>
where
    F: Fn(PipeInputs, &mut PipeContext) -> anyhow::Result<Vec<Batch>> + Send + Sync + 'static,
{
    Arc::new(FnPipe::new(function))
}

/// Cursor driven by a closure called once per pull.
pub struct FnCursor<F>(F);

#[async_trait]
impl<F> BatchCursor for FnCursor<F>
where
    F: FnMut(&mut PipeContext) -> anyhow::Result<Option<Batch>> + Send,
{
    async fn next_batch(&mut self, ctx: &mut PipeContext) -> anyhow::Result<Option<Batch>> {
        (self.0)(ctx)
    }
}

pub fn cursor_fn<F>(function: F) -> Box<dyn BatchCursor>
where
    F: FnMut(&mut PipeContext) -> anyhow::Result<Option<Batch>> + Send + 'static,
{
    Box::new(FnCursor(function))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StateMap;
    use serde_json::json;

    fn ctx() -> PipeContext {
        PipeContext::new("node", "pipe", StateMap::new(), StateMap::new())
    }

    fn batch(value: i64) -> Batch {
        Batch::new(vec![json!({ "v": value }).as_object().unwrap().clone()])
    }

    #[tokio::test]
    async fn batches_yield_in_order_then_end() {
        let mut ctx = ctx();
        let mut cursor = Batches::new([batch(1), batch(2)]);
        assert_eq!(cursor.next_batch(&mut ctx).await.unwrap(), Some(batch(1)));
        assert_eq!(cursor.next_batch(&mut ctx).await.unwrap(), Some(batch(2)));
        assert_eq!(cursor.next_batch(&mut ctx).await.unwrap(), None);
    }

    #[tokio::test]
    async fn fn_pipe_passes_context() {
        let pipe = native_fn(|_inputs, ctx| {
            ctx.set_state("opened", true);
            Ok(vec![batch(7)])
        });
        let mut ctx = ctx();
        let mut cursor = pipe.open(PipeInputs::new(), &mut ctx).await.unwrap();
        assert!(ctx.is_dirty());
        assert_eq!(cursor.next_batch(&mut ctx).await.unwrap(), Some(batch(7)));
    }

    #[tokio::test]
    async fn fn_cursor_updates_state_between_pulls() {
        let mut remaining = 2;
        let mut cursor = cursor_fn(move |ctx| {
            if remaining == 0 {
                return Ok(None);
            }
            remaining -= 1;
            ctx.set_state("remaining", remaining);
            Ok(Some(batch(remaining)))
        });
        let mut ctx = ctx();
        while cursor.next_batch(&mut ctx).await.unwrap().is_some() {}
        assert_eq!(ctx.state_u64("remaining"), Some(0));
    }
}
