// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::backends::native::{native_fn, Batches};
use crate::engine::PipeContext;
use crate::environment::{Environment, Field, Schema};
use crate::interface::Interface;
use crate::model::{Record, StateMap};
use crate::pipe::Pipe;
use crate::stream::BlockStream;
use crate::traits::{Batch, BatchCursor, PipeFunction, PipeInputs, QueryRuntime};

pub fn record(value: Value) -> Record {
    value
        .as_object()
        .cloned()
        .unwrap_or_else(|| panic!("not an object: {}", value))
}

pub fn state(value: Value) -> StateMap {
    record(value)
}

/// Build an interface from `(port, annotation)` pairs.
pub fn interface(inputs: &[(&str, &str)], output: Option<&str>) -> Interface {
    let mut builder = Interface::builder();
    for (port, annotation) in inputs {
        builder = builder.input(port, annotation);
    }
    if let Some(output) = output {
        builder = builder.output(output);
    }
    builder.build().unwrap()
}

/// A pipe that never yields anything
pub fn noop_pipe(key: &str, inputs: &[(&str, &str)], output: Option<&str>) -> Pipe {
    Pipe::native(
        key,
        interface(inputs, output),
        native_fn(|_inputs, _ctx| Ok(Vec::new())),
    )
}

/// Emits customers in batches and checkpoints how many it has extracted.
///
/// Config: `total_records` (default 8), `batch_size` (2), `batches_per_run` (2).
/// The checkpoint for a batch is written when the engine pulls again, so a
/// failure right after a batch still persists its progress. With `fail: true`
/// the source errors right after its first batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomerSource;

impl CustomerSource {
    pub fn pipe(&self, key: &str) -> Pipe {
        Pipe::native(
            key,
            interface(&[], Some("DataBlock[Customer]")),
            Arc::new(*self),
        )
    }
}

struct CustomerCursor {
    next_id: u64,
    total: u64,
    batch_size: u64,
    batches_left: u64,
    pending_checkpoint: Option<u64>,
    fail: bool,
}

#[async_trait]
impl PipeFunction for CustomerSource {
    async fn open(
        &self,
        _inputs: PipeInputs,
        ctx: &mut PipeContext,
    ) -> anyhow::Result<Box<dyn BatchCursor>> {
        Ok(Box::new(CustomerCursor {
            next_id: ctx.state_u64("records_extracted").unwrap_or(0),
            total: ctx.config_u64("total_records").unwrap_or(8),
            batch_size: ctx.config_u64("batch_size").unwrap_or(2),
            batches_left: ctx.config_u64("batches_per_run").unwrap_or(2),
            pending_checkpoint: None,
            fail: ctx.config_bool("fail").unwrap_or(false),
        }))
    }
}

#[async_trait]
impl BatchCursor for CustomerCursor {
    async fn next_batch(&mut self, ctx: &mut PipeContext) -> anyhow::Result<Option<Batch>> {
        if let Some(extracted) = self.pending_checkpoint.take() {
            ctx.set_state("records_extracted", extracted);
            if self.fail {
                bail!("customer source failed after {} records", extracted);
            }
        }
        if self.batches_left == 0 || self.next_id >= self.total {
            return Ok(None);
        }
        let end = (self.next_id + self.batch_size).min(self.total);
        let records = (self.next_id..end)
            .map(|id| record(json!({ "id": id, "name": format!("customer-{}", id) })))
            .collect();
        self.next_id = end;
        self.batches_left -= 1;
        self.pending_checkpoint = Some(end);
        Ok(Some(Batch::new(records)))
    }
}

/// Summarizes each input block as `{row_count, column_count}`.
pub fn shape_metrics_pipe(key: &str) -> Pipe {
    Pipe::native(
        key,
        interface(
            &[("input", "DataBlock[T]"), ("this", "DataBlock[Metrics]")],
            Some("DataBlock[Metrics]"),
        ),
        native_fn(|inputs, _ctx| {
            let records = inputs.records("input")?.unwrap_or_default();
            let column_count = records.first().map_or(0, |r| r.len());
            Ok(vec![Batch::new(vec![record(json!({
                "row_count": records.len(),
                "column_count": column_count,
            }))])])
        }),
    )
}

/// Fails on any record whose `id` reaches the node's `fail_from_id` config.
fn check_ids(records: &[Record], ctx: &PipeContext) -> anyhow::Result<()> {
    let Some(limit) = ctx.config_u64("fail_from_id") else {
        return Ok(());
    };
    match records.iter().filter_map(|r| r.get("id")?.as_u64()).find(|&id| id >= limit) {
        Some(id) => bail!("refusing record {}", id),
        None => Ok(()),
    }
}

/// Copies each input block, one block per invocation.
pub fn copy_blocks_pipe(key: &str) -> Pipe {
    Pipe::native(
        key,
        interface(&[("input", "DataBlock[T]")], Some("DataBlock[T]")),
        native_fn(|inputs, ctx| {
            let records = inputs.records("input")?.unwrap_or_default();
            check_ids(&records, ctx)?;
            Ok(vec![Batch::new(records)])
        }),
    )
}

/// Pulls its stream one block at a time and yields a copy of each.
pub fn copy_stream_pipe(key: &str) -> Pipe {
    struct StreamCopyCursor(BlockStream);

    #[async_trait]
    impl BatchCursor for StreamCopyCursor {
        async fn next_batch(&mut self, ctx: &mut PipeContext) -> anyhow::Result<Option<Batch>> {
            let Some(block) = self.0.next() else {
                return Ok(None);
            };
            let records = block.records()?;
            check_ids(&records, ctx)?;
            Ok(Some(Batch::new(records)))
        }
    }

    struct StreamCopy;

    #[async_trait]
    impl PipeFunction for StreamCopy {
        async fn open(
            &self,
            mut inputs: PipeInputs,
            _ctx: &mut PipeContext,
        ) -> anyhow::Result<Box<dyn BatchCursor>> {
            let stream = inputs
                .take_stream("input")
                .ok_or_else(|| anyhow!("no stream on port 'input'"))?;
            Ok(Box::new(StreamCopyCursor(stream)))
        }
    }

    Pipe::native(
        key,
        interface(&[("input", "Stream[T]")], Some("DataBlock[T]")),
        Arc::new(StreamCopy),
    )
}

/// Dataset producer emitting ids 1 and 2 with a version bumped on every run.
pub fn customer_updates_pipe(key: &str) -> Pipe {
    Pipe::native(
        key,
        interface(&[], Some("DataSet[Customer]")),
        native_fn(|_inputs, ctx| {
            let version = ctx.state_u64("version").unwrap_or(0) + 1;
            ctx.set_state("version", version);
            Ok(vec![Batch::new(vec![
                record(json!({ "id": 1, "name": "ada", "version": version })),
                record(json!({ "id": 2, "name": "grace", "version": version })),
            ])])
        }),
    )
}

/// Yields one batch immediately, then hangs on the next pull.
pub fn slow_pipe(key: &str, hang: Duration) -> Pipe {
    struct SlowCursor {
        pulls: usize,
        hang: Duration,
    }

    #[async_trait]
    impl BatchCursor for SlowCursor {
        async fn next_batch(&mut self, _ctx: &mut PipeContext) -> anyhow::Result<Option<Batch>> {
            self.pulls += 1;
            if self.pulls > 1 {
                tokio::time::sleep(self.hang).await;
                return Ok(None);
            }
            Ok(Some(Batch::new(vec![record(json!({ "tick": 1 }))])))
        }
    }

    struct Slow(Duration);

    #[async_trait]
    impl PipeFunction for Slow {
        async fn open(
            &self,
            _inputs: PipeInputs,
            _ctx: &mut PipeContext,
        ) -> anyhow::Result<Box<dyn BatchCursor>> {
            Ok(Box::new(SlowCursor {
                pulls: 0,
                hang: self.0,
            }))
        }
    }

    Pipe::native(key, interface(&[], Some("DataBlock")), Arc::new(Slow(hang)))
}

/// Query runtime that answers every query with one record naming it.
pub struct EchoQueryRuntime;

#[async_trait]
impl QueryRuntime for EchoQueryRuntime {
    async fn open(
        &self,
        query: &str,
        inputs: PipeInputs,
        _ctx: &mut PipeContext,
    ) -> anyhow::Result<Box<dyn BatchCursor>> {
        let ports: Vec<&str> = inputs.port_names().collect();
        Ok(Box::new(Batches::new([Batch::new(vec![record(json!({
            "query": query,
            "ports": ports,
        }))])])))
    }
}

/// Environment with the core pipes, the `Customer` schema and the stub pipes.
pub fn test_env(source: &CustomerSource) -> Environment {
    let mut env = Environment::with_core_pipes().unwrap();
    env.register_schema(
        Schema::new("Customer", vec![Field::new("id"), Field::new("name")]).unique_on(["id"]),
    );
    env.register_pipe(source.pipe("customer_source"));
    env.register_pipe(shape_metrics_pipe("shape_metrics"));
    env.register_pipe(customer_updates_pipe("customer_updates"));
    env.register_pipe(noop_pipe(
        "passthrough",
        &[("input", "DataBlock[T]")],
        Some("DataBlock[T]"),
    ));
    env.register_pipe(noop_pipe(
        "join",
        &[("left", "DataBlock[T]"), ("right", "DataBlock[T]")],
        Some("DataBlock[T]"),
    ));
    env.register_pipe(noop_pipe(
        "dataset_reader",
        &[("input", "DataSet[T]")],
        Some("DataBlock[T]"),
    ));
    env.register_pipe(noop_pipe("orders", &[], Some("DataBlock[Order]")));
    env.register_pipe(copy_blocks_pipe("copy_blocks"));
    env.register_pipe(copy_stream_pipe("copy_stream"));
    env
}
