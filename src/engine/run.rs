// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! One node run: plan the inputs, invoke the pipe, commit every batch.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::Instrument;

use crate::config::consts::ANY_SCHEMA;
use crate::engine::{EngineOptions, NodeRun, PipeContext, RunStatus};
use crate::environment::Environment;
use crate::errors::{ExecutionError, StoreError};
use crate::graph::{DerivedGraph, Node};
use crate::interface::{ResolvedSchema, ShapeClass};
use crate::model::{BlockId, DataBlock, NodeScope, PipeError, StateMap};
use crate::observability::messages::engine::DeadlineExceeded;
use crate::observability::messages::node::{
    BatchCommitted, NodeRunCompleted, NodeRunFailed, NodeRunStarted, NodeSkipped,
};
use crate::observability::messages::StructuredLog;
use crate::pipe::PipeImpl;
use crate::storage::{BlockStorage, MetadataStore, PipeLogDraft, SegmentCommit};
use crate::stream::{BlockStream, ManagedBlock, ReadLog};
use crate::traits::{Batch, BatchCursor, PipeInputs, PortInput, QueryRuntime};

/// Why a pipe stopped early.
enum Interruption {
    Failed(anyhow::Error),
    TimedOut,
}

/// A node run plus the pipe failure that ended it, if any.
pub(crate) struct NodeOutcome {
    pub run: NodeRun,
    pub failure: Option<ExecutionError>,
}

/// What one bound input port will receive.
struct PortPlan<'n> {
    name: &'n str,
    shape: ShapeClass,
    required: bool,
    producers: Vec<NodeScope>,
    /// Blocks handed out one per invocation (block-mode ports)
    backlog: Vec<DataBlock>,
    /// Latest upstream output, supplied when the backlog runs dry
    fallback: Option<DataBlock>,
    /// Unconsumed blocks at plan time (stream ports)
    streamed: Vec<DataBlock>,
}

impl PortPlan<'_> {
    fn has_new_input(&self) -> bool {
        if self.shape.is_block_mode() {
            !self.backlog.is_empty()
        } else {
            !self.streamed.is_empty()
        }
    }
}

/// Runs nodes of one derived graph against shared stores.
pub(crate) struct NodeRunner<'a> {
    pub store: &'a dyn MetadataStore,
    pub storage: &'a Arc<dyn BlockStorage>,
    pub query_runtime: Option<&'a Arc<dyn QueryRuntime>>,
    pub env: &'a Environment,
    pub graph: &'a DerivedGraph,
    pub options: &'a EngineOptions,
    pub deadline: Option<Instant>,
}

/// The pipe log of a running node and what it has accumulated so far.
struct Attempt {
    draft: PipeLogDraft,
    pipe_log_id: Option<i64>,
    blocks_out: Vec<DataBlock>,
    blocks_in: usize,
}

impl Attempt {
    #[allow(clippy::too_many_arguments)]
    fn commit(
        &mut self,
        store: &dyn MetadataStore,
        output: Option<&DataBlock>,
        inputs: &[BlockId],
        end_state: &StateMap,
        persist_state: bool,
        completed_at: Option<DateTime<Utc>>,
        error: Option<&PipeError>,
    ) -> Result<i64, StoreError> {
        let id = store.commit_segment(&SegmentCommit {
            pipe_log_id: self.pipe_log_id,
            draft: &self.draft,
            output,
            inputs,
            end_state,
            persist_state,
            completed_at,
            error,
        })?;
        self.pipe_log_id = Some(id);
        self.blocks_in += inputs.len();
        if let Some(block) = output {
            self.blocks_out.push(block.clone());
        }
        Ok(id)
    }
}

async fn with_deadline<T, F>(deadline: Option<Instant>, work: F) -> Result<T, Interruption>
where
    F: Future<Output = anyhow::Result<T>>,
{
    let result = match deadline {
        Some(at) => tokio::time::timeout_at(at, work)
            .await
            .map_err(|_| Interruption::TimedOut)?,
        None => work.await,
    };
    result.map_err(Interruption::Failed)
}

/// Schema key recorded as realized for a batch.
///
/// A registered expected schema is realized when every record carries its
/// fields; an unregistered concrete schema is taken at its word.
fn realized_schema(env: &Environment, expected: &ResolvedSchema, batch: &Batch) -> String {
    if let Some(name) = expected.concrete() {
        match env.schema(name) {
            Some(schema) if schema.realized_by(&batch.records) => return name.to_string(),
            Some(_) => {}
            None => return name.to_string(),
        }
    }
    batch
        .schema
        .clone()
        .unwrap_or_else(|| ANY_SCHEMA.to_string())
}

impl NodeRunner<'_> {
    fn scope_of(&self, key: &str) -> Result<NodeScope, ExecutionError> {
        self.graph
            .node(key)
            .map(|node| node.scope().clone())
            .ok_or_else(|| ExecutionError::UnknownNode(key.to_string()))
    }

    fn plan<'n>(&self, node: &'n Node) -> Result<Vec<PortPlan<'n>>, ExecutionError> {
        let mut plans = Vec::new();
        for port in node.interface().upstream_ports() {
            let Some(upstreams) = node.inputs().get(&port.name) else {
                continue;
            };
            let producers = upstreams
                .iter()
                .map(|key| self.scope_of(key))
                .collect::<Result<Vec<_>, _>>()?;
            let shape = port.annotation.shape;

            let mut plan = PortPlan {
                name: &port.name,
                shape,
                required: !port.annotation.optional,
                producers,
                backlog: Vec::new(),
                fallback: None,
                streamed: Vec::new(),
            };

            if !shape.is_block_mode() {
                plan.streamed = self.store.unconsumed_blocks(node.scope(), &plan.producers)?;
                plans.push(plan);
                continue;
            }

            let mut latest = Vec::new();
            for producer in &plan.producers {
                if let Some(block) = self.store.latest_output(producer)? {
                    latest.push(block);
                }
            }

            plan.backlog = if shape == ShapeClass::DataSet {
                let mut fresh = Vec::new();
                for block in &latest {
                    if !self.store.has_consumed(node.scope(), &block.id)? {
                        fresh.push(block.clone());
                    }
                }
                fresh.sort_by(|a, b| a.created_at.cmp(&b.created_at));
                fresh
            } else {
                self.store.unconsumed_blocks(node.scope(), &plan.producers)?
            };
            plan.fallback = latest.into_iter().max_by(|a, b| a.created_at.cmp(&b.created_at));
            plans.push(plan);
        }
        Ok(plans)
    }

    /// Why the node should not run, if it shouldn't.
    fn skip_reason(plans: &[PortPlan<'_>]) -> Option<&'static str> {
        let required: Vec<&PortPlan<'_>> = plans.iter().filter(|p| p.required).collect();
        let considered: Vec<&PortPlan<'_>> = if required.is_empty() {
            plans.iter().collect()
        } else {
            required
        };
        if !considered.is_empty() && considered.iter().all(|p| !p.has_new_input()) {
            return Some("no new input");
        }
        let starved = plans.iter().any(|p| {
            p.required && p.shape.is_block_mode() && p.backlog.is_empty() && p.fallback.is_none()
        });
        starved.then_some("a required input has never produced output")
    }

    /// Inputs for invocation `index`. Blocks from a backlog are recorded as
    /// read immediately; reference blocks only when the pipe loads them.
    fn inputs_for(
        &self,
        node: &Node,
        plans: &[PortPlan<'_>],
        index: usize,
        reads: &ReadLog,
    ) -> Result<PipeInputs, ExecutionError> {
        let mut inputs = PipeInputs::new();
        for plan in plans {
            if !plan.shape.is_block_mode() {
                let blocks = if index == 0 {
                    plan.streamed.clone()
                } else {
                    self.store.unconsumed_blocks(node.scope(), &plan.producers)?
                };
                let stream = BlockStream::new(blocks, Arc::clone(self.storage), reads.clone());
                inputs.insert(plan.name, PortInput::Stream(stream));
                continue;
            }

            if let Some(block) = plan.backlog.get(index) {
                reads.record(&block.id);
                let managed = ManagedBlock::consumed(block.clone(), Arc::clone(self.storage));
                inputs.insert(plan.name, PortInput::Block(managed));
            } else if plan.required {
                if let Some(block) = &plan.fallback {
                    let managed =
                        ManagedBlock::reference(block.clone(), Arc::clone(self.storage), reads.clone());
                    inputs.insert(plan.name, PortInput::Block(managed));
                }
            }
        }

        if let Some(port) = node.interface().self_port() {
            if let Some(block) = self.store.latest_output(node.scope())? {
                let managed =
                    ManagedBlock::reference(block, Arc::clone(self.storage), reads.clone());
                inputs.insert(port.name.clone(), PortInput::Block(managed));
            }
        }
        Ok(inputs)
    }

    async fn open(
        &self,
        node: &Node,
        inputs: PipeInputs,
        ctx: &mut PipeContext,
    ) -> Result<Box<dyn BatchCursor>, Interruption> {
        match node.pipe().implementation() {
            PipeImpl::Native(function) => {
                with_deadline(self.deadline, function.open(inputs, ctx)).await
            }
            PipeImpl::Query(query) => match self.query_runtime {
                Some(runtime) => with_deadline(self.deadline, runtime.open(query, inputs, ctx)).await,
                None => Err(Interruption::Failed(anyhow::anyhow!(
                    "pipe '{}' is a query pipe and no query runtime is installed",
                    node.pipe_key()
                ))),
            },
        }
    }

    fn write_block(&self, node: &Node, batch: &Batch) -> Result<DataBlock, ExecutionError> {
        let id = BlockId::generate();
        let storage_ref = self.storage.write(&id, &batch.records)?;
        let now = Utc::now();
        Ok(DataBlock {
            id,
            record_count: batch.len(),
            expected_schema_key: node.output_schema().key().to_string(),
            realized_schema_key: realized_schema(self.env, node.output_schema(), batch),
            created_at: now,
            updated_at: now,
            storage_ref,
        })
    }

    /// Run `node` to completion or failure.
    ///
    /// Pipe failures and timeouts are recorded on the node's pipe log and
    /// returned in [`NodeOutcome::failure`]; store and storage errors abort
    /// with `Err`.
    pub(crate) async fn run(&self, node: &Node) -> Result<NodeOutcome, ExecutionError> {
        let plans = self.plan(node)?;
        if let Some(reason) = Self::skip_reason(&plans) {
            NodeSkipped {
                node_key: node.key(),
                reason,
            }
            .log();
            return Ok(NodeOutcome {
                run: NodeRun::skipped(node.key()),
                failure: None,
            });
        }

        let invocations = plans
            .iter()
            .filter(|p| p.shape.is_block_mode())
            .map(|p| p.backlog.len())
            .max()
            .unwrap_or(0)
            .max(1);

        let started = NodeRunStarted {
            node_key: node.key(),
            pipe_key: node.pipe_key(),
            invocations,
        };
        started.log();
        let span = started.span("node");
        self.execute(node, &plans, invocations).instrument(span).await
    }

    async fn execute(
        &self,
        node: &Node,
        plans: &[PortPlan<'_>],
        invocations: usize,
    ) -> Result<NodeOutcome, ExecutionError> {
        let start_state = self
            .store
            .node_state(node.scope())?
            .unwrap_or_default();
        let queued_at = Utc::now();
        let mut attempt = Attempt {
            draft: PipeLogDraft {
                graph_id: self.graph.id().clone(),
                node_scope: node.scope().clone(),
                node_key: node.key().to_string(),
                pipe_key: node.pipe_key().to_string(),
                pipe_config: node.config().clone(),
                runtime_ref: node.pipe().runtime_ref(),
                start_state: start_state.clone(),
                queued_at,
                started_at: Utc::now(),
            },
            pipe_log_id: None,
            blocks_out: Vec::new(),
            blocks_in: 0,
        };
        let mut ctx = PipeContext::new(node.key(), node.pipe_key(), node.config().clone(), start_state);
        let reads = ReadLog::default();

        for index in 0..invocations {
            let inputs = self.inputs_for(node, plans, index, &reads)?;
            if let Err(interruption) = self.invoke(node, inputs, &mut ctx, &reads, &mut attempt).await? {
                return self.fail(node, interruption, &ctx, &reads, attempt);
            }

            let last = index + 1 == invocations;
            let pending = reads.take();
            if !pending.is_empty() || ctx.is_dirty() || (last && attempt.pipe_log_id.is_some()) {
                let persist = ctx.take_dirty();
                attempt.commit(
                    self.store,
                    None,
                    &pending,
                    ctx.state(),
                    persist,
                    last.then(Utc::now),
                    None,
                )?;
            }
        }

        NodeRunCompleted {
            node_key: node.key(),
            pipe_log_id: attempt.pipe_log_id,
            blocks_out: attempt.blocks_out.len(),
            blocks_in: attempt.blocks_in,
        }
        .log();

        let status = if attempt.pipe_log_id.is_some() {
            RunStatus::Committed
        } else {
            RunStatus::Unchanged
        };
        Ok(NodeOutcome {
            run: NodeRun {
                node_key: node.key().to_string(),
                status,
                pipe_log_id: attempt.pipe_log_id,
                blocks_out: attempt.blocks_out,
                blocks_in: attempt.blocks_in,
            },
            failure: None,
        })
    }

    /// One invocation: open the pipe and commit each batch it yields.
    ///
    /// The outer `Result` carries infrastructure errors, the inner one a
    /// pipe interruption.
    async fn invoke(
        &self,
        node: &Node,
        inputs: PipeInputs,
        ctx: &mut PipeContext,
        reads: &ReadLog,
        attempt: &mut Attempt,
    ) -> Result<Result<(), Interruption>, ExecutionError> {
        let mut cursor = match self.open(node, inputs, ctx).await {
            Ok(cursor) => cursor,
            Err(interruption) => return Ok(Err(interruption)),
        };

        loop {
            let batch = match with_deadline(self.deadline, cursor.next_batch(ctx)).await {
                Ok(Some(batch)) => batch,
                Ok(None) => return Ok(Ok(())),
                Err(interruption) => return Ok(Err(interruption)),
            };

            let block = self.write_block(node, &batch)?;
            let inputs = reads.take();
            let persist = ctx.take_dirty();
            let pipe_log_id = attempt.commit(
                self.store,
                Some(&block),
                &inputs,
                ctx.state(),
                persist,
                None,
                None,
            )?;
            BatchCommitted {
                node_key: node.key(),
                block_id: block.id.as_str(),
                record_count: block.record_count,
                pipe_log_id,
            }
            .log();
        }
    }

    /// Close the pipe log with the error and the state as of the failure.
    fn fail(
        &self,
        node: &Node,
        interruption: Interruption,
        ctx: &PipeContext,
        reads: &ReadLog,
        mut attempt: Attempt,
    ) -> Result<NodeOutcome, ExecutionError> {
        reads.discard();

        let (error, failure) = match interruption {
            Interruption::Failed(err) => {
                let error = PipeError::new(
                    format!("{err:#}"),
                    &format!("{err:?}"),
                    self.options.max_trace_chars,
                );
                let failure = ExecutionError::PipeExecution {
                    node: node.key().to_string(),
                    message: error.message.clone(),
                    trace: error.trace.clone(),
                };
                (error, failure)
            }
            Interruption::TimedOut => {
                let limit = self.options.timeout.unwrap_or_default();
                DeadlineExceeded {
                    node_key: node.key(),
                    limit,
                }
                .log();
                let failure = ExecutionError::Timeout {
                    node: node.key().to_string(),
                    limit,
                };
                let message = failure.to_string();
                (
                    PipeError::new(message.clone(), &message, self.options.max_trace_chars),
                    failure,
                )
            }
        };

        let pipe_log_id = attempt.commit(
            self.store,
            None,
            &[],
            ctx.state(),
            true,
            Some(Utc::now()),
            Some(&error),
        )?;
        NodeRunFailed {
            node_key: node.key(),
            pipe_log_id,
            message: &error.message,
        }
        .log();

        Ok(NodeOutcome {
            run: NodeRun {
                node_key: node.key().to_string(),
                status: RunStatus::Failed,
                pipe_log_id: Some(pipe_log_id),
                blocks_out: attempt.blocks_out,
                blocks_in: attempt.blocks_in,
            },
            failure: Some(failure),
        })
    }
}
