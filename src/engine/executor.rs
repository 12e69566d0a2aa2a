// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt::Write as _;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::Instrument;

use crate::engine::run::NodeRunner;
use crate::engine::{EngineOptions, ProduceOutcome, RunStatus};
use crate::errors::{ExecutionError, StoreError};
use crate::graph::Graph;
use crate::model::{DataBlock, DataBlockLog, NodeScope, PipeLog, Records, StateMap};
use crate::observability::messages::engine::{
    DeadlineExceeded, NodeStateReset, ProduceCompleted, ProduceFailed, ProduceStarted,
};
use crate::observability::messages::StructuredLog;
use crate::storage::{BlockStorage, MemoryBlockStorage, MetadataStore, SqliteMetadataStore};
use crate::traits::QueryRuntime;

/// Runs graphs incrementally against a metadata store and block storage.
///
/// The engine is the only writer of pipe logs, block logs and node state.
/// Every node keeps its own cursor in the store, so producing a node again
/// only processes blocks it has not consumed yet. Cursors are keyed by the
/// node's [`scope`](crate::graph::Node::scope): changing a node's config or
/// adding nodes elsewhere resumes from the same checkpoint.
///
/// ## Produce
///
/// [`Engine::produce`] derives the graph, orders the target's ancestors
/// topologically and runs them one at a time. Each batch a pipe yields is
/// stored and committed before the next one is requested; a pipe failure or
/// timeout is recorded on the node's pipe log, stops the schedule and is
/// reported on the returned [`ProduceOutcome`].
pub struct Engine {
    store: Arc<dyn MetadataStore>,
    storage: Arc<dyn BlockStorage>,
    query_runtime: Option<Arc<dyn QueryRuntime>>,
    options: EngineOptions,
}

impl Engine {
    pub fn new(store: Arc<dyn MetadataStore>, storage: Arc<dyn BlockStorage>) -> Self {
        Self {
            store,
            storage,
            query_runtime: None,
            options: EngineOptions::default(),
        }
    }

    /// An engine backed by an in-memory SQLite store and in-memory blocks.
    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(
            Arc::new(SqliteMetadataStore::in_memory()?),
            Arc::new(MemoryBlockStorage::new()),
        ))
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_query_runtime(mut self, runtime: Arc<dyn QueryRuntime>) -> Self {
        self.query_runtime = Some(runtime);
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    pub fn storage(&self) -> &Arc<dyn BlockStorage> {
        &self.storage
    }

    /// Bring `target` (a node key or output alias) up to date.
    ///
    /// Returns `Err` only for problems that kept the engine from recording
    /// anything: an invalid graph, an unknown target, or a store/storage
    /// failure. Pipe failures and timeouts come back in
    /// [`ProduceOutcome::failure`].
    pub async fn produce(&self, graph: &Graph, target: &str) -> Result<ProduceOutcome, ExecutionError> {
        let derived = graph.derive()?;
        let target_node = derived
            .resolve(target)
            .ok_or_else(|| ExecutionError::UnknownNode(target.to_string()))?;
        let schedule = derived.ancestors(target_node.key())?;

        let started = ProduceStarted {
            graph_id: derived.id().as_str(),
            target: target_node.key(),
            node_count: schedule.len(),
        };
        started.log();
        let span = started.span("produce");

        let began = std::time::Instant::now();
        let deadline = self.options.timeout.map(|limit| Instant::now() + limit);
        let runner = NodeRunner {
            store: self.store.as_ref(),
            storage: &self.storage,
            query_runtime: self.query_runtime.as_ref(),
            env: graph.environment().as_ref(),
            graph: &derived,
            options: &self.options,
            deadline,
        };

        let mut outcome = ProduceOutcome {
            target: target_node.key().to_string(),
            output: None,
            runs: Vec::new(),
            failure: None,
        };

        async {
            for node in schedule {
                if let (Some(at), Some(limit)) = (deadline, self.options.timeout) {
                    if Instant::now() >= at {
                        DeadlineExceeded {
                            node_key: node.key(),
                            limit,
                        }
                        .log();
                        outcome.failure = Some(ExecutionError::Timeout {
                            node: node.key().to_string(),
                            limit,
                        });
                        break;
                    }
                }

                let node_outcome = runner.run(node).await?;
                if node.key() == outcome.target {
                    if let Some(block) = node_outcome.run.blocks_out.last() {
                        outcome.output = Some(block.clone());
                    }
                }
                outcome.runs.push(node_outcome.run);
                if let Some(failure) = node_outcome.failure {
                    outcome.failure = Some(failure);
                    break;
                }
            }
            Ok::<(), ExecutionError>(())
        }
        .instrument(span)
        .await?;

        match &outcome.failure {
            Some(error) => ProduceFailed {
                target: &outcome.target,
                node_key: error.node().unwrap_or(&outcome.target),
                error,
            }
            .log(),
            None => ProduceCompleted {
                target: &outcome.target,
                committed: count(&outcome, RunStatus::Committed),
                skipped: count(&outcome, RunStatus::Skipped),
                produced: outcome.output.is_some(),
                elapsed: began.elapsed(),
            }
            .log(),
        }
        Ok(outcome)
    }

    /// Forget a node's checkpoint. Blocks and logs are kept, so the node's
    /// input cursor is unaffected; only its pipe state starts over.
    pub fn reset_node(&self, graph: &Graph, node_key: &str) -> Result<bool, ExecutionError> {
        let existed = match scope_of(graph, node_key)? {
            Some(scope) => self.store.delete_node_state(&scope)?,
            None => false,
        };
        NodeStateReset {
            graph_id: graph.identity().as_str(),
            node_key,
            existed,
        }
        .log();
        Ok(existed)
    }

    /// Most recent output of a node, looked up by key or output alias.
    pub fn latest_output(&self, graph: &Graph, key_or_alias: &str) -> Result<Option<DataBlock>, ExecutionError> {
        let derived = graph.derive()?;
        let node = derived
            .resolve(key_or_alias)
            .ok_or_else(|| ExecutionError::UnknownNode(key_or_alias.to_string()))?;
        Ok(self.store.latest_output(node.scope())?)
    }

    /// Pipe logs of a node, including those written before its config or
    /// the rest of the graph changed.
    pub fn pipe_logs(&self, graph: &Graph, node_key: &str) -> Result<Vec<PipeLog>, ExecutionError> {
        match scope_of(graph, node_key)? {
            Some(scope) => Ok(self.store.pipe_logs(&scope)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn block_logs(&self, pipe_log_id: i64) -> Result<Vec<DataBlockLog>, ExecutionError> {
        Ok(self.store.block_logs(pipe_log_id)?)
    }

    pub fn node_state(&self, graph: &Graph, node_key: &str) -> Result<Option<StateMap>, ExecutionError> {
        match scope_of(graph, node_key)? {
            Some(scope) => Ok(self.store.node_state(&scope)?),
            None => Ok(None),
        }
    }

    pub fn read_records(&self, block: &DataBlock) -> Result<Records, ExecutionError> {
        Ok(self.storage.read(&block.storage_ref)?)
    }

    /// Every block log as a text table, oldest first.
    pub fn lineage_summary(&self) -> Result<String, ExecutionError> {
        let rows = self.store.lineage()?;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<8} {:<24} {:<3} {:<36} {:>8}  {}",
            "log", "node", "dir", "block", "records", "processed_at"
        );
        for row in rows {
            let _ = writeln!(
                out,
                "{:<8} {:<24} {:<3} {:<36} {:>8}  {}",
                row.pipe_log_id,
                row.node_key,
                row.direction.symbol(),
                row.block_id,
                row.record_count,
                row.processed_at.to_rfc3339(),
            );
        }
        Ok(out)
    }
}

/// Scope of a node of the derived graph, by key.
fn scope_of(graph: &Graph, node_key: &str) -> Result<Option<NodeScope>, ExecutionError> {
    Ok(graph.derive()?.node(node_key).map(|node| node.scope().clone()))
}

fn count(outcome: &ProduceOutcome, status: RunStatus) -> usize {
    outcome.runs.iter().filter(|run| run.status == status).count()
}
