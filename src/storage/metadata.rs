// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Metadata store trait: block metadata, lineage and node checkpoints.

use chrono::{DateTime, Utc};

use crate::errors::StoreError;
use crate::model::{
    BlockId, DataBlock, DataBlockLog, Direction, GraphId, NodeScope, PipeError, PipeLog, StateMap,
};

/// Fields of a pipe log fixed when the attempt starts.
#[derive(Debug, Clone, PartialEq)]
pub struct PipeLogDraft {
    pub graph_id: GraphId,
    pub node_scope: NodeScope,
    pub node_key: String,
    pub pipe_key: String,
    pub pipe_config: StateMap,
    pub runtime_ref: String,
    pub start_state: StateMap,
    pub queued_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
}

/// Everything made durable by one checkpoint of a running node.
///
/// Applied atomically: the pipe log is inserted when `pipe_log_id` is `None`
/// and updated otherwise, the output block and its OUTPUT link are inserted,
/// INPUT links are inserted for `inputs`, and node state is upserted when
/// `persist_state` is set.
#[derive(Debug)]
pub struct SegmentCommit<'a> {
    pub pipe_log_id: Option<i64>,
    pub draft: &'a PipeLogDraft,
    pub output: Option<&'a DataBlock>,
    pub inputs: &'a [BlockId],
    pub end_state: &'a StateMap,
    pub persist_state: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<&'a PipeError>,
}

/// One row of the lineage summary.
#[derive(Debug, Clone, PartialEq)]
pub struct LineageRow {
    pub pipe_log_id: i64,
    pub graph_id: GraphId,
    pub node_key: String,
    pub direction: Direction,
    pub block_id: BlockId,
    pub record_count: usize,
    pub processed_at: DateTime<Utc>,
}

/// Durable source of truth for which blocks exist and who consumed them.
///
/// Cursors are keyed by [`NodeScope`]: a node's checkpoint, its consumed set
/// and its outputs survive config changes and additions elsewhere in the
/// graph. Implementations must be safe to share across tasks; every method
/// is a short synchronous call.
pub trait MetadataStore: Send + Sync {
    fn node_state(&self, node: &NodeScope) -> Result<Option<StateMap>, StoreError>;

    /// Delete the checkpoint of a node. Returns whether a row existed.
    fn delete_node_state(&self, node: &NodeScope) -> Result<bool, StoreError>;

    /// Apply one checkpoint atomically and return the pipe log id.
    fn commit_segment(&self, commit: &SegmentCommit<'_>) -> Result<i64, StoreError>;

    /// Blocks output by any of `producers` that `consumer` has no INPUT link
    /// to, oldest first.
    fn unconsumed_blocks(
        &self,
        consumer: &NodeScope,
        producers: &[NodeScope],
    ) -> Result<Vec<DataBlock>, StoreError>;

    /// Most recent block output by `producer`.
    fn latest_output(&self, producer: &NodeScope) -> Result<Option<DataBlock>, StoreError>;

    fn has_consumed(&self, consumer: &NodeScope, block: &BlockId) -> Result<bool, StoreError>;

    fn block(&self, id: &BlockId) -> Result<Option<DataBlock>, StoreError>;

    /// Pipe logs of a node, oldest first.
    fn pipe_logs(&self, node: &NodeScope) -> Result<Vec<PipeLog>, StoreError>;

    fn block_logs(&self, pipe_log_id: i64) -> Result<Vec<DataBlockLog>, StoreError>;

    /// Every block log joined with its pipe log and block, in insertion order.
    fn lineage(&self) -> Result<Vec<LineageRow>, StoreError>;
}
