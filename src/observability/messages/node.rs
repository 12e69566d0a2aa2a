// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for node runs.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A node is about to run.
///
/// # Log Level
/// `debug!` - Per-node detail
pub struct NodeRunStarted<'a> {
    pub node_key: &'a str,
    pub pipe_key: &'a str,
    pub invocations: usize,
}

impl Display for NodeRunStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Running node '{}' with pipe '{}' ({} invocations)",
            self.node_key, self.pipe_key, self.invocations
        )
    }
}

impl StructuredLog for NodeRunStarted<'_> {
    fn log(&self) {
        tracing::debug!(
            node_key = self.node_key,
            pipe_key = self.pipe_key,
            invocations = self.invocations,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "node_run",
            span_name = name,
            node_key = self.node_key,
            pipe_key = self.pipe_key,
        )
    }
}

/// A node was not run.
///
/// # Log Level
/// `debug!` - Expected on every idle re-run
pub struct NodeSkipped<'a> {
    pub node_key: &'a str,
    pub reason: &'a str,
}

impl Display for NodeSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Skipping node '{}': {}", self.node_key, self.reason)
    }
}

impl StructuredLog for NodeSkipped<'_> {
    fn log(&self) {
        tracing::debug!(node_key = self.node_key, reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("node_skipped", span_name = name, node_key = self.node_key)
    }
}

/// One output batch became a durable block.
///
/// # Log Level
/// `debug!` - Per-batch detail
pub struct BatchCommitted<'a> {
    pub node_key: &'a str,
    pub block_id: &'a str,
    pub record_count: usize,
    pub pipe_log_id: i64,
}

impl Display for BatchCommitted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' committed block {} ({} records) on pipe log {}",
            self.node_key, self.block_id, self.record_count, self.pipe_log_id
        )
    }
}

impl StructuredLog for BatchCommitted<'_> {
    fn log(&self) {
        tracing::debug!(
            node_key = self.node_key,
            block_id = self.block_id,
            record_count = self.record_count,
            pipe_log_id = self.pipe_log_id,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "batch",
            span_name = name,
            node_key = self.node_key,
            block_id = self.block_id,
        )
    }
}

/// A node finished without failing.
///
/// # Log Level
/// `info!` - Important operational event
pub struct NodeRunCompleted<'a> {
    pub node_key: &'a str,
    pub pipe_log_id: Option<i64>,
    pub blocks_out: usize,
    pub blocks_in: usize,
}

impl Display for NodeRunCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.pipe_log_id {
            Some(id) => write!(
                f,
                "Node '{}' completed on pipe log {}: {} blocks out, {} blocks in",
                self.node_key, id, self.blocks_out, self.blocks_in
            ),
            None => write!(f, "Node '{}' completed with nothing to record", self.node_key),
        }
    }
}

impl StructuredLog for NodeRunCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            node_key = self.node_key,
            pipe_log_id = self.pipe_log_id,
            blocks_out = self.blocks_out,
            blocks_in = self.blocks_in,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("node_completed", span_name = name, node_key = self.node_key)
    }
}

/// A node's pipe failed; its pipe log carries the error.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct NodeRunFailed<'a> {
    pub node_key: &'a str,
    pub pipe_log_id: i64,
    pub message: &'a str,
}

impl Display for NodeRunFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' failed (pipe log {}): {}",
            self.node_key, self.pipe_log_id, self.message
        )
    }
}

impl StructuredLog for NodeRunFailed<'_> {
    fn log(&self) {
        tracing::error!(
            node_key = self.node_key,
            pipe_log_id = self.pipe_log_id,
            error = self.message,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("node_failed", span_name = name, node_key = self.node_key)
    }
}
