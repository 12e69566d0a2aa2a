// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the produce request lifecycle.
//!
//! This module contains message types for logging events related to:
//! * Produce request start, completion and failure
//! * Time budget expiry
//! * Node checkpoint resets

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A produce request started.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use blockflow::observability::messages::engine::ProduceStarted;
///
/// let msg = ProduceStarted {
///     graph_id: "9f2c",
///     target: "metrics",
///     node_count: 2,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ProduceStarted<'a> {
    pub graph_id: &'a str,
    pub target: &'a str,
    pub node_count: usize,
}

impl Display for ProduceStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Producing '{}': {} nodes scheduled",
            self.target, self.node_count
        )
    }
}

impl StructuredLog for ProduceStarted<'_> {
    fn log(&self) {
        tracing::info!(
            graph_id = self.graph_id,
            target_node = self.target,
            node_count = self.node_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "produce",
            span_name = name,
            graph_id = self.graph_id,
            target_node = self.target,
        )
    }
}

/// A produce request finished without a pipe failure.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ProduceCompleted<'a> {
    pub target: &'a str,
    pub committed: usize,
    pub skipped: usize,
    pub produced: bool,
    pub elapsed: Duration,
}

impl Display for ProduceCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Produced '{}' in {:?}: {} nodes committed, {} skipped, {}",
            self.target,
            self.elapsed,
            self.committed,
            self.skipped,
            if self.produced { "new output" } else { "no new output" }
        )
    }
}

impl StructuredLog for ProduceCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            target_node = self.target,
            committed = self.committed,
            skipped = self.skipped,
            produced = self.produced,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("produce_completed", span_name = name, target_node = self.target)
    }
}

/// A produce request stopped at a failing node.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct ProduceFailed<'a> {
    pub target: &'a str,
    pub node_key: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ProduceFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Producing '{}' stopped at node '{}': {}",
            self.target, self.node_key, self.error
        )
    }
}

impl StructuredLog for ProduceFailed<'_> {
    fn log(&self) {
        tracing::error!(
            target_node = self.target,
            node_key = self.node_key,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "produce_failed",
            span_name = name,
            target_node = self.target,
            node_key = self.node_key,
        )
    }
}

/// The time budget ran out before or while a node ran.
///
/// # Log Level
/// `warn!` - Degraded but handled condition
pub struct DeadlineExceeded<'a> {
    pub node_key: &'a str,
    pub limit: Duration,
}

impl Display for DeadlineExceeded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Time limit of {:?} reached at node '{}'",
            self.limit, self.node_key
        )
    }
}

impl StructuredLog for DeadlineExceeded<'_> {
    fn log(&self) {
        tracing::warn!(
            node_key = self.node_key,
            limit_ms = self.limit.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("deadline", span_name = name, node_key = self.node_key)
    }
}

/// A node's checkpoint was deleted on request.
///
/// # Log Level
/// `info!` - Important operational event
pub struct NodeStateReset<'a> {
    pub graph_id: &'a str,
    pub node_key: &'a str,
    pub existed: bool,
}

impl Display for NodeStateReset<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.existed {
            write!(f, "Reset checkpoint of node '{}'", self.node_key)
        } else {
            write!(f, "Node '{}' had no checkpoint to reset", self.node_key)
        }
    }
}

impl StructuredLog for NodeStateReset<'_> {
    fn log(&self) {
        tracing::info!(
            graph_id = self.graph_id,
            node_key = self.node_key,
            existed = self.existed,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("node_reset", span_name = name, node_key = self.node_key)
    }
}
