// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

use crate::errors::ExecutionError;
use crate::model::DataBlock;

/// How one node fared during a produce call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// No input to process; nothing was recorded
    Skipped,
    /// The pipe ran but read, wrote and changed nothing
    Unchanged,
    /// At least one commit was made
    Committed,
    /// The pipe failed; its pipe log carries the error
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStatus::Skipped => "skipped",
            RunStatus::Unchanged => "unchanged",
            RunStatus::Committed => "committed",
            RunStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Summary of one node run.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRun {
    pub node_key: String,
    pub status: RunStatus,
    pub pipe_log_id: Option<i64>,
    /// Blocks committed as output
    pub blocks_out: Vec<DataBlock>,
    /// Blocks recorded as input
    pub blocks_in: usize,
}

impl NodeRun {
    pub(crate) fn skipped(node_key: &str) -> Self {
        Self {
            node_key: node_key.to_string(),
            status: RunStatus::Skipped,
            pipe_log_id: None,
            blocks_out: Vec::new(),
            blocks_in: 0,
        }
    }
}

/// Result of [`Engine::produce`](super::Engine::produce).
///
/// A pipe failure or timeout does not make `produce` return `Err`: whatever
/// was committed before it stays visible here and `failure` carries the error.
#[derive(Debug)]
pub struct ProduceOutcome {
    /// The node the call resolved the requested key or alias to
    pub target: String,
    /// The target's most recent output committed during this call
    pub output: Option<DataBlock>,
    /// Nodes attempted, in execution order
    pub runs: Vec<NodeRun>,
    pub failure: Option<ExecutionError>,
}

impl ProduceOutcome {
    pub fn run(&self, node_key: &str) -> Option<&NodeRun> {
        self.runs.iter().find(|run| run.node_key == node_key)
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn into_result(self) -> Result<Option<DataBlock>, ExecutionError> {
        match self.failure {
            Some(error) => Err(error),
            None => Ok(self.output),
        }
    }
}
