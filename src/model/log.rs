// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BlockId, GraphId, NodeScope, StateMap};

/// Failure details captured on a pipe log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipeError {
    pub message: String,
    pub trace: String,
}

impl PipeError {
    /// Build an error record, cutting the trace to at most `max_trace_chars`
    /// characters.
    pub fn new(message: impl Into<String>, trace: &str, max_trace_chars: usize) -> Self {
        let trace = match trace.char_indices().nth(max_trace_chars) {
            Some((cut, _)) => trace[..cut].to_string(),
            None => trace.to_string(),
        };
        Self {
            message: message.into(),
            trace,
        }
    }
}

/// One execution attempt of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct PipeLog {
    pub id: i64,
    pub graph_id: GraphId,
    pub node_scope: NodeScope,
    pub node_key: String,
    pub pipe_key: String,
    pub pipe_config: StateMap,
    pub runtime_ref: String,
    pub start_state: StateMap,
    pub end_state: StateMap,
    pub queued_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<PipeError>,
}

/// Which side of a pipe log a block sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }

    /// Arrow used by the lineage summary table.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Direction::Input => "←",
            Direction::Output => "➞",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "input" => Ok(Direction::Input),
            "output" => Ok(Direction::Output),
            other => Err(other.to_string()),
        }
    }
}

/// Link between a pipe log and a block it consumed or produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DataBlockLog {
    pub id: i64,
    pub pipe_log_id: i64,
    pub data_block_id: BlockId,
    pub direction: Direction,
    pub processed_at: DateTime<Utc>,
}
