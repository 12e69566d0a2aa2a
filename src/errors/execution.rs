// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::time::Duration;

use super::{GraphError, StorageError, StoreError};

/// Errors surfaced by a produce request.
///
/// `PipeExecution` and `Timeout` are recorded on the failing node's pipe log
/// before they are returned; the remaining variants describe infrastructure
/// failures that prevented the engine from recording anything at all.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// The pipe body returned an error while opening or pulling its cursor.
    #[error("pipe execution failed on node '{node}': {message}")]
    PipeExecution {
        node: String,
        message: String,
        trace: String,
    },

    /// The request exceeded its time budget while running `node`.
    #[error("node '{node}' exceeded the {limit:?} time limit")]
    Timeout { node: String, limit: Duration },

    /// The requested node does not exist in the derived graph.
    #[error("unknown node '{0}'")]
    UnknownNode(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ExecutionError {
    /// The node the failure is attributed to, when there is one.
    pub fn node(&self) -> Option<&str> {
        match self {
            ExecutionError::PipeExecution { node, .. } | ExecutionError::Timeout { node, .. } => {
                Some(node)
            }
            ExecutionError::UnknownNode(node) => Some(node),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipe_execution_display_names_node() {
        let err = ExecutionError::PipeExecution {
            node: "source".into(),
            message: "boom".into(),
            trace: "boom\n  at source".into(),
        };
        assert_eq!(
            err.to_string(),
            "pipe execution failed on node 'source': boom"
        );
        assert_eq!(err.node(), Some("source"));
    }

    #[test]
    fn graph_errors_convert() {
        let err: ExecutionError = GraphError::DuplicateKey {
            node_key: "a".into(),
        }
        .into();
        assert!(matches!(err, ExecutionError::Graph(_)));
        assert_eq!(err.node(), None);
    }
}
