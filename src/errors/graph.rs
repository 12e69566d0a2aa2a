// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised while building or deriving a graph.
//!
//! Every variant is raised synchronously by the call that constructs the graph
//! and leaves the graph exactly as it was before the call.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The pipe reference could not be found in the environment
    UnresolvedPipe { node_key: String, pipe_key: String },
    /// A node with this key already exists in the graph
    DuplicateKey { node_key: String },
    /// An input references a node that has not been declared
    UnresolvedNode { node_key: String, upstream: String },
    /// Declared inputs do not line up with the pipe's ports
    InterfaceMismatch { node_key: String, reason: String },
    /// A generic variable was bound to two different schemas
    TypeConflict {
        node_key: String,
        variable: String,
        first: String,
        second: String,
    },
    /// A port annotation could not be parsed
    InvalidAnnotation { annotation: String, reason: String },
    /// No accumulator/dedupe pair is registered for the producing pipe's runtime
    MissingAuxiliaryPipe { node_key: String, runtime: String },
    /// The derived graph contains a cycle
    CyclicDependency { nodes: Vec<String> },
}

impl GraphError {
    pub(crate) fn mismatch(node_key: &str, reason: impl Into<String>) -> Self {
        GraphError::InterfaceMismatch {
            node_key: node_key.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::UnresolvedPipe { node_key, pipe_key } => {
                write!(f, "Node '{}' references unknown pipe '{}'", node_key, pipe_key)
            }
            GraphError::DuplicateKey { node_key } => {
                write!(f, "Duplicate node key: '{}'", node_key)
            }
            GraphError::UnresolvedNode { node_key, upstream } => {
                write!(
                    f,
                    "Node '{}' reads from '{}' which is not declared in the graph",
                    node_key, upstream
                )
            }
            GraphError::InterfaceMismatch { node_key, reason } => {
                write!(f, "Inputs of node '{}' do not match its interface: {}", node_key, reason)
            }
            GraphError::TypeConflict {
                node_key,
                variable,
                first,
                second,
            } => {
                write!(
                    f,
                    "Type conflict on node '{}': variable '{}' bound to both '{}' and '{}'",
                    node_key, variable, first, second
                )
            }
            GraphError::InvalidAnnotation { annotation, reason } => {
                write!(f, "Invalid port annotation '{}': {}", annotation, reason)
            }
            GraphError::MissingAuxiliaryPipe { node_key, runtime } => {
                write!(
                    f,
                    "Node '{}' produces a dataset but no auxiliary pipes are registered for the {} runtime",
                    node_key, runtime
                )
            }
            GraphError::CyclicDependency { nodes } => {
                write!(f, "Graph contains a cycle through: {}", nodes.join(", "))
            }
        }
    }
}

impl std::error::Error for GraphError {}
