// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

/// Errors that can occur while validating a graph configuration document
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A circular dependency was detected between declared nodes
    CyclicDependency {
        /// The cycle path showing the circular dependency
        cycle: Vec<String>,
    },
    /// A node references an input that is not declared anywhere in the document
    UnresolvedDependency {
        /// The node that has the unresolved input
        node_key: String,
        /// The upstream key that couldn't be resolved
        missing_dependency: String,
    },
    /// Two nodes share the same key
    DuplicateNodeKey {
        /// The duplicate node key
        node_key: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::CyclicDependency { cycle } => {
                write!(f, "Cyclic dependency detected: {}", cycle.join(" -> "))
            }
            ValidationError::UnresolvedDependency {
                node_key,
                missing_dependency,
            } => {
                write!(
                    f,
                    "Node '{}' reads from '{}' which does not exist",
                    node_key, missing_dependency
                )
            }
            ValidationError::DuplicateNodeKey { node_key } => {
                write!(f, "Duplicate node key: '{}'", node_key)
            }
        }
    }
}

impl std::error::Error for ValidationError {}
