// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for graph construction and configuration loading.

use crate::errors::ValidationError;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A node was declared.
///
/// # Log Level
/// `debug!` - Construction detail
pub struct NodeAdded<'a> {
    pub node_key: &'a str,
    pub pipe_key: &'a str,
    pub output_schema: &'a str,
    pub produces_dataset: bool,
}

impl Display for NodeAdded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Added node '{}' using pipe '{}' with output schema {}{}",
            self.node_key,
            self.pipe_key,
            self.output_schema,
            if self.produces_dataset { " (dataset)" } else { "" }
        )
    }
}

impl StructuredLog for NodeAdded<'_> {
    fn log(&self) {
        tracing::debug!(
            node_key = self.node_key,
            pipe_key = self.pipe_key,
            output_schema = self.output_schema,
            produces_dataset = self.produces_dataset,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("node_added", span_name = name, node_key = self.node_key)
    }
}

/// A graph document was loaded.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ConfigLoaded<'a> {
    pub source: &'a str,
    pub node_count: usize,
}

impl Display for ConfigLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Loaded graph configuration from {} with {} nodes",
            self.source, self.node_count
        )
    }
}

impl StructuredLog for ConfigLoaded<'_> {
    fn log(&self) {
        tracing::info!(source = self.source, node_count = self.node_count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("config_loaded", span_name = name, source = self.source)
    }
}

/// A graph document failed validation.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct ValidationProblem<'a> {
    pub error: &'a ValidationError,
}

impl Display for ValidationProblem<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Configuration problem: {}", self.error)
    }
}

impl StructuredLog for ValidationProblem<'_> {
    fn log(&self) {
        tracing::error!(problem = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("config_validation", span_name = name)
    }
}
