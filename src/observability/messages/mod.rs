// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for human-readable output and
//! [`StructuredLog`] to emit itself with structured fields at its own level.
//!
//! # Organization
//!
//! * `engine` - produce request lifecycle and node resets
//! * `node` - node runs, skips and batch commits
//! * `graph` - node declaration and configuration loading

use tracing::Span;

pub mod engine;
pub mod graph;
pub mod node;

/// A log message that knows its level and structured fields.
pub trait StructuredLog {
    /// Emit the message as a tracing event.
    fn log(&self);

    /// Open a span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
