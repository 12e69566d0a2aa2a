// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Message types follow a struct-based pattern with a `Display`
//! implementation so log text lives in one place instead of being scattered
//! as string literals through the engine.
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::engine` - produce request lifecycle
//! * `messages::node` - node runs, batch commits and skips
//! * `messages::graph` - graph construction and configuration loading
//!
//! # Usage
//!
//! ```rust
//! use blockflow::observability::messages::node::NodeSkipped;
//! use blockflow::observability::messages::StructuredLog;
//!
//! NodeSkipped {
//!     node_key: "metrics",
//!     reason: "no new input",
//! }
//! .log();
//! ```

pub mod messages;

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG`, or by `default_filter`
/// when `RUST_LOG` is unset. Does nothing if a global subscriber is already set.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
