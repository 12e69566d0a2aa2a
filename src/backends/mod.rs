// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pipe backend implementations.
//!
//! # Available Backends
//!
//! ## Native
//! In-process Rust pipes implementing [`PipeFunction`](crate::traits::PipeFunction).
//! [`native`] provides closure adapters and ready-made cursors so simple pipes
//! don't need a cursor type of their own.
//!
//! ## Core
//! The auxiliary pipes inserted for dataset nodes: an accumulator that folds
//! every new upstream block into the node's previous output, and a dedupe pipe
//! that keeps the newest row per unique key. Both are registered for the
//! native runtime and, as query text, for the query runtime.
//!
//! ## Stub Backend (Test-Only)
//! Pipes with scripted behavior for engine tests. Not available in
//! production builds.

pub mod core;
pub mod native;
#[cfg(test)]
pub mod stub;

pub use native::{cursor_fn, native_fn, Batches, FnCursor, FnPipe};
