// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod execution;
mod graph;
mod store;

pub use config::ValidationError;
pub use execution::ExecutionError;
pub use graph::GraphError;
pub use store::{StorageError, StoreError};
