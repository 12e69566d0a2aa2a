// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Persistent entities: data blocks, execution logs and their identifiers.

mod block;
mod ids;
mod log;

pub use block::{DataBlock, Record, Records, StateMap};
pub use ids::{BlockId, GraphId, NodeScope, StorageRef};
pub use log::{DataBlockLog, Direction, PipeError, PipeLog};
