// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod pipe;

pub use pipe::{Batch, BatchCursor, PipeFunction, PipeInputs, PortInput, QueryRuntime};
