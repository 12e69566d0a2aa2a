// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod context;
pub mod executor;
pub mod options;
pub mod outcome;
mod run;

pub use context::PipeContext;
pub use executor::Engine;
pub use options::EngineOptions;
pub use outcome::{NodeRun, ProduceOutcome, RunStatus};
