// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Built-in auxiliary pipes for dataset nodes.

mod accumulator;
mod dedupe;

use std::sync::Arc;

pub use accumulator::Accumulator;
pub use dedupe::{dedupe_keep_newest, DedupeKeepNewest};

use crate::config::consts::{
    ACCUMULATOR_PIPE, DEDUPE_PIPE, SELF_PORT, SQL_ACCUMULATOR_PIPE, SQL_DEDUPE_PIPE,
};
use crate::environment::{AuxiliaryPipes, Environment};
use crate::errors::GraphError;
use crate::interface::Interface;
use crate::pipe::{Pipe, RuntimeClass};

/// Input port of both auxiliary pipes.
pub const INPUT_PORT: &str = "input";

const SQL_ACCUMULATOR: &str = "SELECT * FROM {{ this }} UNION ALL SELECT * FROM {{ input }}";
const SQL_DEDUPE: &str = "SELECT * FROM (\
     SELECT *, ROW_NUMBER() OVER (PARTITION BY {{ unique_on }} ORDER BY __row DESC) AS __rank \
     FROM {{ input }}) WHERE __rank = 1";

fn accumulator_interface() -> Result<Interface, GraphError> {
    Interface::builder()
        .input(INPUT_PORT, "DataBlockStream[T]")
        .input(SELF_PORT, "DataBlock[T]")
        .output("DataBlock[T]")
        .build()
}

fn dedupe_interface() -> Result<Interface, GraphError> {
    Interface::builder()
        .input(INPUT_PORT, "DataBlock[T]")
        .output("DataBlock[T]")
        .with_context()
        .build()
}

/// Register the core pipes and the per-runtime auxiliary pipe table.
pub fn register_core_pipes(env: &mut Environment) -> Result<(), GraphError> {
    env.register_pipe(Pipe::native(
        ACCUMULATOR_PIPE,
        accumulator_interface()?,
        Arc::new(Accumulator),
    ));
    env.register_pipe(Pipe::native(
        DEDUPE_PIPE,
        dedupe_interface()?,
        Arc::new(DedupeKeepNewest),
    ));
    env.register_pipe(Pipe::query(
        SQL_ACCUMULATOR_PIPE,
        accumulator_interface()?,
        SQL_ACCUMULATOR,
    ));
    env.register_pipe(Pipe::query(
        SQL_DEDUPE_PIPE,
        dedupe_interface()?,
        SQL_DEDUPE,
    ));

    env.register_auxiliary(
        RuntimeClass::Native,
        AuxiliaryPipes {
            accumulator: ACCUMULATOR_PIPE.to_string(),
            dedupe: DEDUPE_PIPE.to_string(),
        },
    );
    env.register_auxiliary(
        RuntimeClass::Query,
        AuxiliaryPipes {
            accumulator: SQL_ACCUMULATOR_PIPE.to_string(),
            dedupe: SQL_DEDUPE_PIPE.to_string(),
        },
    );
    Ok(())
}

/// List all core pipe keys
pub fn list_core_pipes() -> Vec<&'static str> {
    vec![
        ACCUMULATOR_PIPE,
        DEDUPE_PIPE,
        SQL_ACCUMULATOR_PIPE,
        SQL_DEDUPE_PIPE,
    ]
}
