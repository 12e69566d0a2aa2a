// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Maximum number of characters of an error trace kept on a pipe log
pub const DEFAULT_MAX_TRACE_CHARS: usize = 5000;
/// Name of the self-referential input port
pub const SELF_PORT: &str = "this";
/// Schema reference that matches anything and never binds a generic
pub const ANY_SCHEMA: &str = "Any";
/// Suffix of the accumulator node inserted for dataset nodes
pub const ACCUMULATOR_SUFFIX: &str = "__accumulator";
/// Suffix of the dedupe node inserted for dataset nodes
pub const DEDUPE_SUFFIX: &str = "__dedupe";
/// Suffix of the default output alias of non-dataset nodes
pub const LATEST_SUFFIX: &str = "_latest";
/// Node config key holding the dedupe columns
pub const UNIQUE_ON_KEY: &str = "unique_on";
/// Pipe keys of the built-in auxiliary pipes
pub const ACCUMULATOR_PIPE: &str = "core.accumulator";
pub const DEDUPE_PIPE: &str = "core.dedupe_keep_newest";
pub const SQL_ACCUMULATOR_PIPE: &str = "core.sql_accumulator";
pub const SQL_DEDUPE_PIPE: &str = "core.sql_dedupe_keep_newest";
