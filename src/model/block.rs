// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{BlockId, StorageRef};

/// A single row of a block.
pub type Record = Map<String, Value>;

/// The rows of a block, in the order the producing pipe emitted them.
pub type Records = Vec<Record>;

/// A node's checkpoint blob.
pub type StateMap = Map<String, Value>;

/// Metadata of an immutable batch of records.
///
/// The records themselves live in block storage under `storage_ref`; a
/// `DataBlock` is never mutated once its OUTPUT link is committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataBlock {
    pub id: BlockId,
    pub record_count: usize,
    pub expected_schema_key: String,
    pub realized_schema_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub storage_ref: StorageRef,
}
