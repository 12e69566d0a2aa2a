// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! `SQLite`-backed implementation of [`MetadataStore`].
//!
//! Uses a single `Mutex<Connection>` for thread safety. Timestamps are stored
//! as RFC 3339 text with a fixed nanosecond width so that text order matches
//! time order. Node state and cursor queries are keyed by node scope; the
//! graph id is kept on each pipe log as provenance.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};

use super::metadata::{LineageRow, MetadataStore, SegmentCommit};
use crate::errors::StoreError;
use crate::model::{
    BlockId, DataBlock, DataBlockLog, Direction, GraphId, NodeScope, PipeError, PipeLog, StateMap,
    StorageRef,
};

/// Idempotent DDL for the metadata tables.
const CREATE_TABLES: &str = r"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS node_state (
    node_scope TEXT PRIMARY KEY,
    node_key TEXT NOT NULL,
    graph_id TEXT NOT NULL,
    state TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pipe_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    graph_id TEXT NOT NULL,
    node_scope TEXT NOT NULL,
    node_key TEXT NOT NULL,
    node_start_state TEXT NOT NULL,
    node_end_state TEXT NOT NULL,
    pipe_key TEXT NOT NULL,
    pipe_config TEXT NOT NULL,
    runtime_ref TEXT NOT NULL,
    queued_at TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    error TEXT
);

CREATE INDEX IF NOT EXISTS idx_pipe_log_scope ON pipe_log (node_scope);

CREATE TABLE IF NOT EXISTS data_block_metadata (
    id TEXT PRIMARY KEY,
    record_count INTEGER NOT NULL,
    expected_schema_key TEXT NOT NULL,
    realized_schema_key TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    storage_ref TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS data_block_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pipe_log_id INTEGER NOT NULL REFERENCES pipe_log(id),
    data_block_id TEXT NOT NULL REFERENCES data_block_metadata(id),
    direction TEXT NOT NULL CHECK (direction IN ('input', 'output')),
    processed_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_block_single_producer
    ON data_block_log (data_block_id) WHERE direction = 'output';
CREATE INDEX IF NOT EXISTS idx_block_log_block ON data_block_log (data_block_id, direction);
CREATE INDEX IF NOT EXISTS idx_block_log_pipe_log ON data_block_log (pipe_log_id);
";

const BLOCK_COLUMNS: &str = "m.id, m.record_count, m.expected_schema_key, m.realized_schema_key, \
     m.created_at, m.updated_at, m.storage_ref";

const PIPE_LOG_COLUMNS: &str = "id, graph_id, node_scope, node_key, pipe_key, pipe_config, \
     runtime_ref, node_start_state, node_end_state, queued_at, started_at, completed_at, error";

/// `SQLite` metadata storage.
///
/// Create with [`SqliteMetadataStore::open`] for file-backed persistence
/// or [`SqliteMetadataStore::in_memory`] for tests.
pub struct SqliteMetadataStore {
    conn: Mutex<Connection>,
}

impl SqliteMetadataStore {
    /// Open or create a metadata database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory can't be created, or
    /// [`StoreError::Sqlite`] if the database can't be opened.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::initialize(conn)
    }

    /// Create an in-memory database (for tests and demos).
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(CREATE_TABLES)
            .map_err(StoreError::context("initialize: create tables"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    #[cfg(test)]
    fn count(&self, table: &str) -> Result<i64, StoreError> {
        let conn = self.lock_conn()?;
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?)
    }
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|_| StoreError::Timestamp(raw.to_string()))
}

fn parse_state(raw: &str) -> Result<StateMap, StoreError> {
    Ok(serde_json::from_str(raw)?)
}

struct BlockRow {
    id: String,
    record_count: i64,
    expected_schema_key: String,
    realized_schema_key: String,
    created_at: String,
    updated_at: String,
    storage_ref: String,
}

impl BlockRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            record_count: row.get(1)?,
            expected_schema_key: row.get(2)?,
            realized_schema_key: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
            storage_ref: row.get(6)?,
        })
    }

    fn into_block(self) -> Result<DataBlock, StoreError> {
        let record_count =
            usize::try_from(self.record_count).map_err(|_| StoreError::InvalidColumn {
                column: "record_count",
                value: self.record_count.to_string(),
            })?;
        Ok(DataBlock {
            id: BlockId::new(self.id),
            record_count,
            expected_schema_key: self.expected_schema_key,
            realized_schema_key: self.realized_schema_key,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            storage_ref: StorageRef::new(self.storage_ref),
        })
    }
}

struct PipeLogRow {
    id: i64,
    graph_id: String,
    node_scope: String,
    node_key: String,
    pipe_key: String,
    pipe_config: String,
    runtime_ref: String,
    start_state: String,
    end_state: String,
    queued_at: String,
    started_at: String,
    completed_at: Option<String>,
    error: Option<String>,
}

impl PipeLogRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            graph_id: row.get(1)?,
            node_scope: row.get(2)?,
            node_key: row.get(3)?,
            pipe_key: row.get(4)?,
            pipe_config: row.get(5)?,
            runtime_ref: row.get(6)?,
            start_state: row.get(7)?,
            end_state: row.get(8)?,
            queued_at: row.get(9)?,
            started_at: row.get(10)?,
            completed_at: row.get(11)?,
            error: row.get(12)?,
        })
    }

    fn into_log(self) -> Result<PipeLog, StoreError> {
        let error: Option<PipeError> = match self.error {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };
        Ok(PipeLog {
            id: self.id,
            graph_id: GraphId::new(self.graph_id),
            node_scope: NodeScope::new(self.node_scope),
            node_key: self.node_key,
            pipe_key: self.pipe_key,
            pipe_config: parse_state(&self.pipe_config)?,
            runtime_ref: self.runtime_ref,
            start_state: parse_state(&self.start_state)?,
            end_state: parse_state(&self.end_state)?,
            queued_at: parse_timestamp(&self.queued_at)?,
            started_at: parse_timestamp(&self.started_at)?,
            completed_at: self.completed_at.as_deref().map(parse_timestamp).transpose()?,
            error,
        })
    }
}

fn parse_direction(raw: String) -> Result<Direction, StoreError> {
    raw.parse().map_err(|value| StoreError::InvalidColumn {
        column: "direction",
        value,
    })
}

impl MetadataStore for SqliteMetadataStore {
    fn node_state(&self, node: &NodeScope) -> Result<Option<StateMap>, StoreError> {
        let conn = self.lock_conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT state FROM node_state WHERE node_scope = ?1",
                [node.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        raw.as_deref().map(parse_state).transpose()
    }

    fn delete_node_state(&self, node: &NodeScope) -> Result<bool, StoreError> {
        let conn = self.lock_conn()?;
        let removed = conn.execute("DELETE FROM node_state WHERE node_scope = ?1", [node.as_str()])?;
        Ok(removed > 0)
    }

    #[allow(clippy::cast_possible_wrap)]
    fn commit_segment(&self, commit: &SegmentCommit<'_>) -> Result<i64, StoreError> {
        let end_state = serde_json::to_string(commit.end_state)?;
        let error = commit.error.map(serde_json::to_string).transpose()?;
        let completed_at = commit.completed_at.map(timestamp);
        let now = timestamp(Utc::now());

        let conn = self.lock_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(StoreError::context("commit_segment: begin tx"))?;

        let pipe_log_id = match commit.pipe_log_id {
            Some(id) => {
                tx.execute(
                    "UPDATE pipe_log SET node_end_state = ?1, \
                     completed_at = COALESCE(?2, completed_at), error = COALESCE(?3, error) \
                     WHERE id = ?4",
                    rusqlite::params![end_state, completed_at, error, id],
                )
                .map_err(StoreError::context("commit_segment: update pipe log"))?;
                id
            }
            None => {
                let draft = commit.draft;
                tx.execute(
                    "INSERT INTO pipe_log (graph_id, node_scope, node_key, node_start_state, \
                     node_end_state, pipe_key, pipe_config, runtime_ref, queued_at, started_at, \
                     completed_at, error) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    rusqlite::params![
                        draft.graph_id.as_str(),
                        draft.node_scope.as_str(),
                        draft.node_key,
                        serde_json::to_string(&draft.start_state)?,
                        end_state,
                        draft.pipe_key,
                        serde_json::to_string(&draft.pipe_config)?,
                        draft.runtime_ref,
                        timestamp(draft.queued_at),
                        timestamp(draft.started_at),
                        completed_at,
                        error,
                    ],
                )
                .map_err(StoreError::context("commit_segment: insert pipe log"))?;
                tx.last_insert_rowid()
            }
        };

        if let Some(block) = commit.output {
            tx.execute(
                "INSERT INTO data_block_metadata (id, record_count, expected_schema_key, \
                 realized_schema_key, created_at, updated_at, storage_ref) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    block.id.as_str(),
                    block.record_count as i64,
                    block.expected_schema_key,
                    block.realized_schema_key,
                    timestamp(block.created_at),
                    timestamp(block.updated_at),
                    block.storage_ref.as_str(),
                ],
            )
            .map_err(StoreError::context("commit_segment: insert block"))?;
            tx.execute(
                "INSERT INTO data_block_log (pipe_log_id, data_block_id, direction, processed_at) \
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![pipe_log_id, block.id.as_str(), Direction::Output.as_str(), now],
            )
            .map_err(StoreError::context("commit_segment: insert output log"))?;
        }

        if !commit.inputs.is_empty() {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO data_block_log (pipe_log_id, data_block_id, direction, processed_at) \
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(StoreError::context("commit_segment: prepare input log"))?;
            for block_id in commit.inputs {
                stmt.execute(rusqlite::params![
                    pipe_log_id,
                    block_id.as_str(),
                    Direction::Input.as_str(),
                    now
                ])
                .map_err(StoreError::context("commit_segment: insert input log"))?;
            }
        }

        if commit.persist_state {
            tx.execute(
                "INSERT INTO node_state (node_scope, node_key, graph_id, state, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(node_scope) DO UPDATE SET graph_id = ?3, state = ?4, updated_at = ?5",
                rusqlite::params![
                    commit.draft.node_scope.as_str(),
                    commit.draft.node_key,
                    commit.draft.graph_id.as_str(),
                    end_state,
                    now
                ],
            )
            .map_err(StoreError::context("commit_segment: upsert node state"))?;
        }

        tx.commit()
            .map_err(StoreError::context("commit_segment: commit"))?;
        Ok(pipe_log_id)
    }

    fn unconsumed_blocks(
        &self,
        consumer: &NodeScope,
        producers: &[NodeScope],
    ) -> Result<Vec<DataBlock>, StoreError> {
        if producers.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders: Vec<String> = (0..producers.len()).map(|i| format!("?{}", i + 2)).collect();
        let sql = format!(
            "SELECT {BLOCK_COLUMNS} FROM data_block_metadata m \
             JOIN data_block_log o ON o.data_block_id = m.id AND o.direction = 'output' \
             JOIN pipe_log p ON p.id = o.pipe_log_id \
             WHERE p.node_scope IN ({}) \
             AND NOT EXISTS ( \
                 SELECT 1 FROM data_block_log i JOIN pipe_log c ON c.id = i.pipe_log_id \
                 WHERE i.data_block_id = m.id AND i.direction = 'input' \
                 AND c.node_scope = ?1) \
             ORDER BY m.created_at, m.rowid",
            placeholders.join(", ")
        );

        let mut params: Vec<&str> = vec![consumer.as_str()];
        params.extend(producers.iter().map(NodeScope::as_str));

        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(StoreError::context("unconsumed_blocks: prepare"))?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params), BlockRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(BlockRow::into_block).collect()
    }

    fn latest_output(&self, producer: &NodeScope) -> Result<Option<DataBlock>, StoreError> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {BLOCK_COLUMNS} FROM data_block_metadata m \
                     JOIN data_block_log o ON o.data_block_id = m.id AND o.direction = 'output' \
                     JOIN pipe_log p ON p.id = o.pipe_log_id \
                     WHERE p.node_scope = ?1 \
                     ORDER BY m.created_at DESC, m.rowid DESC LIMIT 1"
                ),
                [producer.as_str()],
                BlockRow::from_row,
            )
            .optional()?;
        row.map(BlockRow::into_block).transpose()
    }

    fn has_consumed(&self, consumer: &NodeScope, block: &BlockId) -> Result<bool, StoreError> {
        let conn = self.lock_conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM data_block_log i JOIN pipe_log c ON c.id = i.pipe_log_id \
                 WHERE i.data_block_id = ?1 AND i.direction = 'input' \
                 AND c.node_scope = ?2 LIMIT 1",
                rusqlite::params![block.as_str(), consumer.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn block(&self, id: &BlockId) -> Result<Option<DataBlock>, StoreError> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {BLOCK_COLUMNS} FROM data_block_metadata m WHERE m.id = ?1"),
                [id.as_str()],
                BlockRow::from_row,
            )
            .optional()?;
        row.map(BlockRow::into_block).transpose()
    }

    fn pipe_logs(&self, node: &NodeScope) -> Result<Vec<PipeLog>, StoreError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PIPE_LOG_COLUMNS} FROM pipe_log WHERE node_scope = ?1 ORDER BY id"
        ))?;
        let rows = stmt
            .query_map([node.as_str()], PipeLogRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(PipeLogRow::into_log).collect()
    }

    fn block_logs(&self, pipe_log_id: i64) -> Result<Vec<DataBlockLog>, StoreError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, pipe_log_id, data_block_id, direction, processed_at \
             FROM data_block_log WHERE pipe_log_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([pipe_log_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|(id, pipe_log_id, block_id, direction, processed_at)| -> Result<_, StoreError> {
                Ok(DataBlockLog {
                    id,
                    pipe_log_id,
                    data_block_id: BlockId::new(block_id),
                    direction: parse_direction(direction)?,
                    processed_at: parse_timestamp(&processed_at)?,
                })
            })
            .collect()
    }

    fn lineage(&self) -> Result<Vec<LineageRow>, StoreError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT l.pipe_log_id, p.graph_id, p.node_key, l.direction, l.data_block_id, \
             m.record_count, l.processed_at \
             FROM data_block_log l \
             JOIN pipe_log p ON p.id = l.pipe_log_id \
             JOIN data_block_metadata m ON m.id = l.data_block_id \
             ORDER BY l.id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(
                |(pipe_log_id, graph_id, node_key, direction, block_id, record_count, processed_at)|
                 -> Result<_, StoreError> {
                    Ok(LineageRow {
                        pipe_log_id,
                        graph_id: GraphId::new(graph_id),
                        node_key,
                        direction: parse_direction(direction)?,
                        block_id: BlockId::new(block_id),
                        record_count: usize::try_from(record_count).unwrap_or_default(),
                        processed_at: parse_timestamp(&processed_at)?,
                    })
                },
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PipeLogDraft;
    use serde_json::json;

    fn graph() -> GraphId {
        GraphId::new("g1")
    }

    fn scope(node_key: &str) -> NodeScope {
        NodeScope::new(format!("scope-{}", node_key))
    }

    fn draft(node_key: &str) -> PipeLogDraft {
        let now = Utc::now();
        PipeLogDraft {
            graph_id: graph(),
            node_scope: scope(node_key),
            node_key: node_key.to_string(),
            pipe_key: "pipe".to_string(),
            pipe_config: StateMap::new(),
            runtime_ref: "native".to_string(),
            start_state: StateMap::new(),
            queued_at: now,
            started_at: now,
        }
    }

    fn block(record_count: usize) -> DataBlock {
        let now = Utc::now();
        let id = BlockId::generate();
        DataBlock {
            storage_ref: StorageRef::new(format!("memory://{}", id)),
            id,
            record_count,
            expected_schema_key: "Any".to_string(),
            realized_schema_key: "Any".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn state(value: serde_json::Value) -> StateMap {
        value.as_object().unwrap().clone()
    }

    fn produce(store: &SqliteMetadataStore, node_key: &str, output: &DataBlock) -> i64 {
        let draft = draft(node_key);
        store
            .commit_segment(&SegmentCommit {
                pipe_log_id: None,
                draft: &draft,
                output: Some(output),
                inputs: &[],
                end_state: &StateMap::new(),
                persist_state: false,
                completed_at: Some(Utc::now()),
                error: None,
            })
            .unwrap()
    }

    fn consume(store: &SqliteMetadataStore, node_key: &str, inputs: &[BlockId]) -> i64 {
        let draft = draft(node_key);
        store
            .commit_segment(&SegmentCommit {
                pipe_log_id: None,
                draft: &draft,
                output: None,
                inputs,
                end_state: &StateMap::new(),
                persist_state: false,
                completed_at: None,
                error: None,
            })
            .unwrap()
    }

    #[test]
    fn commit_segment_inserts_then_updates_pipe_log() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        let draft = draft("source");
        let first = block(2);
        let end = state(json!({"records_extracted": 2}));

        let id = store
            .commit_segment(&SegmentCommit {
                pipe_log_id: None,
                draft: &draft,
                output: Some(&first),
                inputs: &[],
                end_state: &end,
                persist_state: true,
                completed_at: None,
                error: None,
            })
            .unwrap();

        let failure = PipeError::new("boom", "boom trace", 5000);
        let again = store
            .commit_segment(&SegmentCommit {
                pipe_log_id: Some(id),
                draft: &draft,
                output: None,
                inputs: &[],
                end_state: &end,
                persist_state: false,
                completed_at: Some(Utc::now()),
                error: Some(&failure),
            })
            .unwrap();
        assert_eq!(id, again);

        let logs = store.pipe_logs(&scope("source")).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].end_state, end);
        assert_eq!(logs[0].error.as_ref(), Some(&failure));
        assert!(logs[0].completed_at.is_some());
        assert_eq!(store.node_state(&scope("source")).unwrap(), Some(end));

        let links = store.block_logs(id).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].direction, Direction::Output);
        assert_eq!(links[0].data_block_id, first.id);
    }

    #[test]
    fn unconsumed_blocks_excludes_consumed_and_keeps_order() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        let blocks: Vec<DataBlock> = (0..3).map(|_| block(1)).collect();
        for b in &blocks {
            produce(&store, "source", b);
        }

        let pending = store.unconsumed_blocks(&scope("sink"), &[scope("source")]).unwrap();
        let ids: Vec<_> = pending.iter().map(|b| b.id.clone()).collect();
        assert_eq!(ids, blocks.iter().map(|b| b.id.clone()).collect::<Vec<_>>());

        consume(&store, "sink", &[blocks[0].id.clone()]);
        let pending = store.unconsumed_blocks(&scope("sink"), &[scope("source")]).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, blocks[1].id);
        assert!(store.has_consumed(&scope("sink"), &blocks[0].id).unwrap());

        // Another consumer is unaffected.
        let other = store.unconsumed_blocks(&scope("other"), &[scope("source")]).unwrap();
        assert_eq!(other.len(), 3);
        assert!(store.unconsumed_blocks(&scope("sink"), &[]).unwrap().is_empty());
    }

    #[test]
    fn unconsumed_blocks_merges_producers_by_creation() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        let a1 = block(1);
        produce(&store, "a", &a1);
        let b1 = block(1);
        produce(&store, "b", &b1);
        let a2 = block(1);
        produce(&store, "a", &a2);

        let merged = store.unconsumed_blocks(&scope("union"), &[scope("a"), scope("b")]).unwrap();
        let ids: Vec<_> = merged.into_iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![a1.id, b1.id, a2.id]);
    }

    #[test]
    fn latest_output_is_newest_block() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        assert!(store.latest_output(&scope("source")).unwrap().is_none());
        produce(&store, "source", &block(1));
        let newest = block(5);
        produce(&store, "source", &newest);
        let latest = store.latest_output(&scope("source")).unwrap().unwrap();
        assert_eq!(latest.id, newest.id);
        assert_eq!(latest.record_count, 5);
        assert_eq!(store.block(&newest.id).unwrap(), Some(latest));
    }

    #[test]
    fn a_block_has_a_single_producer() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        let shared = block(1);
        produce(&store, "a", &shared);

        let draft = draft("b");
        let result = store.commit_segment(&SegmentCommit {
            pipe_log_id: None,
            draft: &draft,
            output: Some(&shared),
            inputs: &[],
            end_state: &StateMap::new(),
            persist_state: false,
            completed_at: None,
            error: None,
        });
        assert!(result.is_err());
        // Nothing from the failed transaction is visible.
        assert!(store.pipe_logs(&scope("b")).unwrap().is_empty());
        assert_eq!(store.count("pipe_log").unwrap(), 1);
    }

    #[test]
    fn node_state_is_keyed_by_scope() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        let draft = draft("source");
        store
            .commit_segment(&SegmentCommit {
                pipe_log_id: None,
                draft: &draft,
                output: None,
                inputs: &[],
                end_state: &state(json!({"n": 1})),
                persist_state: true,
                completed_at: None,
                error: None,
            })
            .unwrap();

        assert!(store.node_state(&NodeScope::new("scope-other")).unwrap().is_none());
        assert!(store.delete_node_state(&scope("source")).unwrap());
        assert!(!store.delete_node_state(&scope("source")).unwrap());
        assert!(store.node_state(&scope("source")).unwrap().is_none());
        // Logs survive a reset.
        assert_eq!(store.pipe_logs(&scope("source")).unwrap().len(), 1);
    }

    #[test]
    fn scope_cursors_span_graph_versions() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        let first = block(2);
        produce(&store, "source", &first);

        let mut later = draft("source");
        later.graph_id = GraphId::new("g2");
        store
            .commit_segment(&SegmentCommit {
                pipe_log_id: None,
                draft: &later,
                output: None,
                inputs: &[],
                end_state: &state(json!({"n": 2})),
                persist_state: true,
                completed_at: None,
                error: None,
            })
            .unwrap();

        let logs = store.pipe_logs(&scope("source")).unwrap();
        let graphs: Vec<&str> = logs.iter().map(|log| log.graph_id.as_str()).collect();
        assert_eq!(graphs, vec!["g1", "g2"]);
        assert_eq!(logs[1].node_scope, scope("source"));
        assert_eq!(store.latest_output(&scope("source")).unwrap().map(|b| b.id), Some(first.id));
        assert_eq!(store.node_state(&scope("source")).unwrap(), Some(state(json!({"n": 2}))));
    }

    #[test]
    fn lineage_joins_logs_with_blocks() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        let out = block(3);
        produce(&store, "source", &out);
        consume(&store, "sink", &[out.id.clone()]);

        let rows = store.lineage().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].direction, Direction::Output);
        assert_eq!(rows[0].node_key, "source");
        assert_eq!(rows[1].direction, Direction::Input);
        assert_eq!(rows[1].record_count, 3);
    }

    #[test]
    fn file_backed_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta").join("blockflow.db");
        {
            let store = SqliteMetadataStore::open(&path).unwrap();
            produce(&store, "source", &block(1));
        }
        let store = SqliteMetadataStore::open(&path).unwrap();
        assert_eq!(store.pipe_logs(&scope("source")).unwrap().len(), 1);
    }
}
