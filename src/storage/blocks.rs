// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::errors::StorageError;
use crate::model::{BlockId, Record, Records, StorageRef};

/// Kind of backend holding block records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageClass {
    Memory,
    File,
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageClass::Memory => f.write_str("memory"),
            StorageClass::File => f.write_str("file"),
        }
    }
}

/// Where block records live.
///
/// Writes happen once per block, before the block's metadata is committed;
/// reads may happen any number of times afterwards.
pub trait BlockStorage: Send + Sync {
    fn class(&self) -> StorageClass;

    /// Persist `records` for `block_id`, returning the reference to store on the block.
    fn write(&self, block_id: &BlockId, records: &Records) -> Result<StorageRef, StorageError>;

    fn read(&self, storage_ref: &StorageRef) -> Result<Records, StorageError>;
}

const MEMORY_SCHEME: &str = "memory://";
const FILE_SCHEME: &str = "file://";

/// Process-local block storage for tests and demos.
#[derive(Debug, Default)]
pub struct MemoryBlockStorage {
    blocks: RwLock<HashMap<String, Records>>,
}

impl MemoryBlockStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlockStorage for MemoryBlockStorage {
    fn class(&self) -> StorageClass {
        StorageClass::Memory
    }

    fn write(&self, block_id: &BlockId, records: &Records) -> Result<StorageRef, StorageError> {
        let mut blocks = self.blocks.write().map_err(|_| StorageError::LockPoisoned)?;
        blocks.insert(block_id.as_str().to_string(), records.clone());
        Ok(StorageRef::new(format!("{}{}", MEMORY_SCHEME, block_id)))
    }

    fn read(&self, storage_ref: &StorageRef) -> Result<Records, StorageError> {
        let key = storage_ref
            .as_str()
            .strip_prefix(MEMORY_SCHEME)
            .ok_or_else(|| StorageError::ForeignReference(storage_ref.to_string()))?;
        let blocks = self.blocks.read().map_err(|_| StorageError::LockPoisoned)?;
        blocks
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(storage_ref.to_string()))
    }
}

/// Stores each block as a JSON-lines file named after the block id.
#[derive(Debug, Clone)]
pub struct FileBlockStorage {
    root: PathBuf,
}

impl FileBlockStorage {
    /// Use `root` as the block directory, creating it when missing.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, storage_ref: &StorageRef) -> Result<PathBuf, StorageError> {
        let name = storage_ref
            .as_str()
            .strip_prefix(FILE_SCHEME)
            .ok_or_else(|| StorageError::ForeignReference(storage_ref.to_string()))?;
        Ok(self.root.join(name))
    }
}

impl BlockStorage for FileBlockStorage {
    fn class(&self) -> StorageClass {
        StorageClass::File
    }

    fn write(&self, block_id: &BlockId, records: &Records) -> Result<StorageRef, StorageError> {
        let name = format!("{}.jsonl", block_id);
        let mut writer = BufWriter::new(File::create(self.root.join(&name))?);
        for record in records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(StorageRef::new(format!("{}{}", FILE_SCHEME, name)))
    }

    fn read(&self, storage_ref: &StorageRef) -> Result<Records, StorageError> {
        let path = self.path_for(storage_ref)?;
        if !path.exists() {
            return Err(StorageError::NotFound(storage_ref.to_string()));
        }
        let reader = BufReader::new(File::open(path)?);
        let mut records = Records::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: Record = serde_json::from_str(&line)?;
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Records {
        vec![
            json!({"id": 1, "name": "ada"}).as_object().unwrap().clone(),
            json!({"id": 2, "name": "grace"}).as_object().unwrap().clone(),
        ]
    }

    #[test]
    fn memory_storage_reads_back_written_records() {
        let storage = MemoryBlockStorage::new();
        let id = BlockId::generate();
        let reference = storage.write(&id, &sample()).unwrap();
        assert!(reference.as_str().starts_with("memory://"));
        assert_eq!(storage.read(&reference).unwrap(), sample());
        assert_eq!(storage.class(), StorageClass::Memory);
    }

    #[test]
    fn memory_storage_reports_missing_blocks() {
        let storage = MemoryBlockStorage::new();
        let err = storage.read(&StorageRef::new("memory://nope")).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        let err = storage.read(&StorageRef::new("file://x.jsonl")).unwrap_err();
        assert!(matches!(err, StorageError::ForeignReference(_)));
    }

    #[test]
    fn file_storage_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileBlockStorage::open(dir.path().join("blocks")).unwrap();
        let id = BlockId::generate();
        let reference = storage.write(&id, &sample()).unwrap();

        let on_disk =
            std::fs::read_to_string(dir.path().join("blocks").join(format!("{}.jsonl", id)))
                .unwrap();
        assert_eq!(on_disk.lines().count(), 2);
        assert_eq!(storage.read(&reference).unwrap(), sample());
    }

    #[test]
    fn file_storage_handles_empty_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileBlockStorage::open(dir.path()).unwrap();
        let reference = storage.write(&BlockId::generate(), &Records::new()).unwrap();
        assert!(storage.read(&reference).unwrap().is_empty());
        let missing = storage.read(&StorageRef::new("file://missing.jsonl"));
        assert!(matches!(missing, Err(StorageError::NotFound(_))));
    }
}
