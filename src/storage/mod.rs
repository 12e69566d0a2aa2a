// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Durable state: block records in a [`BlockStorage`] backend, block metadata,
//! lineage and node checkpoints in a [`MetadataStore`].

mod blocks;
mod metadata;
mod sqlite;

pub use blocks::{BlockStorage, FileBlockStorage, MemoryBlockStorage, StorageClass};
pub use metadata::{LineageRow, MetadataStore, PipeLogDraft, SegmentCommit};
pub use sqlite::SqliteMetadataStore;
