// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Errors produced by [`MetadataStore`](crate::storage::MetadataStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// `SQLite` failure with the operation that triggered it.
    #[error("{context}: {source}")]
    Context {
        context: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// File-system I/O failure (e.g. creating the database directory).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON column could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored timestamp could not be parsed.
    #[error("invalid timestamp '{0}'")]
    Timestamp(String),

    /// A stored enum column held an unexpected value.
    #[error("invalid {column} value '{value}'")]
    InvalidColumn { column: &'static str, value: String },

    /// Internal mutex was poisoned by a panicked thread.
    #[error("metadata store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub(crate) fn context(context: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| StoreError::Context { context, source }
    }
}

/// Errors produced by [`BlockStorage`](crate::storage::BlockStorage) backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The storage reference does not point at anything this backend holds.
    #[error("no block stored at '{0}'")]
    NotFound(String),

    /// The storage reference belongs to a different backend.
    #[error("storage reference '{0}' is not handled by this backend")]
    ForeignReference(String),

    #[error("block storage lock poisoned")]
    LockPoisoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_error_names_operation() {
        let err = StoreError::context("commit_segment: begin tx")(
            rusqlite::Error::QueryReturnedNoRows,
        );
        assert!(err.to_string().starts_with("commit_segment: begin tx"));
    }

    #[test]
    fn lock_poisoned_displays() {
        assert_eq!(
            StoreError::LockPoisoned.to_string(),
            "metadata store lock poisoned"
        );
    }

    #[test]
    fn storage_not_found_displays_reference() {
        let err = StorageError::NotFound("memory://abc".into());
        assert!(err.to_string().contains("memory://abc"));
    }
}
