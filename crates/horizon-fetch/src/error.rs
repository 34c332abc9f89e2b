//! Error types for Horizon Fetch.

use std::path::PathBuf;

use crate::change::ChangeKind;

/// Result type alias for data source operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or configuring a data source.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The initial fetch could not be satisfied.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The collaborator could not materialize results.
///
/// Only raised at construction time. A data source whose fetch failed is
/// never handed out; retry policy belongs to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The request names an entity the store does not know.
    #[error("Unknown entity '{entity}'")]
    UnknownEntity { entity: String },

    /// A record cannot be grouped by the requested key.
    #[error("Records cannot be grouped by '{key}'")]
    InvalidGroupingKey { key: String },

    /// The cache name is already bound to a different request.
    #[error("Cache '{cache_name}' is already in use by a different request")]
    CacheConflict { cache_name: String },

    /// Any other collaborator failure.
    #[error("Store error: {0}")]
    Store(String),
}

impl FetchError {
    /// Create an unknown-entity error.
    pub fn unknown_entity(entity: impl Into<String>) -> Self {
        Self::UnknownEntity {
            entity: entity.into(),
        }
    }

    /// Create a grouping-key error.
    pub fn invalid_grouping_key(key: impl Into<String>) -> Self {
        Self::InvalidGroupingKey { key: key.into() }
    }

    /// Create a cache conflict error.
    pub fn cache_conflict(cache_name: impl Into<String>) -> Self {
        Self::CacheConflict {
            cache_name: cache_name.into(),
        }
    }
}

/// A notification arrived without a path its kind requires.
///
/// This is a contract violation by the collaborator. The collector turns it
/// into a panic instead of guessing a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NotificationError {
    /// `Updated`, `Deleted` and `Moved` require the old path.
    #[error("{kind:?} notification is missing its old index path")]
    MissingOldPath { kind: ChangeKind },

    /// `Inserted` and `Moved` require the new path.
    #[error("{kind:?} notification is missing its new index path")]
    MissingNewPath { kind: ChangeKind },
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The TOML text is malformed or does not match the schema.
    #[error("Invalid data source configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration file could not be read.
    #[error("Failed to read configuration '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
