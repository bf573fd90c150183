//! Key/value document store contracts.
//!
//! # Responsibility
//! - Define the persistence adapter used to mirror planner state.
//! - Provide in-memory and SQLite implementations.
//!
//! # Invariants
//! - A document is always written whole; there is no partial/field update.
//! - Each key has a revision that strictly increases with every save.
//! - Two saves to the same key never interleave: each save is atomic.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Key of the persisted unit list.
pub const UNITS_KEY: &str = "units";
/// Key of the persisted half-term table.
pub const HALF_TERMS_KEY: &str = "half-terms";

/// Per-key monotonic write counter. First save yields `1`.
pub type Revision = u64;

pub type StoreResult<T> = Result<T, StoreError>;

/// Raw document as held by a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub value: String,
    pub revision: Revision,
}

#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// A writer panicked while holding the store lock.
    Poisoned,
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Stored row cannot be read back as a document.
    InvalidData(String),
    /// In-memory structure could not be encoded as JSON.
    Encode(serde_json::Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Poisoned => write!(f, "document store lock poisoned"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "document store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid stored document: {message}"),
            Self::Encode(err) => write!(f, "failed to encode document: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Encode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Durable key/value store of opaque JSON documents.
pub trait KeyValueStore {
    /// Returns the document under `key`, or `None` when absent.
    fn load(&self, key: &str) -> StoreResult<Option<StoredDocument>>;
    /// Replaces the document under `key` and returns its new revision.
    fn save(&self, key: &str, value: &str) -> StoreResult<Revision>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &S {
    fn load(&self, key: &str) -> StoreResult<Option<StoredDocument>> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &str) -> StoreResult<Revision> {
        (**self).save(key, value)
    }
}
