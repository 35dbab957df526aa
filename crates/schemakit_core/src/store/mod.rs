//! SQLite document storage.
//!
//! # Responsibility
//! - Open and configure SQLite connections and apply schema migrations.
//! - Persist documents of every model as JSON bodies in one table.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Reads exclude soft-deleted documents unless a filter asks otherwise.
//! - Rows are only physically removed through `DocumentStore::destroy`.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod document_store;
pub mod migrations;
mod open;

pub use document_store::{
    DeletedFilter, DocumentQuery, DocumentStore, SqliteDocumentStore, StoreError, StoreResult,
};
pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Connection bootstrap and migration failure.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// Database directory could not be created.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Database was migrated by a newer binary.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::Io { path, source } => {
                write!(f, "cannot prepare database directory `{}`: {source}", path.display())
            }
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "document store schema v{db_version} is newer than this build (v{latest_supported})"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
