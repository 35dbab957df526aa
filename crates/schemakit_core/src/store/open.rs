//! Connection bootstrap for the document store.
//!
//! # Responsibility
//! - Open file-backed or in-memory SQLite connections.
//! - Configure them and run migrations before handing them out.
//!
//! # Invariants
//! - Returned connections are at `migrations::latest_version`.
//! - File databases run in WAL mode; their parent directory exists.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{debug, error, info};
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

enum Target {
    File(PathBuf),
    Memory,
}

impl Target {
    fn label(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Memory => ":memory:".to_string(),
        }
    }
}

/// Opens (creating if needed) the database at `path`, then migrates it.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open(Target::File(path.as_ref().to_path_buf()))
}

/// Opens a private in-memory database, then migrates it.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open(Target::Memory)
}

fn open(target: Target) -> DbResult<Connection> {
    let started_at = Instant::now();
    let label = target.label();

    let result = connect(&target).and_then(|mut conn| {
        configure(&conn, &target)?;
        apply_migrations(&mut conn)?;
        Ok(conn)
    });

    match &result {
        Ok(_) => info!(
            "event=db_open module=store status=ok target={label} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=store status=error target={label} duration_ms={} error={err}",
            started_at.elapsed().as_millis()
        ),
    }
    result
}

fn connect(target: &Target) -> DbResult<Connection> {
    match target {
        Target::Memory => Ok(Connection::open_in_memory()?),
        Target::File(path) => {
            if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|source| DbError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            Ok(Connection::open(path)?)
        }
    }
}

fn configure(conn: &Connection, target: &Target) -> DbResult<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    if let Target::File(_) = target {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("event=db_configure module=store status=ok journal_mode={mode}");
    }
    Ok(())
}
