mod attendance;
mod courses;
mod coursework;
mod events;
mod migrations;
pub mod models;
mod users;

pub use models::*;

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{Connection, ErrorCode};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{entity} already exists: {detail}")]
    Conflict { entity: &'static str, detail: String },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid {entity}: {reason}")]
    Invalid { entity: &'static str, reason: String },

    #[error("database schema version {db_version} is newer than the supported version {latest_supported}")]
    UnsupportedSchemaVersion { db_version: u32, latest_supported: u32 },
}

impl StoreError {
    /// Maps SQLite constraint failures onto the store taxonomy; anything else
    /// stays a raw SQLite error.
    fn from_constraint(err: rusqlite::Error, entity: &'static str, detail: String) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE {
                    StoreError::Conflict { entity, detail }
                } else {
                    StoreError::Invalid {
                        entity,
                        reason: err.to_string(),
                    }
                }
            }
            _ => StoreError::Sqlite(err),
        }
    }
}

/// Shared handle to the planner database. User-scoped calls only see rows
/// reachable through the user's courses.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database file and apply pending migrations.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        log::info!("Store: opening database at {}", path.display());
        Self::bootstrap(Connection::open(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        log::debug!("Store: opening in-memory database");
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(mut conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        migrations::apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Liveness check for the health endpoint.
    pub fn ping(&self) -> StoreResult<()> {
        self.conn()
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Timestamps are persisted at whole-second precision so their text form
/// sorts chronologically.
fn stamp(value: DateTime<Utc>) -> DateTime<Utc> {
    value.trunc_subsecs(0)
}

fn now() -> DateTime<Utc> {
    stamp(Utc::now())
}
