//! Database connection management with pragma configuration.
//!
//! This module handles opening the SQLite database in the requested
//! [`OpenMode`], applying pragmas for durability and concurrency (WAL mode),
//! running migrations, and closing the store deterministically.

use super::migrations;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio_rusqlite::Connection;
use tokio_rusqlite::rusqlite::OpenFlags;

const READ_WRITE_PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

const READ_ONLY_PRAGMAS: &str = "PRAGMA query_only=ON;
     PRAGMA temp_store=MEMORY;";

/// How the backing file is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Create the store if it does not exist.
    #[default]
    Create,
    /// Open read-write, failing if the store does not exist.
    Existing,
    /// Open read-only, failing if the store does not exist.
    ReadOnly,
    /// Create the store if needed and discard any existing entries.
    Truncate,
}

impl OpenMode {
    fn flags(self) -> OpenFlags {
        let base = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        match self {
            OpenMode::Create | OpenMode::Truncate => {
                base | OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
            OpenMode::Existing => base | OpenFlags::SQLITE_OPEN_READ_WRITE,
            OpenMode::ReadOnly => base | OpenFlags::SQLITE_OPEN_READ_ONLY,
        }
    }

    pub fn is_read_only(self) -> bool {
        matches!(self, OpenMode::ReadOnly)
    }
}

/// Where the store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// A database file on disk.
    File(PathBuf),
    /// A private in-memory database, mostly for tests.
    Memory,
}

impl From<PathBuf> for StoreLocation {
    fn from(path: PathBuf) -> Self {
        StoreLocation::File(path)
    }
}

impl From<&Path> for StoreLocation {
    fn from(path: &Path) -> Self {
        StoreLocation::File(path.to_path_buf())
    }
}

/// Cache database handle.
///
/// Wraps a tokio-rusqlite Connection that runs every database operation
/// on one background thread, so writes are serialized no matter how many
/// tasks share a cloned handle.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
    mode: OpenMode,
}

impl CacheDb {
    /// Open a database at the specified path, creating it if needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::open_with_mode(path, OpenMode::Create).await
    }

    /// Open a database at the specified path in the given mode.
    ///
    /// Applies pragmas and runs any pending migrations unless the mode is
    /// read-only. [`OpenMode::Truncate`] empties the store after migrating.
    pub async fn open_with_mode(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self, Error> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(path, mode.flags())
            .await
            .map_err(|e| Error::Store(e.into()))?;

        let db = Self::prepare(conn, mode).await?;
        tracing::info!(path = %path.display(), ?mode, "opened page store");
        Ok(db)
    }

    /// Open an in-memory database for testing.
    ///
    /// Creates a temporary in-memory SQLite database with the same
    /// pragma configuration as file-based databases.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Store(e.into()))?;

        Self::prepare(conn, OpenMode::Create).await
    }

    /// Open the store at `location`.
    pub async fn open_at(location: &StoreLocation, mode: OpenMode) -> Result<Self, Error> {
        match location {
            StoreLocation::File(path) => Self::open_with_mode(path, mode).await,
            StoreLocation::Memory => Self::open_in_memory().await,
        }
    }

    async fn prepare(conn: Connection, mode: OpenMode) -> Result<Self, Error> {
        let pragmas = if mode.is_read_only() { READ_ONLY_PRAGMAS } else { READ_WRITE_PRAGMAS };
        conn.call(move |conn| {
            conn.execute_batch(pragmas)?;
            Ok(())
        })
        .await
        .map_err(Error::Store)?;

        if !mode.is_read_only() {
            migrations::run(&conn).await?;
        }

        let db = Self { conn, mode };
        if mode == OpenMode::Truncate {
            let discarded = db.clear().await?;
            tracing::debug!(discarded, "truncated page store on open");
        }

        Ok(db)
    }

    /// The mode this handle was opened with.
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Flush and close the store.
    ///
    /// Checkpoints the WAL into the main database file, then closes the
    /// connection. Other clones of this handle fail with a store error
    /// afterwards.
    pub async fn close(self) -> Result<(), Error> {
        if !self.mode.is_read_only() {
            self.conn
                .call(|conn| -> Result<(), Error> {
                    conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
                    Ok(())
                })
                .await
                .map_err(Error::from)?;
        }

        self.conn.close().await.map_err(Error::from)?;
        tracing::info!("closed page store");
        Ok(())
    }
}
