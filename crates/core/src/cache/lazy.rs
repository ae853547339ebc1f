//! Store lifecycle helpers.
//!
//! [`LazyStore`] opens the store on first use and hands the same handle to
//! every later caller. [`with_store`] scopes a store to one future and closes
//! it whichever way that future finishes.

use super::connection::{CacheDb, OpenMode, StoreLocation};
use crate::Error;
use std::future::Future;
use tokio::sync::OnceCell;

/// A store that is opened on first use.
///
/// Concurrent first callers share a single open; once open, further
/// initialization attempts are no-ops. A failed open is not cached, so the
/// next caller retries.
#[derive(Debug)]
pub struct LazyStore {
    location: StoreLocation,
    mode: OpenMode,
    cell: OnceCell<CacheDb>,
}

impl LazyStore {
    pub fn new(location: impl Into<StoreLocation>, mode: OpenMode) -> Self {
        Self { location: location.into(), mode, cell: OnceCell::new() }
    }

    pub fn in_memory() -> Self {
        Self::new(StoreLocation::Memory, OpenMode::Create)
    }

    /// Get the store, opening it if this is the first call.
    pub async fn get(&self) -> Result<&CacheDb, Error> {
        self.cell
            .get_or_try_init(|| async {
                tracing::debug!(location = ?self.location, "opening page store lazily");
                CacheDb::open_at(&self.location, self.mode).await
            })
            .await
    }

    pub fn is_open(&self) -> bool {
        self.cell.initialized()
    }

    /// Close the store if it was ever opened.
    pub async fn close(self) -> Result<(), Error> {
        match self.cell.into_inner() {
            Some(db) => db.close().await,
            None => Ok(()),
        }
    }
}

/// Run `f` with a freshly opened store and close it afterwards.
///
/// The store is closed on every exit path of `f`. An error from `f` takes
/// precedence over an error from closing, which is then only logged.
pub async fn with_store<F, Fut, T>(location: impl Into<StoreLocation>, mode: OpenMode, f: F) -> Result<T, Error>
where
    F: FnOnce(CacheDb) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let db = CacheDb::open_at(&location.into(), mode).await?;
    let result = f(db.clone()).await;
    let closed = db.close().await;

    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            tracing::warn!(error = %close_err, "failed to close page store after error");
            Err(err)
        }
    }
}
