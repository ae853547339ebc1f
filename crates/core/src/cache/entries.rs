//! Entry CRUD operations.
//!
//! Provides functions for reading, writing, and deleting cached payloads.

use super::connection::CacheDb;
use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A cached, already-reduced payload.
///
/// `expiry` is fixed when the entry is written and never extended; a later
/// write for the same key replaces the entry wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub expiry: DateTime<Utc>,
    pub payload: String,
}

impl CacheEntry {
    /// Whether the entry is still valid at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry > now
    }

    /// Whether the entry is still valid right now.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or(rusqlite::Error::IntegralValueOutOfRange(1, millis))
}

const UPSERT_SQL: &str = "INSERT INTO entries (key, expires_at, payload, stored_at)
     VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT(key) DO UPDATE SET
        expires_at = excluded.expires_at,
        payload = excluded.payload,
        stored_at = excluded.stored_at";

impl CacheDb {
    /// Insert or replace the entry for `entry.key`.
    pub async fn put_entry(&self, entry: &CacheEntry) -> Result<(), Error> {
        let entry = entry.clone();
        let stored_at = to_millis(Utc::now());
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(UPSERT_SQL, params![&entry.key, to_millis(entry.expiry), &entry.payload, stored_at])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace several entries in one transaction.
    ///
    /// Either every entry is written or none is.
    pub async fn put_entries(&self, entries: &[CacheEntry]) -> Result<(), Error> {
        if entries.is_empty() {
            return Ok(());
        }

        let entries = entries.to_vec();
        let stored_at = to_millis(Utc::now());
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(UPSERT_SQL)?;
                    for entry in &entries {
                        stmt.execute(params![&entry.key, to_millis(entry.expiry), &entry.payload, stored_at])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the entry stored under `key`, valid or not.
    ///
    /// Returns None if the key doesn't exist in the store.
    pub async fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare("SELECT key, expires_at, payload FROM entries WHERE key = ?1")?;

                let result = stmt.query_row(params![key], |row| {
                    Ok(CacheEntry { key: row.get(0)?, expiry: from_millis(row.get(1)?)?, payload: row.get(2)? })
                });

                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Get the entry for `key` only if it is still valid.
    pub async fn get_valid_entry(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        let now = Utc::now();
        Ok(self.get_entry(key).await?.filter(|entry| entry.is_valid_at(now)))
    }

    /// Delete the entry stored under `key`.
    ///
    /// Returns whether an entry was removed.
    pub async fn delete_entry(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM entries WHERE key = ?1", params![key])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// All keys currently in the store, valid or not.
    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT key FROM entries ORDER BY key")?;
                let keys = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every entry.
    ///
    /// Returns the number of deleted entries.
    pub async fn clear(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM entries", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
