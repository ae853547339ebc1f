//! Expiry sweeps.
//!
//! Expired keys are collected first and deleted afterwards in one
//! transaction, so membership is never reasoned about while rows are being
//! removed.

use super::connection::CacheDb;
use crate::Error;
use chrono::Utc;
use std::collections::BTreeSet;
use tokio_rusqlite::params;

impl CacheDb {
    /// Delete expired entries.
    ///
    /// With `Some(keys)` only those keys are considered; keys absent from the
    /// store are ignored. With `None` the whole store is swept.
    ///
    /// Returns the number of deleted entries.
    pub async fn sweep(&self, keys: Option<&[String]>) -> Result<u64, Error> {
        let scope: Option<BTreeSet<String>> = keys.map(|keys| keys.iter().cloned().collect());
        let now = Utc::now().timestamp_millis();

        let deleted = self
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let expired: Vec<String> = {
                    let mut stmt = conn.prepare("SELECT key FROM entries WHERE expires_at <= ?1")?;
                    let rows = stmt.query_map(params![now], |row| row.get::<_, String>(0))?;
                    let mut expired = Vec::new();
                    for key in rows {
                        let key = key?;
                        if scope.as_ref().is_none_or(|scope| scope.contains(&key)) {
                            expired.push(key);
                        }
                    }
                    expired
                };

                if expired.is_empty() {
                    return Ok(0);
                }

                let tx = conn.transaction()?;
                let mut deleted = 0u64;
                {
                    let mut stmt = tx.prepare("DELETE FROM entries WHERE key = ?1")?;
                    for key in &expired {
                        deleted += stmt.execute(params![key])? as u64;
                    }
                }
                tx.commit()?;
                Ok(deleted)
            })
            .await
            .map_err(Error::from)?;

        if deleted > 0 {
            tracing::info!(deleted, scoped = keys.is_some(), "swept expired entries");
        }

        Ok(deleted)
    }
}
