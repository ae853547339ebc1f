//! Bulk lookups.
//!
//! A bulk lookup first populates the store for every key that needs it, then
//! reads each key back in order through the single-key path. Population
//! tolerates per-key failures: a key that cannot be fetched or treated is
//! dropped from the population phase and retried once during read-back, where
//! its error lands in that key's slot. Store failures abort the whole call.

use pagecache_core::{AppConfig, CacheEntry, Error};
use std::collections::{HashMap, HashSet};

use super::PageCache;
use crate::origin::{Origin, OriginResponse};

/// Options for [`PageCache::fetch_many`] and [`PageCache::prefetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkOptions {
    /// Maximum origin requests in flight. Must be at least 1.
    pub concurrency: usize,
    /// Serve valid stored entries instead of refetching them.
    pub use_cache: bool,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for BulkOptions {
    fn from(config: &AppConfig) -> Self {
        Self { concurrency: config.concurrency, use_cache: true }
    }
}

/// A key left out of the store during population.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dropped {
    pub key: String,
    pub reason: String,
}

/// What a population pass did with each distinct key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prefetch {
    /// Keys that already had a valid entry and were not fetched.
    pub cached: Vec<String>,
    /// Keys fetched, treated and written.
    pub stored: Vec<String>,
    /// Keys that could not be stored.
    pub dropped: Vec<Dropped>,
}

impl Prefetch {
    fn drop_key(&mut self, key: &str, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(%key, %reason, "dropped key from bulk population");
        self.dropped.push(Dropped { key: key.to_string(), reason });
    }
}

impl<O: Origin> PageCache<O> {
    /// Populate the store for `keys` without returning payloads.
    ///
    /// Expired entries among `keys` are swept first. Every distinct key
    /// without a valid entry (every distinct key, without `use_cache`) is
    /// fetched with at most `options.concurrency` requests in flight. All
    /// successful treatments are written in one transaction.
    pub async fn prefetch(&self, keys: &[String], options: BulkOptions) -> Result<Prefetch, Error> {
        if options.concurrency == 0 {
            return Err(Error::InvalidInput("concurrency must be at least 1".into()));
        }

        self.store.sweep(Some(keys)).await?;

        let mut report = Prefetch::default();
        let mut seen = HashSet::new();
        let mut work = Vec::new();
        for key in keys {
            if !seen.insert(key.as_str()) {
                continue;
            }
            if options.use_cache && self.store.get_valid_entry(key).await?.is_some() {
                report.cached.push(key.clone());
            } else {
                work.push(key.clone());
            }
        }

        if work.is_empty() {
            return Ok(report);
        }

        let mut responses: HashMap<String, OriginResponse> = self
            .origin
            .get_many(&work, options.concurrency)
            .await
            .into_iter()
            .map(|response| (response.key.clone(), response))
            .collect();

        let mut entries = Vec::with_capacity(work.len());
        for key in work {
            let Some(response) = responses.remove(&key) else {
                report.drop_key(&key, "no response from origin");
                continue;
            };
            match self.treat_response(&response) {
                Ok(treated) => {
                    report.stored.push(key.clone());
                    entries.push(CacheEntry { key, expiry: treated.expiry, payload: treated.payload });
                }
                Err(e) => report.drop_key(&key, e.to_string()),
            }
        }

        self.store.put_entries(&entries).await?;
        tracing::info!(
            cached = report.cached.len(),
            stored = report.stored.len(),
            dropped = report.dropped.len(),
            "bulk population finished"
        );
        Ok(report)
    }

    /// Get the payloads for `keys`, in order.
    ///
    /// Each slot holds that key's payload or the error that prevented it. The
    /// outer result fails only on invalid options or a store failure.
    pub async fn fetch_many(&self, keys: &[String], options: BulkOptions) -> Result<Vec<Result<String, Error>>, Error> {
        let report = self.prefetch(keys, options).await?;
        let populated: HashSet<&str> = report.stored.iter().map(String::as_str).collect();

        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            let use_cache = options.use_cache || populated.contains(key.as_str());
            match self.fetch(key, use_cache).await {
                Err(e) if e.is_store() => return Err(e),
                result => results.push(result),
            }
        }
        Ok(results)
    }
}
