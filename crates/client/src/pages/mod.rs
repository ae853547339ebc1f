//! The page cache: lookups that go to the origin only when they must.
//!
//! A lookup checks the store first. On a miss, or when the entry has expired,
//! the key is fetched from the [`Origin`], classified, treated, and the
//! payload written back before it is returned. Nothing is written unless both
//! the fetch and the treatment succeed.

mod bulk;
#[cfg(test)]
pub(crate) mod mock;

pub use bulk::{BulkOptions, Dropped, Prefetch};

use chrono::Utc;
use pagecache_core::{AppConfig, CacheDb, CacheEntry, Error};

use crate::classify::Classifier;
use crate::fetch::{FetchClient, FetchConfig, cache_key};
use crate::origin::{Origin, OriginResponse};
use crate::treatment::Treated;

/// A persistent, classified cache in front of an origin.
#[derive(Debug)]
pub struct PageCache<O: Origin = FetchClient> {
    store: CacheDb,
    origin: O,
    classifier: Classifier,
}

impl PageCache<FetchClient> {
    /// Open the configured store and build an HTTP origin and the standard
    /// classification table.
    pub async fn open(config: &AppConfig) -> Result<Self, Error> {
        let store = CacheDb::open_with_mode(&config.db_path, config.open_mode).await?;
        let origin = FetchClient::new(FetchConfig::from(config))?;
        Ok(Self::new(store, origin, Classifier::standard(config.default_half_life())))
    }
}

impl<O: Origin> PageCache<O> {
    pub fn new(store: CacheDb, origin: O, classifier: Classifier) -> Self {
        Self { store, origin, classifier }
    }

    pub fn store(&self) -> &CacheDb {
        &self.store
    }

    pub fn origin(&self) -> &O {
        &self.origin
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Flush and close the underlying store.
    pub async fn close(self) -> Result<(), Error> {
        self.store.close().await
    }

    /// Get the payload for `key`.
    ///
    /// With `use_cache`, a valid stored entry is returned without touching the
    /// origin. Otherwise, or on a miss, the key is fetched and treated and the
    /// result stored.
    ///
    /// # Errors
    ///
    /// - `OriginFetch` for transport failures and non-success statuses
    /// - `Classification` when the body does not have the expected shape
    /// - `Store` when the backend fails
    pub async fn fetch(&self, key: &str, use_cache: bool) -> Result<String, Error> {
        if use_cache && let Some(entry) = self.store.get_valid_entry(key).await? {
            tracing::debug!(%key, "cache hit");
            return Ok(entry.payload);
        }

        tracing::debug!(%key, use_cache, "cache miss");
        let response = self.origin.get(key).await?;
        let treated = self.treat_response(&response)?;

        let entry = CacheEntry { key: key.to_string(), expiry: treated.expiry, payload: treated.payload };
        self.store.put_entry(&entry).await?;
        Ok(entry.payload)
    }

    /// Like [`fetch`](Self::fetch), for `base` with extra query parameters.
    ///
    /// The key is normalized with [`cache_key`] first, so parameter order
    /// does not matter.
    pub async fn fetch_with_params<K, V>(&self, base: &str, params: &[(K, V)], use_cache: bool) -> Result<String, Error>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let key = cache_key(base, params)?;
        self.fetch(&key, use_cache).await
    }

    /// Delete every expired entry. Returns how many were removed.
    pub async fn sweep(&self) -> Result<u64, Error> {
        self.store.sweep(None).await
    }

    /// Empty the store. Returns how many entries were removed.
    pub async fn reset(&self) -> Result<u64, Error> {
        let removed = self.store.clear().await?;
        tracing::info!(removed, "reset page store");
        Ok(removed)
    }

    /// Treat a successful response, or explain why it cannot be cached.
    fn treat_response(&self, response: &OriginResponse) -> Result<Treated, Error> {
        if !response.is_success() {
            return Err(Error::OriginFetch(format!("{}: status {}", response.key, response.status)));
        }

        let classification = self.classifier.classify(&response.key);
        tracing::debug!(key = %response.key, class = classification.label, "classified");
        classification
            .treatment
            .apply(&response.body, Utc::now(), &mut rand::thread_rng())
    }
}
