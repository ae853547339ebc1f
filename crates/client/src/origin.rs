//! The origin boundary: where cache misses go to be fetched.
//!
//! The cache only needs a status and a body per key. Redirects, timeouts and
//! transport details stay behind this trait.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use pagecache_core::Error;

/// A fetched document, before any treatment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginResponse {
    /// The key that was requested. Always the caller's key, even after
    /// redirects, so results can be paired with their requests.
    pub key: String,
    /// Where the document was finally served from.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Decoded response body.
    pub body: String,
    /// Time taken to fetch in milliseconds.
    pub fetch_ms: u64,
}

impl OriginResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Source of documents for cache misses.
#[async_trait]
pub trait Origin: Send + Sync {
    /// Fetch one key.
    ///
    /// Non-success statuses are returned as responses; only transport
    /// failures are errors.
    async fn get(&self, key: &str) -> Result<OriginResponse, Error>;

    /// Fetch many keys with at most `concurrency` requests in flight.
    ///
    /// Responses arrive in completion order. Keys whose transport failed are
    /// omitted.
    async fn get_many(&self, keys: &[String], concurrency: usize) -> Vec<OriginResponse> {
        stream::iter(keys.iter().cloned())
            .map(|key| async move {
                let result = self.get(&key).await;
                (key, result)
            })
            .buffer_unordered(concurrency.max(1))
            .filter_map(|(key, result)| async move {
                match result {
                    Ok(response) => Some(response),
                    Err(e) => {
                        tracing::debug!(%key, error = %e, "origin transport failure");
                        None
                    }
                }
            })
            .collect()
            .await
    }
}
