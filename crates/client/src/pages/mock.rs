//! In-process origin for exercising the fetch paths.

use async_trait::async_trait;
use pagecache_core::Error;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::origin::{Origin, OriginResponse};

/// Serves canned responses. Unknown keys fail as transport errors.
#[derive(Debug, Default)]
pub(crate) struct MockOrigin {
    pages: HashMap<String, (u16, String)>,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl MockOrigin {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn page(mut self, key: &str, body: &str) -> Self {
        self.pages.insert(key.to_string(), (200, body.to_string()));
        self
    }

    pub(crate) fn status(mut self, key: &str, status: u16) -> Self {
        self.pages.insert(key.to_string(), (status, format!("status {status}")));
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Origin for MockOrigin {
    async fn get(&self, key: &str) -> Result<OriginResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(key.to_string());

        let (status, body) = self
            .pages
            .get(key)
            .cloned()
            .ok_or_else(|| Error::OriginFetch(format!("{key}: connection refused")))?;
        Ok(OriginResponse { key: key.to_string(), final_url: key.to_string(), status, body, fetch_ms: 1 })
    }
}
