//! HTTP origin for cache misses.
//!
//! ### URL Canonicalization
//! - Trim whitespace, ensure scheme (default: `https`)
//! - Lowercase host, remove fragments
//! - Query parameters merged and sorted by [`cache_key`]
//!
//! ### Limits
//! - Max redirects: 5 (configurable)
//! - Max body bytes: 5MB (configurable)
//! - Request timeout: 20s (configurable)

pub mod url;

use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use reqwest::{Client, header};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub use self::url::{UrlError, cache_key, canonicalize};

use crate::origin::{Origin, OriginResponse};
use pagecache_core::{AppConfig, Error};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "pagecache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

/// HTTP client serving as the cache's origin.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: Client,
    config: Arc<FetchConfig>,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::OriginFetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config: Arc::new(config) })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn fetch(&self, key: &str) -> Result<OriginResponse, Error> {
        let start = Instant::now();
        let url = canonicalize(key)?;

        let response = self
            .http
            .get(url.as_str())
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| Error::OriginFetch(format!("{key}: network error: {e}")))?;

        let max_bytes = self.config.max_bytes;
        if let Some(len) = response.content_length()
            && len > max_bytes as u64
        {
            return Err(Error::OriginFetch(format!("{key}: {len} bytes exceeds {max_bytes}")));
        }

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let encoding = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_of)
            .unwrap_or(UTF_8);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::OriginFetch(format!("{key}: failed to read response: {e}")))?;

        if bytes.len() > max_bytes {
            return Err(Error::OriginFetch(format!("{key}: {} bytes exceeds {max_bytes}", bytes.len())));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} -> {} [{}] in {}ms ({} bytes, {})",
            key,
            final_url,
            status,
            fetch_ms,
            bytes.len(),
            encoding.name()
        );

        let (body, _, _) = encoding.decode(&bytes);
        Ok(OriginResponse { key: key.to_string(), final_url, status, body: body.into_owned(), fetch_ms })
    }
}

/// The encoding named by the `charset` parameter of a Content-Type value.
///
/// Unknown or missing labels yield None.
fn charset_of(content_type: &str) -> Option<&'static Encoding> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .and_then(|(_, label)| Encoding::for_label(label.trim().trim_matches('"').as_bytes()))
}

#[async_trait]
impl Origin for FetchClient {
    async fn get(&self, key: &str) -> Result<OriginResponse, Error> {
        self.fetch(key).await
    }

    async fn get_many(&self, keys: &[String], concurrency: usize) -> Vec<OriginResponse> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for key in keys.iter().cloned() {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::warn!(error = %e, "fetch semaphore closed");
                    break;
                }
            };
            let client = self.clone();

            join_set.spawn(async move {
                // released when the fetch finishes
                let _permit = permit;
                let result = client.fetch(&key).await;
                (key, result)
            });
        }

        let mut responses = Vec::with_capacity(keys.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(response))) => responses.push(response),
                Ok((key, Err(e))) => tracing::debug!(%key, error = %e, "origin transport failure"),
                Err(e) => tracing::warn!(error = %e, "fetch task failed"),
            }
        }
        responses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> FetchClient {
        FetchClient::new(FetchConfig::default()).unwrap()
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "pagecache/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { user_agent: "bot/2".into(), max_bytes: 10, timeout_ms: 5, ..AppConfig::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.user_agent, "bot/2");
        assert_eq!(config.max_bytes, 10);
        assert_eq!(config.timeout, Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_get_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(query_param("id", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>hello</p>"))
            .mount(&server)
            .await;

        let key = format!("{}/page?id=7", server.uri());
        let response = client().get(&key).await.unwrap();

        assert_eq!(response.key, key);
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "<p>hello</p>");
        assert!(response.is_success());
    }

    #[test]
    fn test_charset_of() {
        assert_eq!(charset_of("text/html; charset=ISO-8859-1"), Some(encoding_rs::WINDOWS_1252));
        assert_eq!(charset_of("text/html;charset=\"utf-8\""), Some(UTF_8));
        assert_eq!(charset_of("text/html"), None);
        assert_eq!(charset_of("text/html; charset=bogus"), None);
    }

    #[tokio::test]
    async fn test_get_decodes_declared_charset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ficha"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(b"<p>Programa\xe7\xe3o</p>".to_vec(), "text/html; charset=iso-8859-1"),
            )
            .mount(&server)
            .await;

        let response = client().get(&format!("{}/ficha", server.uri())).await.unwrap();
        assert_eq!(response.body, "<p>Programação</p>");
    }

    #[tokio::test]
    async fn test_get_defaults_to_utf8() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<p>Programação</p>".as_bytes().to_vec(), "text/html"))
            .mount(&server)
            .await;

        let response = client().get(&format!("{}/utf8", server.uri())).await.unwrap();
        assert_eq!(response.body, "<p>Programação</p>");
    }

    #[tokio::test]
    async fn test_get_returns_error_status_as_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let response = client().get(&format!("{}/missing", server.uri())).await.unwrap();
        assert_eq!(response.status, 404);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_get_follows_redirect_keeps_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
            .mount(&server)
            .await;

        let key = format!("{}/old", server.uri());
        let response = client().get(&key).await.unwrap();

        assert_eq!(response.key, key);
        assert!(response.final_url.ends_with("/new"));
        assert_eq!(response.body, "moved");
    }

    #[tokio::test]
    async fn test_get_rejects_oversized_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
            .mount(&server)
            .await;

        let client = FetchClient::new(FetchConfig { max_bytes: 16, ..FetchConfig::default() }).unwrap();
        let result = client.get(&format!("{}/big", server.uri())).await;
        assert!(matches!(result, Err(Error::OriginFetch(_))));
    }

    #[tokio::test]
    async fn test_get_invalid_key() {
        let result = client().get("ftp://example.com/file").await;
        assert!(matches!(result, Err(Error::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_get_connection_refused() {
        let config = FetchConfig { timeout: Duration::from_secs(2), ..FetchConfig::default() };
        let client = FetchClient::new(config).unwrap();
        let result = client.get("http://127.0.0.1:1/").await;
        assert!(matches!(result, Err(Error::OriginFetch(_))));
    }

    #[tokio::test]
    async fn test_get_many_collects_responses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(5)
            .mount(&server)
            .await;

        let keys: Vec<String> = (0..5).map(|i| format!("{}/p{i}", server.uri())).collect();
        let mut got: Vec<String> = client().get_many(&keys, 2).await.into_iter().map(|r| r.key).collect();
        got.sort();

        let mut want = keys.clone();
        want.sort();
        assert_eq!(got, want);
    }

    #[tokio::test]
    async fn test_get_many_skips_transport_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let keys = vec![format!("{}/a", server.uri()), "ftp://bad/key".to_string()];
        let responses = client().get_many(&keys, 4).await;

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].key, keys[0]);
    }
}
