//! URL canonicalization and cache key construction.

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<UrlError> for pagecache_core::Error {
    fn from(err: UrlError) -> Self {
        pagecache_core::Error::InvalidKey(err.to_string())
    }
}

/// Canonicalize a URL string for consistent caching.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let host = host.to_lowercase();
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Build the cache key for `base` plus extra query parameters.
///
/// The base is canonicalized, its existing query pairs are merged with
/// `params`, and the pairs are sorted by name. Values under the same name keep
/// their relative order, so repeated parameters stay meaningful.
pub fn cache_key<K, V>(base: &str, params: &[(K, V)]) -> Result<String, UrlError>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut url = canonicalize(base)?;

    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    pairs.extend(
        params
            .iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string())),
    );
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(&pairs);
    }

    Ok(url.to_string())
}
