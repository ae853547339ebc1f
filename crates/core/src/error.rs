//! Unified error types for pagecache.
//!
//! Display strings carry a stable code prefix so callers and logs can tell
//! origin, classification, and store failures apart at a glance.

use tokio_rusqlite::rusqlite;

/// Unified error type for the cache and its fetch paths.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Non-success status or transport failure while fetching a key.
    #[error("ORIGIN_FETCH: {0}")]
    OriginFetch(String),

    /// A treatment could not reduce the fetched body as expected.
    #[error("CLASSIFICATION: {0}")]
    Classification(String),

    /// The persistent backend failed to open, read, or write.
    #[error("STORE_IO: {0}")]
    Store(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_IO: migration failed: {0}")]
    MigrationFailed(String),

    /// A key could not be normalized.
    #[error("INVALID_KEY: {0}")]
    InvalidKey(String),

    /// Invalid call parameters (e.g., zero concurrency).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Whether this error came from the persistent store.
    ///
    /// Store failures are never tolerated by the bulk path.
    pub fn is_store(&self) -> bool {
        matches!(self, Error::Store(_) | Error::MigrationFailed(_))
    }

    /// Stable error code, matching the display prefix.
    pub fn code(&self) -> &'static str {
        match self {
            Error::OriginFetch(_) => "ORIGIN_FETCH",
            Error::Classification(_) => "CLASSIFICATION",
            Error::Store(_) | Error::MigrationFailed(_) => "STORE_IO",
            Error::InvalidKey(_) => "INVALID_KEY",
            Error::InvalidInput(_) => "INVALID_INPUT",
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Store(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Store(tokio_rusqlite::Error::Close(c)),
            _ => Error::Store(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Store(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Store(tokio_rusqlite::Error::Error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::OriginFetch("https://example.com: status 404".to_string());
        assert!(err.to_string().starts_with("ORIGIN_FETCH"));
        assert!(err.to_string().contains("status 404"));
    }

    #[test]
    fn test_error_code_matches_display() {
        let errors = [
            Error::OriginFetch("a".into()),
            Error::Classification("b".into()),
            Error::MigrationFailed("c".into()),
            Error::InvalidKey("d".into()),
            Error::InvalidInput("e".into()),
        ];
        for err in errors {
            assert!(err.to_string().starts_with(err.code()));
        }
    }

    #[test]
    fn test_is_store() {
        assert!(Error::Store(tokio_rusqlite::Error::ConnectionClosed).is_store());
        assert!(Error::MigrationFailed("boom".into()).is_store());
        assert!(!Error::OriginFetch("x".into()).is_store());
        assert!(!Error::Classification("x".into()).is_store());
    }

    #[test]
    fn test_from_rusqlite_error() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(err.is_store());
        assert_eq!(err.code(), "STORE_IO");
    }
}
