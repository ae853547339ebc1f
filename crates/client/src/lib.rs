//! Fetch pipeline for pagecache.
//!
//! This crate provides the HTTP origin, key classification and treatments,
//! and the [`PageCache`] that ties them to the store in `pagecache-core`.

pub mod classify;
pub mod fetch;
pub mod origin;
pub mod pages;
pub mod treatment;

pub use classify::{Classification, Classifier, Matcher, ResourceClass, Rule};
pub use fetch::{FetchClient, FetchConfig, UrlError, cache_key, canonicalize};
pub use origin::{Origin, OriginResponse};
pub use pages::{BulkOptions, Dropped, PageCache, Prefetch};
pub use treatment::{ExpiryPolicy, Reduction, Treated, Treatment};
