//! Core types and shared functionality for pagecache.
//!
//! This crate provides:
//! - Persistent entry store with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheEntry, LazyStore, OpenMode, StoreLocation, with_store};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
