//! SQLite-backed store for classified page payloads.
//!
//! This module provides a persistent key → (expiry, payload) map using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Explicit open modes (create, existing, read-only, truncate)
//! - Automatic schema migrations
//! - WAL mode, checkpointed on close
//! - Lazy once-only opening and scoped acquisition
//! - Expiry sweeps over a key set or the whole store

pub mod connection;
pub mod entries;
pub mod lazy;
pub mod migrations;
pub mod sweep;

pub use crate::Error;

pub use connection::{CacheDb, OpenMode, StoreLocation};
pub use entries::CacheEntry;
pub use lazy::{LazyStore, with_store};
