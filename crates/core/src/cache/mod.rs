//! SQLite-backed generational response cache.
//!
//! A cache generation is a named key→response map. The engine keeps exactly
//! one generation current and deletes the rest on activation. Storage uses
//! SQLite with async access via tokio-rusqlite and supports:
//!
//! - Request keys derived from method and canonical URL (SHA-256)
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Last-write-wins upserts per key

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use generations::Generation;
