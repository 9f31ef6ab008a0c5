//! Core types and shared functionality for swcache.
//!
//! This crate provides:
//! - Generational response cache with SQLite backend
//! - Request/response model shared by the network client and the worker
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, Generation};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{CachedResponse, Destination, FetchRequest, RequestMode, ResponseKind};
