//! Client code for swcache.
//!
//! This crate provides the outbound side of the proxy: the network fetch
//! used by the caching strategies, and the OAuth token-exchange client used
//! by the relay.

pub mod fetch;
pub mod token;

pub use fetch::{FetchClient, FetchConfig, Network};
pub use token::{TokenClient, TokenConfig, TokenError, TokenGrant};
