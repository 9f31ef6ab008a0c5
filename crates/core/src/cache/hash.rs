//! Request key generation.

use sha2::{Digest, Sha256};
use url::Url;

/// Compute the cache key for a request.
///
/// The method is upper-cased and the URL fragment dropped, so `GET /a#top`
/// and `get /a` share one entry.
pub fn compute_request_key(method: &str, url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);

    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_key_stability() {
        let key1 = compute_request_key("GET", &url("https://example.com/app.js"));
        let key2 = compute_request_key("GET", &url("https://example.com/app.js"));
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_key_ignores_method_case_and_fragment() {
        let key1 = compute_request_key("get", &url("https://example.com/#top"));
        let key2 = compute_request_key("GET", &url("https://example.com/"));
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_key_distinguishes_query() {
        let key1 = compute_request_key("GET", &url("https://example.com/?v=1"));
        let key2 = compute_request_key("GET", &url("https://example.com/?v=2"));
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_key_format() {
        let key = compute_request_key("GET", &url("https://example.com"));
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
