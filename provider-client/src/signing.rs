//! Request signing
//!
//! Every authenticated call carries four headers:
//!
//! | Header | Value |
//! |--------|-------|
//! | `X-App-Key` | application key |
//! | `X-Consumer-Key` | consumer key |
//! | `X-Timestamp` | unix seconds |
//! | `X-Signature` | `$1$` + hex(sha256(secret+consumer+method+url+body+ts)) |
//!
//! The signature scheme is vendor-shaped, not wire-exact.

use sha2::{Digest, Sha256};

/// Compute the request signature header value
pub fn sign(
    app_secret: &str,
    consumer_key: &str,
    method: &str,
    url: &str,
    body: &str,
    timestamp: i64,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(app_secret.as_bytes());
    hasher.update(b"+");
    hasher.update(consumer_key.as_bytes());
    hasher.update(b"+");
    hasher.update(method.as_bytes());
    hasher.update(b"+");
    hasher.update(url.as_bytes());
    hasher.update(b"+");
    hasher.update(body.as_bytes());
    hasher.update(b"+");
    hasher.update(timestamp.to_string().as_bytes());
    format!("$1${}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic() {
        let a = sign("secret", "ck", "GET", "https://x/v1/catalog", "", 1700000000);
        let b = sign("secret", "ck", "GET", "https://x/v1/catalog", "", 1700000000);
        assert_eq!(a, b);
        assert!(a.starts_with("$1$"));
        assert_eq!(a.len(), 3 + 64);
    }

    #[test]
    fn signature_varies_with_every_input() {
        let base = sign("s", "c", "GET", "u", "", 1);
        assert_ne!(base, sign("x", "c", "GET", "u", "", 1));
        assert_ne!(base, sign("s", "x", "GET", "u", "", 1));
        assert_ne!(base, sign("s", "c", "POST", "u", "", 1));
        assert_ne!(base, sign("s", "c", "GET", "v", "", 1));
        assert_ne!(base, sign("s", "c", "GET", "u", "{}", 1));
        assert_ne!(base, sign("s", "c", "GET", "u", "", 2));
    }
}
