//! Short code derivation.
//!
//! Codes are derived from the long URL itself, so shortening the same URL
//! twice yields the same code and two different URLs may, rarely, collide.
//! Both cases surface as a store conflict.

use base64::Engine as _;
use sha2::{Digest, Sha256};

use crate::domain::entities::url_mapping::SHORT_CODE_LEN;

/// Derives the short code for `long_url`.
///
/// Hashes the URL with SHA-256, encodes the digest as URL-safe base64
/// without padding and keeps the first [`SHORT_CODE_LEN`] characters.
///
/// # Examples
///
/// ```ignore
/// let code = short_code("https://example.com");
/// assert_eq!(code.len(), 8);
/// assert_eq!(code, short_code("https://example.com"));
/// ```
pub fn short_code(long_url: &str) -> String {
    let digest = Sha256::digest(long_url.as_bytes());
    let mut encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest);
    encoded.truncate(SHORT_CODE_LEN);
    encoded
}
