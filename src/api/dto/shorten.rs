//! DTOs for the shorten endpoint.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to shorten a single URL.
#[derive(Debug, Deserialize, Validate)]
pub struct ShortenRequest {
    #[validate(
        url(message = "Invalid URL format"),
        length(min = 1, max = 1024, message = "URL must be 1-1024 characters")
    )]
    pub url: String,
}

/// Shortened URL.
#[derive(Debug, Serialize, Deserialize)]
pub struct ShortenResponse {
    /// Full short URL to hand out.
    pub url: String,
    pub short_id: String,
}
