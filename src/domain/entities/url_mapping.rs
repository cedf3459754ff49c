//! Short code to long URL mapping.

use serde::{Deserialize, Serialize};

/// Length of every generated short code.
pub const SHORT_CODE_LEN: usize = 8;

/// A persisted short URL and its destination.
///
/// Both sides are unique in the store: one code per long URL and one long URL
/// per code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlMapping {
    pub short_url: String,
    pub long_url: String,
}

impl UrlMapping {
    pub fn new(short_url: impl Into<String>, long_url: impl Into<String>) -> Self {
        Self {
            short_url: short_url.into(),
            long_url: long_url.into(),
        }
    }
}
