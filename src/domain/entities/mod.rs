//! Core domain entities.
//!
//! - [`UrlMapping`] - A short code paired with the long URL it redirects to

pub mod url_mapping;

pub use url_mapping::UrlMapping;
