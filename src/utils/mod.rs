//! Helpers for the shorten path.
//!
//! - [`code_generator`] - Deterministic short code derivation
//! - [`http_url`] - Validation of submitted long URLs

pub mod code_generator;
pub mod http_url;
