//! Ports the domain layer depends on.
//!
//! Traits here are implemented in `crate::infrastructure`. `UrlStore` has a
//! `mockall` mock for unit tests.
//!
//! - [`UrlStore`] - Authoritative short URL storage
//! - [`AnalyticsSink`] - Destination for analytics events

pub mod analytics_sink;
pub mod url_store;

pub use analytics_sink::{AnalyticsSink, SinkError};
pub use url_store::{StoreError, UrlStore};

#[cfg(test)]
pub use url_store::MockUrlStore;
