//! Repository trait for the authoritative short URL store.

use crate::domain::entities::UrlMapping;
use crate::resilience::Classify;
use async_trait::async_trait;
use thiserror::Error;

/// Failures reported by a [`UrlStore`].
///
/// Only [`StoreError::Unavailable`] is worth retrying; the rest describe the
/// data or the query and will fail the same way again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("short URL not found")]
    NotFound,

    #[error("mapping already exists: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store query failed: {0}")]
    Query(String),
}

impl Classify for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Authoritative storage for short URL mappings.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgUrlStore`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UrlStore: Send + Sync {
    /// Resolves a short code to its long URL.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no mapping exists and
    /// [`StoreError::Unavailable`] when the store cannot be reached.
    async fn find_long_url(&self, short_url: &str) -> Result<String, StoreError>;

    /// Persists a new mapping.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if either the code or the long URL is
    /// already stored.
    async fn create(&self, mapping: UrlMapping) -> Result<(), StoreError>;

    /// Returns `true` when the store answers a trivial query.
    async fn ping(&self) -> bool;
}
