//! Infrastructure layer for external integrations.
//!
//! Implements the ports defined by the domain layer.
//!
//! # Modules
//!
//! - [`cache`] - Local LRU tier plus the Redis and no-op external tiers
//! - [`persistence`] - PostgreSQL URL store
//! - [`analytics`] - HTTP and no-op analytics sinks

pub mod analytics;
pub mod cache;
pub mod persistence;
