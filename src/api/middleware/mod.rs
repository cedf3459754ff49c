//! HTTP middleware for load protection and observability.

pub mod load_shed;
pub mod tracing;
