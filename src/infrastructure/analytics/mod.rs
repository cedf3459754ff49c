//! Analytics sinks.
//!
//! - [`HttpAnalyticsSink`] - Posts events as JSON to a collector endpoint
//! - [`NullSink`] - Discards events when no collector is configured

mod http_sink;
mod null_sink;

pub use http_sink::HttpAnalyticsSink;
pub use null_sink::NullSink;
