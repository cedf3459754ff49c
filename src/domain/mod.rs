//! Domain layer: entities, ports and the analytics pipeline.
//!
//! - [`entities`] - Core data structures
//! - [`repositories`] - Traits implemented by the infrastructure layer
//! - [`events`] - Analytics event model and the non-blocking publisher
//! - [`event_worker`] - Background delivery of queued events
//!
//! # Analytics Flow
//!
//! 1. A handler finishes a shorten or redirect request
//! 2. [`events::EventPublisher::publish`] queues the event without waiting
//! 3. [`event_worker::run_event_worker`] delivers it with retries
//! 4. The event lands in an [`repositories::AnalyticsSink`]

pub mod entities;
pub mod event_worker;
pub mod events;
pub mod repositories;
