//! Resilience primitives shared by every outbound call on the serving path.
//!
//! # Modules
//!
//! - [`retry`] - Retry engine driving classified attempts with jittered backoff
//! - [`backoff`] - Delay schedule used between retries
//! - [`admission`] - Resource-based admission control (load shedding)

pub mod admission;
pub mod backoff;
pub mod retry;

pub use admission::{
    Admission, AdmissionConfig, AdmissionController, RejectReason, ResourceSample,
    ResourceSampler, SysinfoSampler,
};
pub use backoff::Backoff;
pub use retry::{Attempt, AttemptOutcome, Classify, RetryBudget, RetryEngine, RetryError};
