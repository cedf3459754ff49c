//! Resource-based admission control.
//!
//! A background task samples host CPU and memory utilisation on a fixed
//! interval; request paths call [`AdmissionController::gate`] to decide
//! whether to accept work. Reads are lock-free and may be stale by up to one
//! interval.
//!
//! Until the first sample lands the stored sample is zero, so the gate is
//! permissive at startup.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;
use sysinfo::System;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ConfigError;

/// Host utilisation at a point in time.
///
/// `cpu` and `mem` are fractions in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSample {
    pub cpu: f64,
    pub mem: f64,
    pub sampled_at: Option<DateTime<Utc>>,
}

impl ResourceSample {
    /// Builds a sample stamped with the current time.
    pub fn new(cpu: f64, mem: f64) -> Self {
        Self {
            cpu,
            mem,
            sampled_at: Some(Utc::now()),
        }
    }
}

impl Default for ResourceSample {
    fn default() -> Self {
        Self {
            cpu: 0.0,
            mem: 0.0,
            sampled_at: None,
        }
    }
}

/// Source of [`ResourceSample`]s.
pub trait ResourceSampler: Send + 'static {
    fn sample(&mut self) -> ResourceSample;
}

/// Host-wide sampler backed by `sysinfo`.
///
/// CPU usage is computed between consecutive refreshes, so the first sample
/// after construction typically reports zero CPU.
pub struct SysinfoSampler {
    system: System,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler for SysinfoSampler {
    fn sample(&mut self) -> ResourceSample {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        let cpu = f64::from(self.system.global_cpu_usage()) / 100.0;
        let total = self.system.total_memory();
        let mem = if total == 0 {
            0.0
        } else {
            self.system.used_memory() as f64 / total as f64
        };

        ResourceSample::new(cpu.clamp(0.0, 1.0), mem.clamp(0.0, 1.0))
    }
}

/// Admission thresholds and sampling period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmissionConfig {
    cpu_threshold: f64,
    mem_threshold: f64,
    interval: Duration,
}

impl AdmissionConfig {
    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] if either threshold lies
    /// outside `[0, 1]` or `interval` is zero.
    pub fn new(
        cpu_threshold: f64,
        mem_threshold: f64,
        interval: Duration,
    ) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&cpu_threshold) {
            return Err(ConfigError::invalid(format!(
                "CPU threshold must be between 0 and 1, got {}",
                cpu_threshold
            )));
        }
        if !(0.0..=1.0).contains(&mem_threshold) {
            return Err(ConfigError::invalid(format!(
                "memory threshold must be between 0 and 1, got {}",
                mem_threshold
            )));
        }
        if interval.is_zero() {
            return Err(ConfigError::invalid("sampling interval must be positive"));
        }

        Ok(Self {
            cpu_threshold,
            mem_threshold,
            interval,
        })
    }

    pub fn cpu_threshold(&self) -> f64 {
        self.cpu_threshold
    }

    pub fn mem_threshold(&self) -> f64 {
        self.mem_threshold
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Why the gate turned a request away.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    Cpu { usage: f64, threshold: f64 },
    Memory { usage: f64, threshold: f64 },
}

impl RejectReason {
    /// Name of the exhausted resource, used as a metrics label.
    pub fn resource(&self) -> &'static str {
        match self {
            RejectReason::Cpu { .. } => "cpu",
            RejectReason::Memory { .. } => "memory",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Cpu { usage, threshold } => write!(
                f,
                "high CPU usage: {:.2}% (threshold {:.2}%)",
                usage * 100.0,
                threshold * 100.0
            ),
            RejectReason::Memory { usage, threshold } => write!(
                f,
                "high memory usage: {:.2}% (threshold {:.2}%)",
                usage * 100.0,
                threshold * 100.0
            ),
        }
    }
}

/// Gate decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    Allow,
    Reject(RejectReason),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allow)
    }
}

/// Holds the latest sample and answers gate queries.
///
/// Written by exactly one sampler task, read by any number of request tasks.
#[derive(Debug)]
pub struct AdmissionController {
    config: AdmissionConfig,
    cpu_bits: AtomicU64,
    mem_bits: AtomicU64,
    sampled_at_ms: AtomicI64,
}

const NEVER_SAMPLED: i64 = i64::MIN;

impl AdmissionController {
    pub fn new(config: AdmissionConfig) -> Self {
        Self {
            config,
            cpu_bits: AtomicU64::new(0f64.to_bits()),
            mem_bits: AtomicU64::new(0f64.to_bits()),
            sampled_at_ms: AtomicI64::new(NEVER_SAMPLED),
        }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Publishes a new sample.
    pub fn record(&self, sample: ResourceSample) {
        self.cpu_bits.store(sample.cpu.to_bits(), Ordering::Relaxed);
        self.mem_bits.store(sample.mem.to_bits(), Ordering::Relaxed);
        let stamp = sample
            .sampled_at
            .map(|t| t.timestamp_millis())
            .unwrap_or(NEVER_SAMPLED);
        self.sampled_at_ms.store(stamp, Ordering::Relaxed);
    }

    /// Returns the most recently published sample.
    pub fn latest(&self) -> ResourceSample {
        let stamp = self.sampled_at_ms.load(Ordering::Relaxed);
        ResourceSample {
            cpu: f64::from_bits(self.cpu_bits.load(Ordering::Relaxed)),
            mem: f64::from_bits(self.mem_bits.load(Ordering::Relaxed)),
            sampled_at: if stamp == NEVER_SAMPLED {
                None
            } else {
                Utc.timestamp_millis_opt(stamp).single()
            },
        }
    }

    /// Decides whether a request may proceed based on the latest sample.
    pub fn gate(&self) -> Admission {
        let cpu = f64::from_bits(self.cpu_bits.load(Ordering::Relaxed));
        if cpu > self.config.cpu_threshold {
            return Admission::Reject(RejectReason::Cpu {
                usage: cpu,
                threshold: self.config.cpu_threshold,
            });
        }

        let mem = f64::from_bits(self.mem_bits.load(Ordering::Relaxed));
        if mem > self.config.mem_threshold {
            return Admission::Reject(RejectReason::Memory {
                usage: mem,
                threshold: self.config.mem_threshold,
            });
        }

        Admission::Allow
    }

    /// Spawns the sampler task, which runs until `shutdown` is cancelled.
    ///
    /// Each sample is taken on the blocking thread pool.
    pub fn spawn_sampler<S: ResourceSampler>(
        self: &Arc<Self>,
        mut sampler: S,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        let interval = self.config.interval;

        tokio::spawn(async move {
            info!("Resource sampler started (interval: {:?})", interval);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        // sysinfo refreshes read /proc and may block
                        let taken = tokio::task::spawn_blocking(move || {
                            let sample = sampler.sample();
                            (sampler, sample)
                        })
                        .await;
                        let sample = match taken {
                            Ok((returned, sample)) => {
                                sampler = returned;
                                sample
                            }
                            Err(e) => {
                                error!("Resource sampler failed: {}", e);
                                break;
                            }
                        };
                        debug!(
                            "Resource sample: cpu={:.3} mem={:.3}",
                            sample.cpu, sample.mem
                        );
                        controller.record(sample);
                        if let Admission::Reject(reason) = controller.gate() {
                            warn!("Admission gate closed: {}", reason);
                        }
                    }
                }
            }

            info!("Resource sampler stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(cpu: f64, mem: f64) -> AdmissionController {
        AdmissionController::new(AdmissionConfig::new(cpu, mem, Duration::from_millis(500)).unwrap())
    }

    #[test]
    fn test_threshold_validation() {
        let interval = Duration::from_millis(100);
        assert!(AdmissionConfig::new(1.1, 0.5, interval).is_err());
        assert!(AdmissionConfig::new(-0.1, 0.5, interval).is_err());
        assert!(AdmissionConfig::new(0.5, 1.5, interval).is_err());
        assert!(AdmissionConfig::new(0.5, f64::NAN, interval).is_err());
        assert!(AdmissionConfig::new(0.5, 0.5, Duration::ZERO).is_err());
        assert!(AdmissionConfig::new(0.0, 1.0, interval).is_ok());
    }

    #[test]
    fn test_gate_allows_before_first_sample() {
        let c = controller(0.9, 0.9);
        assert_eq!(c.gate(), Admission::Allow);
        assert!(c.latest().sampled_at.is_none());
    }

    #[test]
    fn test_gate_rejects_high_cpu() {
        let c = controller(0.9, 0.9);

        c.record(ResourceSample::new(0.95, 0.1));
        assert!(matches!(
            c.gate(),
            Admission::Reject(RejectReason::Cpu { .. })
        ));

        c.record(ResourceSample::new(0.5, 0.1));
        assert_eq!(c.gate(), Admission::Allow);
    }

    #[test]
    fn test_gate_rejects_high_memory() {
        let c = controller(0.9, 0.8);
        c.record(ResourceSample::new(0.1, 0.85));
        assert!(matches!(
            c.gate(),
            Admission::Reject(RejectReason::Memory { .. })
        ));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let c = controller(0.9, 0.9);
        c.record(ResourceSample::new(0.9, 0.9));
        assert!(c.gate().is_allowed());
    }

    #[test]
    fn test_latest_round_trips_sample() {
        let c = controller(0.9, 0.9);
        let sample = ResourceSample::new(0.25, 0.75);
        c.record(sample);

        let latest = c.latest();
        assert_eq!(latest.cpu, 0.25);
        assert_eq!(latest.mem, 0.75);
        assert!(latest.sampled_at.is_some());
    }

    #[test]
    fn test_reject_reason_display() {
        let reason = RejectReason::Cpu {
            usage: 0.95,
            threshold: 0.9,
        };
        assert_eq!(
            reason.to_string(),
            "high CPU usage: 95.00% (threshold 90.00%)"
        );
    }

    struct FixedSampler(f64, f64);

    impl ResourceSampler for FixedSampler {
        fn sample(&mut self) -> ResourceSample {
            ResourceSample::new(self.0, self.1)
        }
    }

    #[tokio::test]
    async fn test_sampler_task_publishes_and_stops() {
        let c = Arc::new(AdmissionController::new(
            AdmissionConfig::new(0.9, 0.9, Duration::from_millis(5)).unwrap(),
        ));
        let shutdown = CancellationToken::new();

        let handle = c.spawn_sampler(FixedSampler(0.97, 0.2), shutdown.clone());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!c.gate().is_allowed());

        shutdown.cancel();
        handle.await.unwrap();
    }

    /// Records the thread each sample was taken on.
    struct ThreadRecorder(Arc<parking_lot::Mutex<Vec<std::thread::ThreadId>>>);

    impl ResourceSampler for ThreadRecorder {
        fn sample(&mut self) -> ResourceSample {
            self.0.lock().push(std::thread::current().id());
            ResourceSample::new(0.1, 0.1)
        }
    }

    #[tokio::test]
    async fn test_samples_taken_off_the_runtime_thread() {
        let c = Arc::new(AdmissionController::new(
            AdmissionConfig::new(0.9, 0.9, Duration::from_millis(5)).unwrap(),
        ));
        let threads = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let shutdown = CancellationToken::new();

        let handle = c.spawn_sampler(ThreadRecorder(Arc::clone(&threads)), shutdown.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let runtime_thread = std::thread::current().id();
        let threads = threads.lock();
        assert!(!threads.is_empty());
        assert!(threads.iter().all(|id| *id != runtime_thread));
        assert!(c.latest().sampled_at.is_some());
    }
}
