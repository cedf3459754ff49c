//! Retry engine for classified, idempotent attempts.
//!
//! Every outbound call on the serving path (store lookups, store writes,
//! analytics sends) runs through [`RetryEngine`]. The caller classifies each
//! attempt as [`AttemptOutcome::Success`], [`AttemptOutcome::Transient`] or
//! [`AttemptOutcome::Permanent`]; the engine decides whether to wait and try
//! again, and always hands back exactly one terminal result.
//!
//! # Example
//!
//! ```rust,ignore
//! struct Lookup<'a> {
//!     store: &'a dyn UrlStore,
//!     short_url: &'a str,
//! }
//!
//! #[async_trait]
//! impl Attempt for Lookup<'_> {
//!     type Output = String;
//!     type Error = StoreError;
//!
//!     async fn attempt(&mut self) -> AttemptOutcome<String, StoreError> {
//!         self.store.find_long_url(self.short_url).await.into()
//!     }
//! }
//!
//! let mut op = Lookup { store, short_url: "aB3dE_9z" };
//! let long_url = engine.retry_until(&mut op, &cancel, deadline).await?;
//! ```

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::resilience::backoff::Backoff;

/// Classified result of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome<T, E> {
    /// The attempt produced its payload.
    Success(T),
    /// The attempt failed but repeating it may succeed.
    Transient(E),
    /// The attempt failed and will never succeed.
    Permanent(E),
}

/// Errors that know whether repeating the failed call could succeed.
pub trait Classify {
    fn is_transient(&self) -> bool;
}

impl<T, E: Classify> From<Result<T, E>> for AttemptOutcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => AttemptOutcome::Success(value),
            Err(e) if e.is_transient() => AttemptOutcome::Transient(e),
            Err(e) => AttemptOutcome::Permanent(e),
        }
    }
}

/// One retryable unit of work.
///
/// Implementors capture whatever request payload and destination they need;
/// the engine only ever calls [`Attempt::attempt`].
#[async_trait]
pub trait Attempt: Send {
    type Output: Send;
    type Error: Send;

    async fn attempt(&mut self) -> AttemptOutcome<Self::Output, Self::Error>;
}

/// Terminal failure returned by [`RetryEngine`].
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The attempt reported a non-retryable failure.
    #[error("permanent failure: {0}")]
    Permanent(E),

    /// Every allowed attempt returned a transient failure.
    #[error("operation failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// Waiting for the next attempt would exceed the elapsed-time budget.
    #[error("max elapsed time exceeded after {attempts} attempts: {last}")]
    TimedOut { attempts: u32, last: E },

    /// The cancellation token fired or the deadline passed.
    #[error("operation cancelled")]
    Cancelled,
}

impl<E> RetryError<E> {
    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RetryError::Permanent(_) => "permanent",
            RetryError::Exhausted { .. } => "exhausted",
            RetryError::TimedOut { .. } => "timed_out",
            RetryError::Cancelled => "cancelled",
        }
    }

    /// Returns the permanent error, if that is what stopped the engine.
    pub fn as_permanent(&self) -> Option<&E> {
        match self {
            RetryError::Permanent(e) => Some(e),
            _ => None,
        }
    }
}

/// Retry limits. Immutable once built and shared read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    initial_delay: Duration,
    max_delay: Duration,
    max_elapsed: Duration,
    max_attempts: u32,
}

impl RetryBudget {
    /// Validates and builds a budget.
    ///
    /// `max_attempts` counts retries after the initial attempt, so the
    /// operation runs at most `max_attempts + 1` times.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] if `initial_delay` is zero,
    /// exceeds `max_delay`, or `max_elapsed` is zero.
    pub fn new(
        initial_delay: Duration,
        max_delay: Duration,
        max_elapsed: Duration,
        max_attempts: u32,
    ) -> Result<Self, ConfigError> {
        if initial_delay.is_zero() {
            return Err(ConfigError::invalid("initial retry delay must be positive"));
        }
        if initial_delay > max_delay {
            return Err(ConfigError::invalid(format!(
                "initial retry delay {:?} exceeds max delay {:?}",
                initial_delay, max_delay
            )));
        }
        if max_elapsed.is_zero() {
            return Err(ConfigError::invalid("max elapsed time must be positive"));
        }

        Ok(Self {
            initial_delay,
            max_delay,
            max_elapsed,
            max_attempts,
        })
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn max_elapsed(&self) -> Duration {
        self.max_elapsed
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for RetryBudget {
    /// 50ms initial delay, 5s cap, 30s elapsed budget, 10 retries.
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(5),
            max_elapsed: Duration::from_secs(30),
            max_attempts: 10,
        }
    }
}

/// Drives [`Attempt`]s under a [`RetryBudget`].
///
/// Cheap to clone; runs entirely on the caller's task.
#[derive(Debug, Clone, Copy)]
pub struct RetryEngine {
    budget: RetryBudget,
    backoff: Backoff,
}

impl RetryEngine {
    pub fn new(budget: RetryBudget) -> Self {
        Self {
            budget,
            backoff: Backoff::new(budget.initial_delay, budget.max_delay),
        }
    }

    pub fn budget(&self) -> &RetryBudget {
        &self.budget
    }

    /// Runs `op` until it succeeds, fails permanently, the budget runs out,
    /// or `cancel` fires.
    pub async fn retry<A: Attempt>(
        &self,
        op: &mut A,
        cancel: &CancellationToken,
    ) -> Result<A::Output, RetryError<A::Error>> {
        self.run(op, cancel, None).await
    }

    /// Same as [`Self::retry`], additionally stopping once `deadline` passes.
    pub async fn retry_until<A: Attempt>(
        &self,
        op: &mut A,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> Result<A::Output, RetryError<A::Error>> {
        self.run(op, cancel, Some(deadline)).await
    }

    async fn run<A: Attempt>(
        &self,
        op: &mut A,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<A::Output, RetryError<A::Error>> {
        let start = Instant::now();
        let stop = stop_signal(cancel, deadline);
        tokio::pin!(stop);

        let mut attempt: u32 = 0;
        let mut delay: Option<Duration> = None;

        let result = loop {
            if is_stopped(cancel, deadline) {
                break Err(RetryError::Cancelled);
            }

            let outcome = tokio::select! {
                biased;
                _ = &mut stop => break Err(RetryError::Cancelled),
                outcome = op.attempt() => outcome,
            };

            let last = match outcome {
                AttemptOutcome::Success(value) => break Ok(value),
                AttemptOutcome::Permanent(e) => break Err(RetryError::Permanent(e)),
                AttemptOutcome::Transient(e) => e,
            };

            if attempt >= self.budget.max_attempts {
                break Err(RetryError::Exhausted {
                    attempts: attempt + 1,
                    last,
                });
            }

            let next = self.backoff.next_jittered(delay);
            delay = Some(next);

            if start.elapsed() + next >= self.budget.max_elapsed {
                break Err(RetryError::TimedOut {
                    attempts: attempt + 1,
                    last,
                });
            }

            debug!(
                "Waiting for {:?} before retry attempt {}",
                next,
                attempt + 1
            );

            tokio::select! {
                biased;
                _ = &mut stop => break Err(RetryError::Cancelled),
                _ = tokio::time::sleep(next) => {}
            }

            attempt += 1;
        };

        if let Err(e) = &result {
            if e.as_permanent().is_some() {
                debug!("Retry stopped on permanent failure after {:?}", start.elapsed());
            } else {
                warn!("Retry stopped ({}) after {:?}", e.kind(), start.elapsed());
            }
            metrics::counter!("retry_terminal_total", "outcome" => e.kind()).increment(1);
        }

        result
    }
}

fn is_stopped(cancel: &CancellationToken, deadline: Option<Instant>) -> bool {
    cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d)
}

async fn stop_signal(cancel: &CancellationToken, deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }
        None => cancel.cancelled().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_budget(max_attempts: u32) -> RetryBudget {
        RetryBudget::new(
            Duration::from_millis(1),
            Duration::from_millis(5),
            Duration::from_secs(10),
            max_attempts,
        )
        .unwrap()
    }

    /// Counts its calls and answers with `outcome(call_number)`.
    struct Counting {
        calls: Arc<AtomicU32>,
        outcome: fn(u32) -> AttemptOutcome<&'static str, &'static str>,
    }

    #[async_trait]
    impl Attempt for Counting {
        type Output = &'static str;
        type Error = &'static str;

        async fn attempt(&mut self) -> AttemptOutcome<&'static str, &'static str> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            (self.outcome)(n)
        }
    }

    fn counting_op(
        calls: Arc<AtomicU32>,
        outcome: fn(u32) -> AttemptOutcome<&'static str, &'static str>,
    ) -> Counting {
        Counting { calls, outcome }
    }

    /// Never finishes on its own.
    struct Stalled;

    #[async_trait]
    impl Attempt for Stalled {
        type Output = ();
        type Error = &'static str;

        async fn attempt(&mut self) -> AttemptOutcome<(), &'static str> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            AttemptOutcome::Success(())
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let engine = RetryEngine::new(fast_budget(3));
        let calls = Arc::new(AtomicU32::new(0));
        let mut op = counting_op(calls.clone(), |_| AttemptOutcome::Success("ok"));

        let result = engine.retry(&mut op, &CancellationToken::new()).await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_after_max_attempts_plus_one() {
        let engine = RetryEngine::new(fast_budget(3));
        let calls = Arc::new(AtomicU32::new(0));
        let mut op = counting_op(calls.clone(), |_| AttemptOutcome::Transient("blip"));

        let result = engine.retry(&mut op, &CancellationToken::new()).await;

        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 4);
                assert_eq!(last, "blip");
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_zero_attempts_runs_once() {
        let engine = RetryEngine::new(fast_budget(0));
        let calls = Arc::new(AtomicU32::new(0));
        let mut op = counting_op(calls.clone(), |_| AttemptOutcome::Transient("blip"));

        let result = engine.retry(&mut op, &CancellationToken::new()).await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 1, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_permanent_stops_immediately() {
        let engine = RetryEngine::new(fast_budget(10));
        let calls = Arc::new(AtomicU32::new(0));
        let mut op = counting_op(calls.clone(), |n| {
            if n < 3 {
                AttemptOutcome::Transient("blip")
            } else {
                AttemptOutcome::Permanent("constraint")
            }
        });

        let result = engine.retry(&mut op, &CancellationToken::new()).await;

        assert!(matches!(result, Err(RetryError::Permanent("constraint"))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let engine = RetryEngine::new(fast_budget(5));
        let calls = Arc::new(AtomicU32::new(0));
        let mut op = counting_op(calls.clone(), |n| {
            if n < 3 {
                AttemptOutcome::Transient("blip")
            } else {
                AttemptOutcome::Success("ok")
            }
        });

        let result = engine.retry(&mut op, &CancellationToken::new()).await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timed_out_without_sleeping_past_budget() {
        let budget = RetryBudget::new(
            Duration::from_millis(200),
            Duration::from_secs(1),
            Duration::from_millis(100),
            10,
        )
        .unwrap();
        let engine = RetryEngine::new(budget);
        let calls = Arc::new(AtomicU32::new(0));
        let mut op = counting_op(calls.clone(), |_| AttemptOutcome::Transient("slow"));

        let started = std::time::Instant::now();
        let result = engine.retry(&mut op, &CancellationToken::new()).await;

        assert!(matches!(result, Err(RetryError::TimedOut { attempts: 1, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let engine = RetryEngine::new(fast_budget(3));
        let calls = Arc::new(AtomicU32::new(0));
        let mut op = counting_op(calls.clone(), |_| AttemptOutcome::Success("ok"));

        let token = CancellationToken::new();
        token.cancel();

        let result = engine.retry(&mut op, &token).await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff_sleep() {
        let budget = RetryBudget::new(
            Duration::from_secs(5),
            Duration::from_secs(5),
            Duration::from_secs(60),
            3,
        )
        .unwrap();
        let engine = RetryEngine::new(budget);
        let calls = Arc::new(AtomicU32::new(0));
        let mut op = counting_op(calls.clone(), |_| AttemptOutcome::Transient("blip"));

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let result = engine.retry(&mut op, &token).await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_deadline_interrupts_backoff_sleep() {
        let budget = RetryBudget::new(
            Duration::from_secs(5),
            Duration::from_secs(5),
            Duration::from_secs(60),
            3,
        )
        .unwrap();
        let engine = RetryEngine::new(budget);
        let calls = Arc::new(AtomicU32::new(0));
        let mut op = counting_op(calls.clone(), |_| AttemptOutcome::Transient("blip"));

        let deadline = Instant::now() + Duration::from_millis(20);
        let result = engine
            .retry_until(&mut op, &CancellationToken::new(), deadline)
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_running_attempt() {
        let engine = RetryEngine::new(fast_budget(3));
        let mut op = Stalled;

        let deadline = Instant::now() + Duration::from_millis(20);
        let result = engine
            .retry_until(&mut op, &CancellationToken::new(), deadline)
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
    }

    #[tokio::test]
    async fn test_retry_on_spawned_task() {
        let engine = RetryEngine::new(fast_budget(3));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let task = tokio::spawn(async move {
            let token = CancellationToken::new();
            let mut op = counting_op(counter, |n| {
                if n < 2 {
                    AttemptOutcome::Transient("blip")
                } else {
                    AttemptOutcome::Success("ok")
                }
            });
            engine.retry(&mut op, &token).await
        });

        assert_eq!(task.await.unwrap().unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_budget_validation() {
        assert!(
            RetryBudget::new(
                Duration::ZERO,
                Duration::from_secs(1),
                Duration::from_secs(1),
                1
            )
            .is_err()
        );
        assert!(
            RetryBudget::new(
                Duration::from_secs(2),
                Duration::from_secs(1),
                Duration::from_secs(10),
                1
            )
            .is_err()
        );
        assert!(
            RetryBudget::new(
                Duration::from_millis(1),
                Duration::from_secs(1),
                Duration::ZERO,
                1
            )
            .is_err()
        );
        assert!(
            RetryBudget::new(
                Duration::from_millis(1),
                Duration::from_secs(1),
                Duration::from_secs(1),
                0
            )
            .is_ok()
        );
    }

    #[derive(Debug, PartialEq)]
    struct Flaky(bool);

    impl Classify for Flaky {
        fn is_transient(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn test_result_classification() {
        let ok: AttemptOutcome<u8, Flaky> = Ok(1).into();
        assert_eq!(ok, AttemptOutcome::Success(1));

        let transient: AttemptOutcome<u8, Flaky> = Err(Flaky(true)).into();
        assert_eq!(transient, AttemptOutcome::Transient(Flaky(true)));

        let permanent: AttemptOutcome<u8, Flaky> = Err(Flaky(false)).into();
        assert_eq!(permanent, AttemptOutcome::Permanent(Flaky(false)));
    }

    #[test]
    fn test_error_kind_labels() {
        assert_eq!(RetryError::<()>::Cancelled.kind(), "cancelled");
        assert_eq!(RetryError::Permanent(()).kind(), "permanent");
        assert_eq!(
            RetryError::Exhausted {
                attempts: 2,
                last: ()
            }
            .kind(),
            "exhausted"
        );
    }
}
