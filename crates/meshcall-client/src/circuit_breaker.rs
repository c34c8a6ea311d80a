//! Per-command circuit breaking.
//!
//! Each command name gets its own breaker tracking recent outcomes over a
//! rolling window. While the breaker is open, guarded calls fail immediately
//! with [`MeshError::BreakerOpen`] and the body is never polled. In every other
//! state the body runs and its own result is returned unchanged, so callers
//! always see the true cause of a failure.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

use meshcall_common::protocol::{MeshError, Result};

/// Breaker tuning, shared by every command in a registry.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Span of the rolling outcome window.
    pub window: Duration,
    /// Minimum number of calls in the window before the error rate is judged.
    pub min_requests: u32,
    /// Error rate (0.0..=1.0) at or above which the breaker opens.
    pub error_threshold: f64,
    /// How long an open breaker rejects calls before admitting a probe.
    pub sleep_window: Duration,
    /// Upper bound on a guarded body; an elapsed timeout counts as a failure
    /// in the window. `None` leaves the body unbounded.
    pub call_timeout: Option<Duration>,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(10),
            min_requests: 20,
            error_threshold: 0.5,
            sleep_window: Duration::from_secs(5),
            call_timeout: None,
        }
    }
}

/// Breaker state machine.
///
/// - `Closed` -> `Open`: window volume and error rate cross the thresholds
/// - `Open` -> `HalfOpen`: the sleep window elapses
/// - `HalfOpen` -> `Closed`: a probe succeeds (window cleared)
/// - `HalfOpen` -> `Open`: a probe fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct BreakerInner {
    state: BreakerState,
    /// Recent outcomes, newest at the back: (when, succeeded).
    outcomes: VecDeque<(Instant, bool)>,
    opened_at: Option<Instant>,
}

/// Failure-rate gate for one named command.
pub struct CircuitBreaker {
    command: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(command: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            command: command.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                outcomes: VecDeque::new(),
                opened_at: None,
            }),
        }
    }

    /// Runs `body` under the breaker.
    ///
    /// An open breaker rejects immediately without polling the body. A body
    /// bounded by `call_timeout` that does not finish in time is treated as a
    /// failure for the window and surfaces as [`MeshError::Timeout`]. In all
    /// admitted cases the body's own result comes back unchanged.
    pub async fn run<T, F>(&self, body: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.try_acquire()?;

        let outcome = match self.config.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, body).await {
                Ok(result) => result,
                Err(_) => Err(MeshError::Timeout(limit.as_millis() as u64)),
            },
            None => body.await,
        };

        self.record(outcome.is_ok());
        outcome
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Gate check. Open breakers whose sleep window has elapsed flip to
    /// half-open and admit the caller as a probe.
    fn try_acquire(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
            BreakerState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.sleep_window {
                    inner.state = BreakerState::HalfOpen;
                    tracing::warn!(command = %self.command, "circuit breaker half-open, admitting probe");
                    Ok(())
                } else {
                    Err(MeshError::BreakerOpen(self.command.clone()))
                }
            }
        }
    }

    fn record(&self, success: bool) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => {
                let now = Instant::now();
                inner.outcomes.push_back((now, success));
                if let Some(horizon) = now.checked_sub(self.config.window) {
                    while let Some(&(at, _)) = inner.outcomes.front() {
                        if at < horizon {
                            inner.outcomes.pop_front();
                        } else {
                            break;
                        }
                    }
                }

                let total = inner.outcomes.len() as u32;
                let failures = inner.outcomes.iter().filter(|(_, ok)| !ok).count() as u32;
                if total >= self.config.min_requests
                    && f64::from(failures) / f64::from(total) >= self.config.error_threshold
                {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(now);
                    tracing::warn!(
                        command = %self.command,
                        failures,
                        total,
                        "circuit breaker opened"
                    );
                }
            }
            BreakerState::HalfOpen | BreakerState::Open => {
                if success {
                    inner.state = BreakerState::Closed;
                    inner.outcomes.clear();
                    inner.opened_at = None;
                    tracing::info!(command = %self.command, "circuit breaker closed after successful probe");
                } else {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    tracing::warn!(command = %self.command, "circuit breaker re-opened after failed probe");
                }
            }
        }
    }
}

/// One breaker per command name, created lazily on first use.
#[derive(Default)]
pub struct CircuitBreakerRegistry {
    config: BreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// Returns the breaker guarding `command`, creating it on first use.
    pub fn guard(&self, command: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(command.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(command, self.config.clone())))
            .value()
            .clone()
    }
}
