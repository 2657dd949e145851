//! Circuit breaker around a single action.
//!
//! State machine:
//!
//! - **Closed**: calls pass through. Consecutive failures are counted and
//!   reaching `failure_threshold` opens the circuit. A success resets the count.
//! - **Open**: calls are rejected with `CircuitOpen` without running the
//!   action. Once `recovery_timeout` has elapsed since the last failure, the
//!   next incoming call moves the circuit to HalfOpen (there is no timer).
//! - **HalfOpen**: exactly one probe call runs; concurrent calls are rejected.
//!   A successful probe closes the circuit, a failed one reopens it.
//!
//! All state lives behind one mutex that is never held across an `.await`.
//! Clones share the same state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use taskweave_types::config::CircuitBreakerConfig;
use taskweave_types::error::WorkError;
use taskweave_types::event::{Event, types};

use crate::action::{Action, BoxAction};
use crate::context::WorkContext;
use crate::fault::run_isolated;
use crate::report::WorkReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Read-only snapshot of a breaker for operational dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitMetrics {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_state_change: DateTime<Utc>,
    pub total_calls: u64,
    pub total_rejections: u64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    /// Monotonic time of the last failure; drives Open -> HalfOpen.
    last_failure: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
    last_state_change: DateTime<Utc>,
    probe_in_flight: bool,
    total_calls: u64,
    total_rejections: u64,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure: None,
            last_failure_at: None,
            last_state_change: Utc::now(),
            probe_in_flight: false,
            total_calls: 0,
            total_rejections: 0,
        }
    }

    /// Move to `to`, returning `(from, to)` when the state actually changed.
    fn transition(&mut self, to: CircuitState) -> Option<(CircuitState, CircuitState)> {
        let from = self.state;
        if from == to {
            return None;
        }
        self.state = to;
        self.last_state_change = Utc::now();
        Some((from, to))
    }
}

/// Outcome of asking the breaker to let a call through.
enum Admission {
    Allowed { probe: bool },
    Rejected,
}

type Transition = Option<(CircuitState, CircuitState)>;

/// Releases the HalfOpen probe slot if the probe's future is dropped before
/// its outcome is recorded.
struct ProbeGuard<'a> {
    state: &'a Mutex<BreakerState>,
    armed: bool,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .probe_in_flight = false;
        }
    }
}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: String,
    action: BoxAction,
    failure_threshold: u32,
    recovery_timeout: Duration,
    state: Arc<Mutex<BreakerState>>,
}

impl CircuitBreaker {
    /// Wrap `action`. A threshold of zero is treated as one.
    pub fn new(
        name: impl Into<String>,
        action: impl Action + 'static,
        failure_threshold: u32,
        recovery_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            action: BoxAction::new(action),
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            state: Arc::new(Mutex::new(BreakerState::new())),
        }
    }

    pub fn from_config(
        name: impl Into<String>,
        action: impl Action + 'static,
        config: &CircuitBreakerConfig,
    ) -> Self {
        Self::new(
            name,
            action,
            config.failure_threshold,
            config.recovery_timeout(),
        )
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state as last recorded.
    ///
    /// Open -> HalfOpen happens on the next incoming call, so this may still
    /// report Open after the recovery window has elapsed.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn metrics(&self) -> CircuitMetrics {
        let inner = self.lock();
        CircuitMetrics {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            failure_threshold: self.failure_threshold,
            recovery_timeout_ms: self.recovery_timeout.as_millis() as u64,
            last_failure_at: inner.last_failure_at,
            last_state_change: inner.last_state_change,
            total_calls: inner.total_calls,
            total_rejections: inner.total_rejections,
        }
    }

    /// Force the circuit closed and clear the failure count.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = 0;
        inner.probe_in_flight = false;
        if let Some((from, to)) = inner.transition(CircuitState::Closed) {
            tracing::info!(breaker = %self.name, %from, %to, "circuit breaker reset");
        }
    }

    fn admit(&self) -> (Admission, Transition) {
        let mut inner = self.lock();
        inner.total_calls += 1;

        match inner.state {
            CircuitState::Closed => (Admission::Allowed { probe: false }, None),
            CircuitState::Open => {
                let recovered = inner
                    .last_failure
                    .is_none_or(|at| at.elapsed() >= self.recovery_timeout);
                if recovered {
                    inner.probe_in_flight = true;
                    let change = inner.transition(CircuitState::HalfOpen);
                    (Admission::Allowed { probe: true }, change)
                } else {
                    inner.total_rejections += 1;
                    (Admission::Rejected, None)
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    inner.total_rejections += 1;
                    (Admission::Rejected, None)
                } else {
                    inner.probe_in_flight = true;
                    (Admission::Allowed { probe: true }, None)
                }
            }
        }
    }

    fn record(&self, report: &WorkReport, probe: bool) -> Transition {
        let mut inner = self.lock();
        if probe {
            inner.probe_in_flight = false;
        }

        if report.is_failure() {
            inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
            inner.last_failure = Some(Instant::now());
            inner.last_failure_at = Some(Utc::now());
            match inner.state {
                CircuitState::HalfOpen => inner.transition(CircuitState::Open),
                CircuitState::Closed if inner.consecutive_failures >= self.failure_threshold => {
                    inner.transition(CircuitState::Open)
                }
                _ => None,
            }
        } else {
            match inner.state {
                CircuitState::Closed => {
                    inner.consecutive_failures = 0;
                    None
                }
                CircuitState::HalfOpen if probe => {
                    inner.consecutive_failures = 0;
                    inner.transition(CircuitState::Closed)
                }
                // A straggler admitted before the circuit opened does not
                // prove recovery.
                _ => None,
            }
        }
    }

    /// Log and emit a state change, returning the event for the report.
    fn announce(&self, ctx: &WorkContext, change: Transition) -> Option<Event> {
        let (from, to) = change?;
        let failures = self.lock().consecutive_failures;
        tracing::info!(
            breaker = %self.name,
            %from,
            %to,
            consecutive_failures = failures,
            "circuit breaker state changed"
        );
        let event = Event::new(types::CIRCUIT_STATE_CHANGED, self.name.as_str()).with_payload(
            json!({
                "from": from,
                "to": to,
                "consecutive_failures": failures,
                "failure_threshold": self.failure_threshold,
            }),
        );
        ctx.emit_event(event.clone());
        Some(event)
    }
}

impl Action for CircuitBreaker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &WorkContext) -> WorkReport {
        let (admission, change) = self.admit();
        let admitted_event = self.announce(ctx, change);

        let probe = match admission {
            Admission::Allowed { probe } => probe,
            Admission::Rejected => {
                tracing::debug!(breaker = %self.name, "call rejected, circuit open");
                return WorkReport::failure(WorkError::CircuitOpen {
                    name: self.name.clone(),
                });
            }
        };

        let mut guard = ProbeGuard {
            state: &self.state,
            armed: probe,
        };
        let mut report = run_isolated(&self.action, ctx).await;
        guard.armed = false;
        let change = self.record(&report, probe);
        let recorded_event = self.announce(ctx, change);

        report.events.extend(admitted_event);
        report.events.extend(recorded_event);
        report
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("action", &self.action)
            .field("failure_threshold", &self.failure_threshold)
            .field("recovery_timeout", &self.recovery_timeout)
            .field("state", &self.state())
            .finish()
    }
}
