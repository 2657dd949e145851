//! Bounded re-execution of a failing action.
//!
//! `Retry` runs its action up to `max_attempts` times. After a failed
//! attempt it consults, in order:
//!
//! 1. the optional stop condition over the failed report (`true` stops)
//! 2. the retry condition over each reported error (no match stops)
//!
//! Between attempts, never after the last one, it sleeps for the backoff
//! delay of the zero-based attempt index. The sleep observes the run's
//! cancellation token. A report that stops retrying is returned annotated
//! with `retry_attempts` and `retry_name` metadata.

use std::sync::Arc;

use serde_json::json;
use taskweave_types::config::RetryConfig;
use taskweave_types::error::WorkError;
use taskweave_types::event::{Event, types};

use super::backoff::{self, BackoffStrategy, BoxBackoff};
use crate::action::{Action, BoxAction};
use crate::context::WorkContext;
use crate::fault::{isolate_sync, run_isolated};
use crate::report::WorkReport;

/// Metadata key holding the number of attempts made.
pub const RETRY_ATTEMPTS_KEY: &str = "retry_attempts";
/// Metadata key holding the retry wrapper's name.
pub const RETRY_NAME_KEY: &str = "retry_name";

/// Decides from a failed report that retrying is pointless.
pub type StopCondition = Arc<dyn Fn(&WorkReport) -> bool + Send + Sync>;

/// Decides whether one reported error is worth another attempt.
pub type RetryCondition = Arc<dyn Fn(&WorkError) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct Retry {
    name: String,
    action: BoxAction,
    max_attempts: u32,
    backoff: BoxBackoff,
    stop_condition: Option<StopCondition>,
    retry_condition: Option<RetryCondition>,
}

impl Retry {
    /// Wrap `action` with the default policy (3 attempts, 100ms fixed backoff).
    pub fn new(name: impl Into<String>, action: impl Action + 'static) -> Self {
        Self::from_config(name, action, &RetryConfig::default())
    }

    pub fn from_config(
        name: impl Into<String>,
        action: impl Action + 'static,
        config: &RetryConfig,
    ) -> Self {
        Self {
            name: name.into(),
            action: BoxAction::new(action),
            max_attempts: config.max_attempts,
            backoff: backoff::from_config(&config.backoff),
            stop_condition: None,
            retry_condition: None,
        }
    }

    /// Total attempts including the first. Zero is treated as one.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn backoff(mut self, backoff: impl BackoffStrategy + 'static) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    /// Stop retrying when `condition` returns `true` for a failed report.
    pub fn stop_when<F>(mut self, condition: F) -> Self
    where
        F: Fn(&WorkReport) -> bool + Send + Sync + 'static,
    {
        self.stop_condition = Some(Arc::new(condition));
        self
    }

    /// Retry only while at least one reported error satisfies `condition`.
    ///
    /// The default retries on any error.
    pub fn retry_if<F>(mut self, condition: F) -> Self
    where
        F: Fn(&WorkError) -> bool + Send + Sync + 'static,
    {
        self.retry_condition = Some(Arc::new(condition));
        self
    }

    fn should_stop(&self, report: &WorkReport) -> bool {
        match &self.stop_condition {
            Some(condition) => isolate_sync(&self.name, || condition(report)).unwrap_or(true),
            None => false,
        }
    }

    fn is_retryable(&self, report: &WorkReport) -> bool {
        report.errors.iter().any(|error| match &self.retry_condition {
            Some(condition) => isolate_sync(&self.name, || condition(error)).unwrap_or(false),
            None => true,
        })
    }

    fn attempt_failed_event(&self, attempt: u32, report: &WorkReport) -> Event {
        let errors: Vec<String> = report.errors.iter().map(ToString::to_string).collect();
        Event::new(types::RETRY_ATTEMPT_FAILED, self.name.as_str()).with_payload(json!({
            "action": self.action.name(),
            "attempt": attempt,
            "max_attempts": self.max_attempts,
            "errors": errors,
        }))
    }

    fn finish(&self, mut report: WorkReport, attempts: u32, events: Vec<Event>) -> WorkReport {
        report.events.extend(events);
        report
            .with_metadata(RETRY_ATTEMPTS_KEY, json!(attempts))
            .with_metadata(RETRY_NAME_KEY, json!(self.name))
    }
}

impl Action for Retry {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &WorkContext) -> WorkReport {
        let max_attempts = self.max_attempts.max(1);
        let mut events = Vec::new();
        let mut attempt: u32 = 0;

        loop {
            let report = run_isolated(&self.action, ctx).await;
            attempt += 1;

            if !report.is_failure() {
                if attempt == 1 {
                    return report;
                }
                tracing::info!(retry = %self.name, attempt, "action succeeded after retry");
                return self.finish(report, attempt, events);
            }

            let event = self.attempt_failed_event(attempt, &report);
            ctx.emit_event(event.clone());
            events.push(event);
            tracing::warn!(
                retry = %self.name,
                action = self.action.name(),
                attempt,
                max_attempts,
                errors = report.errors.len(),
                "attempt failed"
            );

            if attempt >= max_attempts {
                tracing::warn!(retry = %self.name, attempts = attempt, "retry attempts exhausted");
                return self.finish(report, attempt, events);
            }
            if self.should_stop(&report) {
                tracing::debug!(retry = %self.name, attempt, "stop condition met");
                return self.finish(report, attempt, events);
            }
            if !self.is_retryable(&report) {
                tracing::debug!(retry = %self.name, attempt, "no retryable error reported");
                return self.finish(report, attempt, events);
            }

            let delay = self.backoff.delay(attempt - 1);
            tracing::debug!(retry = %self.name, attempt, delay_ms = delay.as_millis() as u64, "backing off");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = ctx.cancellation().cancelled() => {
                    let mut report = report;
                    report.add_error(WorkError::Cancelled { name: self.name.clone() });
                    return self.finish(report, attempt, events);
                }
            }
        }
    }
}

impl std::fmt::Debug for Retry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retry")
            .field("name", &self.name)
            .field("action", &self.action)
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("has_stop_condition", &self.stop_condition.is_some())
            .field("has_retry_condition", &self.retry_condition.is_some())
            .finish()
    }
}
