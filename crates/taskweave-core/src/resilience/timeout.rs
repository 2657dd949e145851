//! Deadline enforcement for a single action.
//!
//! The wrapped action runs on its own tokio task bound to a child context.
//! The wrapper races the task's completion against its own deadline timer:
//!
//! - completion first: the action's report is returned unchanged
//! - deadline first: a `Timeout` failure is returned immediately
//!
//! By default cancellation is cooperative only. On timeout the child token is
//! cancelled and a task that ignores the signal keeps running after the
//! wrapper has returned. `abort_on_timeout(true)` additionally aborts the
//! task at its next suspension point.

use std::time::Duration;

use serde_json::json;
use taskweave_types::config::TimeoutConfig;
use taskweave_types::error::WorkError;
use taskweave_types::event::{Event, types};
use tracing::Instrument;

use crate::action::{Action, BoxAction};
use crate::context::WorkContext;
use crate::fault::{join_error, run_isolated};
use crate::report::WorkReport;

#[derive(Debug, Clone)]
pub struct TimeoutWrapper {
    name: String,
    action: BoxAction,
    timeout: Duration,
    abort_on_timeout: bool,
}

impl TimeoutWrapper {
    pub fn new(name: impl Into<String>, action: impl Action + 'static, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            action: BoxAction::new(action),
            timeout,
            abort_on_timeout: false,
        }
    }

    pub fn from_config(
        name: impl Into<String>,
        action: impl Action + 'static,
        config: &TimeoutConfig,
    ) -> Self {
        Self::new(name, action, config.default_timeout())
            .abort_on_timeout(config.abort_on_timeout)
    }

    /// Abort the spawned task when the deadline passes.
    pub fn abort_on_timeout(mut self, abort: bool) -> Self {
        self.abort_on_timeout = abort;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn timed_out(&self, ctx: &WorkContext) -> WorkReport {
        let timeout_ms = self.timeout.as_millis() as u64;
        tracing::warn!(
            wrapper = %self.name,
            action = self.action.name(),
            timeout_ms,
            aborted = self.abort_on_timeout,
            "action timed out"
        );

        let event = Event::new(types::ACTION_TIMED_OUT, self.name.as_str()).with_payload(
            json!({
                "action": self.action.name(),
                "timeout_ms": timeout_ms,
                "aborted": self.abort_on_timeout,
            }),
        );
        ctx.emit_event(event.clone());

        WorkReport::failure(WorkError::Timeout {
            action: self.action.name().to_string(),
            timeout_ms,
        })
        .with_event(event)
    }
}

impl Action for TimeoutWrapper {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &WorkContext) -> WorkReport {
        let scoped = ctx.child();
        let signal = scoped.cancellation().clone();
        let action = self.action.clone();

        let mut handle =
            tokio::spawn(async move { run_isolated(&action, &scoped).await }.in_current_span());

        // Expiry is tracked by the wrapper's own timer, never by the token
        // handed to the action, which the action may cancel itself.
        let joined = tokio::select! {
            biased;

            joined = &mut handle => joined,
            _ = tokio::time::sleep(self.timeout) => {
                signal.cancel();
                if self.abort_on_timeout {
                    handle.abort();
                }
                return self.timed_out(ctx);
            }
            _ = ctx.cancellation().cancelled() => {
                if self.abort_on_timeout {
                    handle.abort();
                }
                tracing::info!(wrapper = %self.name, "run cancelled while waiting on action");
                return WorkReport::failure(WorkError::Cancelled {
                    name: self.name.clone(),
                });
            }
        };

        match joined {
            Ok(report) => report,
            Err(err) => WorkReport::failure(join_error(self.action.name(), err)),
        }
    }
}
