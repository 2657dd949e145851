//! Structured error recovery around a single action.
//!
//! On failure of the try action, catch clauses are consulted in registration
//! order. The first clause whose matcher accepts any reported error has its
//! handler invoked through [`Action::handle_error`] with that error, and the
//! handler's report becomes the result. When no clause matches, a catch-all
//! handler (if registered) receives the first error, or a synthesized one
//! for a status-only failure. Otherwise the failed report is returned
//! unchanged.
//!
//! The finally action runs exactly once on every path. Its failure turns the
//! result into a failure, with its errors appended after the existing ones.

use taskweave_types::error::WorkError;
use taskweave_types::status::WorkStatus;

use super::matchers::ErrorMatcher;
use crate::action::{Action, BoxAction};
use crate::context::WorkContext;
use crate::fault::{isolate, isolate_sync, run_isolated};
use crate::report::WorkReport;

/// A `(matcher, handler)` catch clause.
#[derive(Clone)]
pub struct CatchHandler {
    matcher: ErrorMatcher,
    handler: BoxAction,
}

impl CatchHandler {
    pub fn new(matcher: ErrorMatcher, handler: impl Action + 'static) -> Self {
        Self {
            matcher,
            handler: BoxAction::new(handler),
        }
    }

    fn matches(&self, owner: &str, error: &WorkError) -> bool {
        // A panicking matcher is treated as a non-match.
        isolate_sync(owner, || (self.matcher)(error)).unwrap_or(false)
    }
}

impl std::fmt::Debug for CatchHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatchHandler")
            .field("handler", &self.handler)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct TryCatch {
    name: String,
    try_action: Option<BoxAction>,
    handlers: Vec<CatchHandler>,
    catch_all: Option<BoxAction>,
    finally: Option<BoxAction>,
}

impl TryCatch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            try_action: None,
            handlers: Vec::new(),
            catch_all: None,
            finally: None,
        }
    }

    pub fn try_action(mut self, action: impl Action + 'static) -> Self {
        self.try_action = Some(BoxAction::new(action));
        self
    }

    /// Register a catch clause. Clauses are consulted in registration order.
    pub fn catch(mut self, matcher: ErrorMatcher, handler: impl Action + 'static) -> Self {
        self.handlers.push(CatchHandler::new(matcher, handler));
        self
    }

    /// Handler for failures no catch clause matched.
    pub fn catch_any(mut self, handler: impl Action + 'static) -> Self {
        self.catch_all = Some(BoxAction::new(handler));
        self
    }

    pub fn finally(mut self, action: impl Action + 'static) -> Self {
        self.finally = Some(BoxAction::new(action));
        self
    }

    async fn invoke_handler(
        &self,
        handler: &BoxAction,
        ctx: &WorkContext,
        error: &WorkError,
        failed: WorkReport,
    ) -> WorkReport {
        tracing::debug!(
            try_catch = %self.name,
            handler = handler.name(),
            error = %error,
            "invoking catch handler"
        );
        let mut handled = isolate(handler.name(), handler.handle_error(ctx, error))
            .await
            .unwrap_or_else(WorkReport::failure);

        let mut events = failed.events;
        events.append(&mut handled.events);
        handled.events = events;
        handled
    }

    async fn recover(&self, ctx: &WorkContext, try_name: &str, failed: WorkReport) -> WorkReport {
        for clause in &self.handlers {
            let matched = failed
                .errors
                .iter()
                .find(|error| clause.matches(&self.name, error))
                .cloned();
            if let Some(error) = matched {
                return self.invoke_handler(&clause.handler, ctx, &error, failed).await;
            }
        }

        let Some(catch_all) = &self.catch_all else {
            tracing::debug!(try_catch = %self.name, "no catch handler matched, propagating failure");
            return failed;
        };

        let error = failed.first_error().cloned().unwrap_or_else(|| {
            WorkError::message(format!(
                "action '{try_name}' finished with status {} and no error",
                failed.status
            ))
        });
        self.invoke_handler(catch_all, ctx, &error, failed).await
    }

    async fn run_finally(&self, ctx: &WorkContext, mut result: WorkReport) -> WorkReport {
        let Some(finally) = &self.finally else {
            return result;
        };

        let report = run_isolated(finally, ctx).await;
        result.absorb_events_and_metadata(&report);
        if report.is_failure() {
            tracing::debug!(try_catch = %self.name, action = finally.name(), "finally action failed");
            result.status = WorkStatus::Failure;
            result.errors.extend(report.errors);
        }
        result
    }
}

impl Action for TryCatch {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &WorkContext) -> WorkReport {
        let Some(try_action) = &self.try_action else {
            return WorkReport::failure(WorkError::NotConfigured {
                combinator: "try-catch".to_string(),
                name: self.name.clone(),
            });
        };

        let report = run_isolated(try_action, ctx).await;
        let result = if report.is_failure() {
            self.recover(ctx, try_action.name(), report).await
        } else {
            report
        };

        self.run_finally(ctx, result).await
    }
}
