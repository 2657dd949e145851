//! The `Action` contract and its dynamic-dispatch wrapper.
//!
//! Follows the same blanket-impl pattern as the completion client:
//! 1. `Action` uses native async fn in traits (RPITIT)
//! 2. An object-safe `ActionDyn` trait with boxed futures is blanket-implemented
//!    for every `Action`
//! 3. `BoxAction` wraps `Arc<dyn ActionDyn>` and is itself an `Action`, so
//!    combinators can hold heterogeneous children and nest arbitrarily

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use taskweave_types::error::WorkError;
use taskweave_types::keys;

use crate::context::WorkContext;
use crate::fault;
use crate::report::WorkReport;

/// A named, composable unit of work.
///
/// `run` must never let a panic escape: combinators run their children
/// through [`fault::run_isolated`], and [`ActionFunc`] isolates closures.
pub trait Action: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, ctx: &WorkContext) -> impl Future<Output = WorkReport> + Send;

    /// Entry point used when this action is registered as a `TryCatch` handler.
    ///
    /// The default records the error message under [`keys::CAUGHT_ERROR`]
    /// and runs the action normally.
    fn handle_error(
        &self,
        ctx: &WorkContext,
        error: &WorkError,
    ) -> impl Future<Output = WorkReport> + Send {
        async move {
            ctx.set(keys::CAUGHT_ERROR, error.to_string());
            self.run(ctx).await
        }
    }
}

/// Object-safe version of [`Action`] with boxed futures.
///
/// A blanket implementation is provided for all types implementing `Action`.
pub trait ActionDyn: Send + Sync {
    fn action_name(&self) -> &str;

    fn run_boxed<'a>(
        &'a self,
        ctx: &'a WorkContext,
    ) -> Pin<Box<dyn Future<Output = WorkReport> + Send + 'a>>;

    fn handle_error_boxed<'a>(
        &'a self,
        ctx: &'a WorkContext,
        error: &'a WorkError,
    ) -> Pin<Box<dyn Future<Output = WorkReport> + Send + 'a>>;
}

impl<T: Action> ActionDyn for T {
    fn action_name(&self) -> &str {
        self.name()
    }

    fn run_boxed<'a>(
        &'a self,
        ctx: &'a WorkContext,
    ) -> Pin<Box<dyn Future<Output = WorkReport> + Send + 'a>> {
        Box::pin(self.run(ctx))
    }

    fn handle_error_boxed<'a>(
        &'a self,
        ctx: &'a WorkContext,
        error: &'a WorkError,
    ) -> Pin<Box<dyn Future<Output = WorkReport> + Send + 'a>> {
        Box::pin(self.handle_error(ctx, error))
    }
}

/// Type-erased, cheaply cloneable action.
///
/// Clones share the same underlying action, which is what lets parallel
/// combinators move children into spawned tasks.
#[derive(Clone)]
pub struct BoxAction {
    inner: Arc<dyn ActionDyn>,
}

impl BoxAction {
    pub fn new<T: Action + 'static>(action: T) -> Self {
        Self {
            inner: Arc::new(action),
        }
    }
}

impl Action for BoxAction {
    fn name(&self) -> &str {
        self.inner.action_name()
    }

    fn run(&self, ctx: &WorkContext) -> impl Future<Output = WorkReport> + Send {
        async move { self.inner.run_boxed(ctx).await }
    }

    fn handle_error(
        &self,
        ctx: &WorkContext,
        error: &WorkError,
    ) -> impl Future<Output = WorkReport> + Send {
        async move { self.inner.handle_error_boxed(ctx, error).await }
    }
}

impl std::fmt::Debug for BoxAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BoxAction").field(&self.name()).finish()
    }
}

// ---------------------------------------------------------------------------
// ActionFunc
// ---------------------------------------------------------------------------

/// Conversion from a closure's output into a report.
pub trait IntoWorkReport {
    fn into_report(self) -> WorkReport;
}

impl IntoWorkReport for WorkReport {
    fn into_report(self) -> WorkReport {
        self
    }
}

impl IntoWorkReport for Result<Value, WorkError> {
    fn into_report(self) -> WorkReport {
        match self {
            Ok(data) => WorkReport::completed_with(data),
            Err(err) => WorkReport::failure(err),
        }
    }
}

impl IntoWorkReport for Result<(), WorkError> {
    fn into_report(self) -> WorkReport {
        match self {
            Ok(()) => WorkReport::completed(),
            Err(err) => WorkReport::failure(err),
        }
    }
}

/// Adapter turning an async closure over the context into an [`Action`].
///
/// The closure receives a handle to the run's context. A panic anywhere in
/// the closure or its future becomes a Failure report wrapping
/// `WorkError::Panicked`.
pub struct ActionFunc<F> {
    name: String,
    func: F,
}

impl<F, Fut> ActionFunc<F>
where
    F: Fn(WorkContext) -> Fut + Send + Sync,
    Fut: Future + Send,
    Fut::Output: IntoWorkReport,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F, Fut> Action for ActionFunc<F>
where
    F: Fn(WorkContext) -> Fut + Send + Sync,
    Fut: Future + Send,
    Fut::Output: IntoWorkReport,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &WorkContext) -> WorkReport {
        let call = async { (self.func)(ctx.clone()).await.into_report() };
        fault::isolate(&self.name, call)
            .await
            .unwrap_or_else(WorkReport::failure)
    }
}

/// Adapter for `TryCatch` handlers that want the typed error.
///
/// When invoked as a handler the closure receives the caught error directly.
/// When run as a plain action it receives the message recorded under
/// [`keys::CAUGHT_ERROR`], or a generic error if none was recorded.
pub struct ErrorHandlerFunc<F> {
    name: String,
    func: F,
}

impl<F, Fut> ErrorHandlerFunc<F>
where
    F: Fn(WorkContext, WorkError) -> Fut + Send + Sync,
    Fut: Future + Send,
    Fut::Output: IntoWorkReport,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }

    async fn invoke(&self, ctx: &WorkContext, error: WorkError) -> WorkReport {
        let call = async { (self.func)(ctx.clone(), error).await.into_report() };
        fault::isolate(&self.name, call)
            .await
            .unwrap_or_else(WorkReport::failure)
    }
}

impl<F, Fut> Action for ErrorHandlerFunc<F>
where
    F: Fn(WorkContext, WorkError) -> Fut + Send + Sync,
    Fut: Future + Send,
    Fut::Output: IntoWorkReport,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &WorkContext) -> WorkReport {
        let error = ctx
            .get_string(keys::CAUGHT_ERROR)
            .map(WorkError::Message)
            .unwrap_or_else(|| WorkError::message("no error recorded"));
        self.invoke(ctx, error).await
    }

    async fn handle_error(&self, ctx: &WorkContext, error: &WorkError) -> WorkReport {
        self.invoke(ctx, error.clone()).await
    }
}
