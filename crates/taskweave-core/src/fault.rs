//! Fault isolation around caller-supplied code.
//!
//! Every point where the engine runs foreign code (action bodies, predicates,
//! matchers, callbacks, spawned branches) goes through one of these helpers.
//! A panic never unwinds across an `Action::run` boundary; it becomes a
//! `WorkError::Panicked` instead.

use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};

use futures_util::FutureExt;
use taskweave_types::error::WorkError;
use tokio::task::JoinError;

use crate::action::{Action, BoxAction};
use crate::context::WorkContext;
use crate::report::WorkReport;

/// Render a panic payload as text.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run synchronous caller code, converting a panic into an error.
pub fn isolate_sync<T>(name: &str, f: impl FnOnce() -> T) -> Result<T, WorkError> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        tracing::warn!(action = name, panic = message.as_str(), "caught panic in caller code");
        WorkError::Panicked {
            action: name.to_string(),
            message,
        }
    })
}

/// Drive a future to completion, converting a panic during any poll into an error.
pub async fn isolate<F: Future>(name: &str, future: F) -> Result<F::Output, WorkError> {
    AssertUnwindSafe(future).catch_unwind().await.map_err(|payload| {
        let message = panic_message(payload.as_ref());
        tracing::warn!(action = name, panic = message.as_str(), "caught panic in action");
        WorkError::Panicked {
            action: name.to_string(),
            message,
        }
    })
}

/// Run a child action behind the isolation boundary.
///
/// This is how every combinator invokes its children.
pub async fn run_isolated(action: &BoxAction, ctx: &WorkContext) -> WorkReport {
    isolate(action.name(), action.run(ctx))
        .await
        .unwrap_or_else(WorkReport::failure)
}

/// Translate a failed join of a spawned branch into an error.
pub fn join_error(name: &str, err: JoinError) -> WorkError {
    if err.is_panic() {
        let message = panic_message(err.into_panic().as_ref());
        WorkError::Panicked {
            action: name.to_string(),
            message,
        }
    } else {
        WorkError::Join(format!("{name}: {err}"))
    }
}
