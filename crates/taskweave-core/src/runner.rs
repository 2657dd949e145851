//! Top-level run driver.
//!
//! [`execute`] runs a root action inside the context's span, brackets it with
//! `run.started` / `run.finished` events, and drains outstanding callbacks
//! before returning, so a run is never reported finished while its callbacks
//! are still in flight.

use std::time::{Duration, Instant};

use serde_json::json;
use taskweave_types::config::CallbackConfig;
use taskweave_types::event::{Event, types};
use tracing::Instrument;

use crate::action::{Action, BoxAction};
use crate::context::WorkContext;
use crate::fault::run_isolated;
use crate::report::WorkReport;

/// Run `action` to completion and wait for every callback it triggered.
pub async fn execute(action: impl Action + 'static, ctx: &WorkContext) -> WorkReport {
    execute_with_config(action, ctx, &CallbackConfig::default()).await
}

/// Like [`execute`], but bound the callback drain by `config.wait_timeout()`.
pub async fn execute_with_config(
    action: impl Action + 'static,
    ctx: &WorkContext,
    config: &CallbackConfig,
) -> WorkReport {
    let action = BoxAction::new(action);
    let span = ctx.logger().clone();
    run(&action, ctx, config.wait_timeout()).instrument(span).await
}

async fn run(action: &BoxAction, ctx: &WorkContext, wait_timeout: Option<Duration>) -> WorkReport {
    tracing::info!(run_id = %ctx.run_id(), action = action.name(), "starting run");
    ctx.emit_event(Event::new(types::RUN_STARTED, action.name()).with_payload(json!({
        "run_id": ctx.run_id(),
    })));

    let started = Instant::now();
    let report = run_isolated(action, ctx).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    tracing::info!(
        run_id = %ctx.run_id(),
        action = action.name(),
        status = %report.status,
        errors = report.errors.len(),
        duration_ms,
        "run finished"
    );
    ctx.emit_event(Event::new(types::RUN_FINISHED, action.name()).with_payload(json!({
        "run_id": ctx.run_id(),
        "status": report.status,
        "duration_ms": duration_ms,
    })));

    drain_callbacks(ctx, wait_timeout).await;
    report
}

async fn drain_callbacks(ctx: &WorkContext, wait_timeout: Option<Duration>) {
    let Some(limit) = wait_timeout else {
        ctx.wait().await;
        return;
    };

    if tokio::time::timeout(limit, ctx.wait()).await.is_err() {
        let pending = ctx.callbacks().map_or(0, |registry| registry.pending());
        tracing::warn!(
            run_id = %ctx.run_id(),
            pending,
            wait_timeout_ms = limit.as_millis() as u64,
            "callbacks still running after wait timeout"
        );
    }
}
