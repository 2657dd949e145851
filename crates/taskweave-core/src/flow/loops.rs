//! Repetition of a single body action.
//!
//! The loop variant is fixed at construction:
//!
//! - counted: exactly `n` iterations
//! - while: the predicate is checked before each iteration, loop while `true`
//! - until: the predicate is checked before each iteration, loop while `false`
//! - items: one iteration per element of an ordered sequence
//! - entries: one iteration per `(key, value)` pair, in the given order
//!
//! Every iteration writes the cumulative 1-based [`keys::LOOP_ITERATION`]
//! before running the body. Iterator loops also write [`keys::LOOP_ITEM`]
//! and either [`keys::LOOP_INDEX`] (0-based) or [`keys::LOOP_KEY`].
//! A body failure aborts the loop immediately with that report.

use std::ops::ControlFlow;

use serde_json::Value;
use taskweave_types::error::WorkError;
use taskweave_types::keys;

use super::{Predicate, evaluate};
use crate::action::{Action, BoxAction};
use crate::context::WorkContext;
use crate::fault::run_isolated;
use crate::report::WorkReport;

/// Iteration ceiling for while/until loops.
///
/// Iteration `MAX_LOOP_ITERATIONS + 1` fails with
/// [`WorkError::MaxIterationsExceeded`] instead of running.
pub const MAX_LOOP_ITERATIONS: usize = 10_000;

/// Metadata key carrying the number of iterations a loop ran.
pub const ITERATIONS_METADATA_KEY: &str = "loop_iterations";

/// What drives a [`Loop`].
#[derive(Clone)]
pub enum LoopKind {
    Count(usize),
    While(Predicate),
    Until(Predicate),
    Items(Vec<Value>),
    Entries(Vec<(String, Value)>),
}

impl LoopKind {
    fn label(&self) -> &'static str {
        match self {
            LoopKind::Count(_) => "count",
            LoopKind::While(_) => "while",
            LoopKind::Until(_) => "until",
            LoopKind::Items(_) => "items",
            LoopKind::Entries(_) => "entries",
        }
    }
}

impl std::fmt::Debug for LoopKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopKind::Count(n) => f.debug_tuple("Count").field(n).finish(),
            LoopKind::Items(items) => f.debug_tuple("Items").field(&items.len()).finish(),
            LoopKind::Entries(entries) => f.debug_tuple("Entries").field(&entries.len()).finish(),
            LoopKind::While(_) => f.write_str("While"),
            LoopKind::Until(_) => f.write_str("Until"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Loop {
    name: String,
    kind: LoopKind,
    body: Option<BoxAction>,
}

impl Loop {
    pub fn new(name: impl Into<String>, kind: LoopKind) -> Self {
        Self {
            name: name.into(),
            kind,
            body: None,
        }
    }

    /// Run the body exactly `n` times.
    pub fn count(name: impl Into<String>, n: usize) -> Self {
        Self::new(name, LoopKind::Count(n))
    }

    /// Run the body while `predicate` holds.
    pub fn while_true(name: impl Into<String>, predicate: Predicate) -> Self {
        Self::new(name, LoopKind::While(predicate))
    }

    /// Run the body until `predicate` holds.
    pub fn until(name: impl Into<String>, predicate: Predicate) -> Self {
        Self::new(name, LoopKind::Until(predicate))
    }

    /// Run the body once per item.
    pub fn over_items(name: impl Into<String>, items: impl IntoIterator<Item = Value>) -> Self {
        Self::new(name, LoopKind::Items(items.into_iter().collect()))
    }

    /// Run the body once per `(key, value)` entry, in iteration order of `entries`.
    pub fn over_entries<K: Into<String>>(
        name: impl Into<String>,
        entries: impl IntoIterator<Item = (K, Value)>,
    ) -> Self {
        let entries = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self::new(name, LoopKind::Entries(entries))
    }

    pub fn body(mut self, action: impl Action + 'static) -> Self {
        self.body = Some(BoxAction::new(action));
        self
    }

    pub fn kind(&self) -> &LoopKind {
        &self.kind
    }

    /// Run one iteration. `Break` carries the report that ends the loop early.
    async fn iterate(
        &self,
        body: &BoxAction,
        ctx: &WorkContext,
        iteration: usize,
        result: &mut WorkReport,
    ) -> ControlFlow<WorkReport> {
        if ctx.is_cancelled() {
            tracing::info!(loop_name = %self.name, iteration, "loop cancelled");
            return ControlFlow::Break(WorkReport::failure(WorkError::Cancelled {
                name: self.name.clone(),
            }));
        }

        ctx.set(keys::LOOP_ITERATION, iteration);
        let report = run_isolated(body, ctx).await;
        if report.is_failure() {
            tracing::debug!(loop_name = %self.name, iteration, "loop body failed");
            return ControlFlow::Break(report);
        }

        result.absorb_events_and_metadata(&report);
        if !report.is_skipped() {
            result.data = report.data;
        }
        ControlFlow::Continue(())
    }

    /// Whether a predicate-driven loop should run another iteration.
    fn should_continue(
        &self,
        predicate: &Predicate,
        until: bool,
        ctx: &WorkContext,
    ) -> Result<bool, WorkError> {
        evaluate(&self.name, predicate, ctx).map(|holds| holds != until)
    }

    async fn run_predicate(
        &self,
        predicate: &Predicate,
        until: bool,
        body: &BoxAction,
        ctx: &WorkContext,
        result: &mut WorkReport,
    ) -> Result<usize, WorkReport> {
        let mut iteration = 0;
        loop {
            match self.should_continue(predicate, until, ctx) {
                Ok(true) => {}
                Ok(false) => return Ok(iteration),
                Err(err) => return Err(WorkReport::failure(err)),
            }

            iteration += 1;
            if iteration > MAX_LOOP_ITERATIONS {
                tracing::warn!(loop_name = %self.name, max = MAX_LOOP_ITERATIONS, "loop iteration ceiling reached");
                return Err(WorkReport::failure(WorkError::MaxIterationsExceeded {
                    name: self.name.clone(),
                    max: MAX_LOOP_ITERATIONS,
                }));
            }

            if let ControlFlow::Break(report) = self.iterate(body, ctx, iteration, result).await {
                return Err(report);
            }
        }
    }

    async fn run_kind(
        &self,
        body: &BoxAction,
        ctx: &WorkContext,
        result: &mut WorkReport,
    ) -> Result<usize, WorkReport> {
        match &self.kind {
            LoopKind::Count(n) => {
                for iteration in 1..=*n {
                    if let ControlFlow::Break(report) = self.iterate(body, ctx, iteration, result).await {
                        return Err(report);
                    }
                }
                Ok(*n)
            }
            LoopKind::While(predicate) => self.run_predicate(predicate, false, body, ctx, result).await,
            LoopKind::Until(predicate) => self.run_predicate(predicate, true, body, ctx, result).await,
            LoopKind::Items(items) => {
                for (index, item) in items.iter().enumerate() {
                    ctx.set(keys::LOOP_ITEM, item.clone());
                    ctx.set(keys::LOOP_INDEX, index);
                    if let ControlFlow::Break(report) = self.iterate(body, ctx, index + 1, result).await {
                        return Err(report);
                    }
                }
                Ok(items.len())
            }
            LoopKind::Entries(entries) => {
                for (index, (key, value)) in entries.iter().enumerate() {
                    ctx.set(keys::LOOP_ITEM, value.clone());
                    ctx.set(keys::LOOP_KEY, key.as_str());
                    if let ControlFlow::Break(report) = self.iterate(body, ctx, index + 1, result).await {
                        return Err(report);
                    }
                }
                Ok(entries.len())
            }
        }
    }
}

impl Action for Loop {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &WorkContext) -> WorkReport {
        let Some(body) = &self.body else {
            return WorkReport::failure(WorkError::NotConfigured {
                combinator: "loop".to_string(),
                name: self.name.clone(),
            });
        };

        tracing::debug!(loop_name = %self.name, kind = self.kind.label(), "starting loop");

        let mut result = WorkReport::completed();
        match self.run_kind(body, ctx, &mut result).await {
            Ok(iterations) => {
                tracing::debug!(loop_name = %self.name, iterations, "loop finished");
                result.with_metadata(ITERATIONS_METADATA_KEY, Value::from(iterations))
            }
            Err(report) => report,
        }
    }
}
