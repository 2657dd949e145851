//! Two-way branch on a single predicate.

use super::{Predicate, evaluate};
use crate::action::{Action, BoxAction};
use crate::context::WorkContext;
use crate::fault::run_isolated;
use crate::report::WorkReport;

/// Runs `if_true` or `if_false` depending on a predicate.
///
/// A missing branch yields `Skipped`. A predicate that errors or panics
/// aborts with `Failure` without running either branch.
#[derive(Clone)]
pub struct ConditionalFlow {
    name: String,
    predicate: Predicate,
    if_true: Option<BoxAction>,
    if_false: Option<BoxAction>,
}

impl ConditionalFlow {
    pub fn new(name: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            name: name.into(),
            predicate,
            if_true: None,
            if_false: None,
        }
    }

    pub fn if_true(mut self, action: impl Action + 'static) -> Self {
        self.if_true = Some(BoxAction::new(action));
        self
    }

    pub fn if_false(mut self, action: impl Action + 'static) -> Self {
        self.if_false = Some(BoxAction::new(action));
        self
    }
}

impl Action for ConditionalFlow {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &WorkContext) -> WorkReport {
        let outcome = match evaluate(&self.name, &self.predicate, ctx) {
            Ok(outcome) => outcome,
            Err(err) => return WorkReport::failure(err),
        };

        let branch = if outcome { &self.if_true } else { &self.if_false };
        tracing::debug!(flow = %self.name, outcome, has_branch = branch.is_some(), "condition evaluated");

        match branch {
            Some(action) => run_isolated(action, ctx).await,
            None => WorkReport::skipped(),
        }
    }
}

impl std::fmt::Debug for ConditionalFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionalFlow")
            .field("name", &self.name)
            .field("if_true", &self.if_true)
            .field("if_false", &self.if_false)
            .finish_non_exhaustive()
    }
}
