//! Multi-way branch over ordered `(predicate, action)` cases.
//!
//! Cases are evaluated in declaration order and the first predicate that
//! returns `true` wins; later predicates are never evaluated. With no match
//! the default action runs, or the switch is `Skipped`. A predicate error at
//! any position aborts the whole switch with `Failure`.

use super::{Predicate, evaluate};
use crate::action::{Action, BoxAction};
use crate::context::WorkContext;
use crate::fault::run_isolated;
use crate::report::WorkReport;

#[derive(Clone)]
struct SwitchCase {
    predicate: Predicate,
    action: BoxAction,
}

#[derive(Clone)]
pub struct SwitchFlow {
    name: String,
    cases: Vec<SwitchCase>,
    default: Option<BoxAction>,
}

impl SwitchFlow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cases: Vec::new(),
            default: None,
        }
    }

    /// Append a case. Order is significant.
    pub fn case(mut self, predicate: Predicate, action: impl Action + 'static) -> Self {
        self.cases.push(SwitchCase {
            predicate,
            action: BoxAction::new(action),
        });
        self
    }

    /// Action run when no case matches.
    pub fn with_default(mut self, action: impl Action + 'static) -> Self {
        self.default = Some(BoxAction::new(action));
        self
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

impl Action for SwitchFlow {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &WorkContext) -> WorkReport {
        for (position, case) in self.cases.iter().enumerate() {
            match evaluate(&self.name, &case.predicate, ctx) {
                Ok(true) => {
                    tracing::debug!(flow = %self.name, position, action = case.action.name(), "switch case matched");
                    return run_isolated(&case.action, ctx).await;
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::debug!(flow = %self.name, position, error = %err, "switch case predicate failed");
                    return WorkReport::failure(err);
                }
            }
        }

        match &self.default {
            Some(action) => {
                tracing::debug!(flow = %self.name, "no switch case matched, running default");
                run_isolated(action, ctx).await
            }
            None => WorkReport::skipped(),
        }
    }
}

impl std::fmt::Debug for SwitchFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwitchFlow")
            .field("name", &self.name)
            .field("cases", &self.cases.len())
            .field("default", &self.default)
            .finish()
    }
}
