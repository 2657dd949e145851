//! Parallel flow: run every child concurrently against the shared context.
//!
//! Each child runs on its own tokio task via `JoinSet`. The flow waits for
//! all of them, then merges:
//!
//! - status: `Failure` if any child failed, `Skipped` if none completed and
//!   none failed, otherwise `Completed`
//! - errors and combined content: child declaration order
//! - events and metadata: completion order, last write wins
//!
//! Metadata written under the same key by two children therefore has no
//! defined winner.

use std::collections::HashMap;

use serde_json::Value;
use taskweave_types::error::WorkError;
use taskweave_types::status::WorkStatus;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::action::{Action, BoxAction};
use crate::content::extract_content;
use crate::context::WorkContext;
use crate::fault::{join_error, run_isolated};
use crate::report::WorkReport;

/// Separator placed between the contents of successful children.
pub const DEFAULT_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone)]
pub struct ParallelFlow {
    name: String,
    actions: Vec<BoxAction>,
    separator: String,
}

impl ParallelFlow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }

    /// Add a branch.
    pub fn with(mut self, action: impl Action + 'static) -> Self {
        self.actions.push(BoxAction::new(action));
        self
    }

    /// Override the separator used to join branch contents.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Action for ParallelFlow {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &WorkContext) -> WorkReport {
        if self.actions.is_empty() {
            return WorkReport::failure(WorkError::NotConfigured {
                combinator: "parallel flow".to_string(),
                name: self.name.clone(),
            });
        }

        tracing::debug!(flow = %self.name, branches = self.actions.len(), "starting parallel flow");

        let mut join_set = JoinSet::new();
        let mut index_of = HashMap::with_capacity(self.actions.len());
        for (index, action) in self.actions.iter().enumerate() {
            let action = action.clone();
            let ctx = ctx.clone();
            let handle = join_set.spawn(
                async move { run_isolated(&action, &ctx).await }.in_current_span(),
            );
            index_of.insert(handle.id(), index);
        }

        let mut result = WorkReport::new(WorkStatus::Skipped);
        let mut reports: Vec<Option<WorkReport>> = vec![None; self.actions.len()];

        while let Some(joined) = join_set.join_next_with_id().await {
            let (index, report) = match joined {
                Ok((id, report)) => (index_of.get(&id).copied(), report),
                Err(err) => {
                    let index = index_of.get(&err.id()).copied();
                    let branch = index
                        .map(|i| self.actions[i].name().to_string())
                        .unwrap_or_else(|| self.name.clone());
                    (index, WorkReport::failure(join_error(&branch, err)))
                }
            };
            result.absorb_events_and_metadata(&report);
            if let Some(slot) = index.and_then(|i| reports.get_mut(i)) {
                *slot = Some(report);
            }
        }

        let mut any_completed = false;
        let mut any_failed = false;
        let mut contents = Vec::new();
        for report in reports.into_iter().flatten() {
            match report.status {
                WorkStatus::Completed => {
                    any_completed = true;
                    contents.extend(extract_content(report.data.as_ref()));
                }
                WorkStatus::Failure => {
                    any_failed = true;
                    result.errors.extend(report.errors);
                }
                WorkStatus::Skipped => {}
            }
        }

        result.status = if any_failed {
            WorkStatus::Failure
        } else if any_completed {
            WorkStatus::Completed
        } else {
            WorkStatus::Skipped
        };
        if !contents.is_empty() {
            result.data = Some(Value::String(contents.join(&self.separator)));
        }

        tracing::debug!(
            flow = %self.name,
            status = %result.status,
            errors = result.errors.len(),
            "parallel flow finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionFunc;
    use serde_json::json;
    use std::time::{Duration, Instant};

    fn delayed(name: &'static str, ms: u64, output: &'static str) -> BoxAction {
        BoxAction::new(ActionFunc::new(name, move |_ctx| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            WorkReport::completed_with(json!(output))
        }))
    }

    fn explode() -> WorkReport {
        panic!("branch exploded")
    }

    #[tokio::test]
    async fn test_empty_flow_is_configuration_error() {
        let report = ParallelFlow::new("p").run(&WorkContext::new()).await;
        assert!(matches!(report.first_error(), Some(WorkError::NotConfigured { .. })));
    }

    #[tokio::test]
    async fn test_content_joined_in_declaration_order() {
        let flow = ParallelFlow::new("p")
            .with(delayed("slow", 40, "first"))
            .with(delayed("fast", 1, "second"))
            .with_separator(" | ");

        let report = flow.run(&WorkContext::new()).await;

        assert_eq!(report.status, WorkStatus::Completed);
        assert_eq!(report.data, Some(json!("first | second")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_branches_run_concurrently() {
        let flow = ParallelFlow::new("p")
            .with(delayed("a", 150, "a"))
            .with(delayed("b", 150, "b"))
            .with(delayed("c", 150, "c"));

        let started = Instant::now();
        let report = flow.run(&WorkContext::new()).await;

        assert!(report.is_completed());
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_siblings() {
        let ctx = WorkContext::new();
        let flow = ParallelFlow::new("p")
            .with(ActionFunc::new("fails", |_ctx| async {
                WorkReport::failure(WorkError::message("branch failed"))
            }))
            .with(ActionFunc::new("panics", |_ctx| async { explode() }))
            .with(ActionFunc::new("writes", |ctx: WorkContext| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                ctx.set("sibling_ran", true);
                WorkReport::completed_with(json!("ok"))
            }));

        let report = flow.run(&ctx).await;

        assert_eq!(report.status, WorkStatus::Failure);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0], WorkError::message("branch failed"));
        assert!(report.errors[1].is_panic());
        assert_eq!(ctx.get("sibling_ran"), Some(json!(true)));
    }

    #[tokio::test]
    async fn test_all_skipped_is_skipped() {
        let flow = ParallelFlow::new("p")
            .with(ActionFunc::new("s1", |_ctx| async { WorkReport::skipped() }))
            .with(ActionFunc::new("s2", |_ctx| async { WorkReport::skipped() }));
        let report = flow.run(&WorkContext::new()).await;
        assert_eq!(report.status, WorkStatus::Skipped);
        assert!(report.data.is_none());
    }

    #[tokio::test]
    async fn test_conflicting_metadata_has_some_winner() {
        let flow = ParallelFlow::new("p")
            .with(ActionFunc::new("a", |_ctx| async {
                WorkReport::completed()
                    .with_metadata("shared", json!("a"))
                    .with_metadata("only_a", json!(1))
            }))
            .with(ActionFunc::new("b", |_ctx| async {
                WorkReport::completed().with_metadata("shared", json!("b"))
            }));

        let report = flow.run(&WorkContext::new()).await;

        // Completion order decides the winner; only presence is guaranteed.
        assert!(report.metadata["shared"] == json!("a") || report.metadata["shared"] == json!("b"));
        assert_eq!(report.metadata["only_a"], json!(1));
    }
}
