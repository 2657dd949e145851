//! Exhaustive concurrent health aggregation.
//!
//! Unlike `ParallelFlow`, which combines the content of its branches, the
//! collector exists to gather every outcome. All actions run to completion
//! on their own tasks and every error is kept. The report is `Completed` only
//! when no error was collected and no child failed, including children that
//! failed without reporting an error.
//!
//! Child metadata is namespaced by declaration index as `action_<i>_<key>`,
//! and summary counts are always present.

use std::collections::HashMap;

use serde_json::{Value, json};
use taskweave_types::error::WorkError;
use taskweave_types::status::WorkStatus;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::action::{Action, BoxAction};
use crate::context::WorkContext;
use crate::fault::{join_error, run_isolated};
use crate::report::WorkReport;

pub const TOTAL_ACTIONS_KEY: &str = "total_actions";
pub const SUCCEEDED_KEY: &str = "succeeded";
pub const FAILED_KEY: &str = "failed";
pub const TOTAL_ERRORS_KEY: &str = "total_errors";

#[derive(Debug, Clone)]
pub struct ParallelErrorCollector {
    name: String,
    actions: Vec<BoxAction>,
}

impl ParallelErrorCollector {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
        }
    }

    pub fn with(mut self, action: impl Action + 'static) -> Self {
        self.actions.push(BoxAction::new(action));
        self
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every action and return their reports in declaration order.
    async fn collect(&self, ctx: &WorkContext) -> Vec<WorkReport> {
        let mut join_set = JoinSet::new();
        let mut index_of = HashMap::with_capacity(self.actions.len());
        for (index, action) in self.actions.iter().enumerate() {
            let action = action.clone();
            let ctx = ctx.clone();
            let handle =
                join_set.spawn(async move { run_isolated(&action, &ctx).await }.in_current_span());
            index_of.insert(handle.id(), index);
        }

        let mut reports: Vec<Option<WorkReport>> = vec![None; self.actions.len()];
        while let Some(joined) = join_set.join_next_with_id().await {
            // Branch panics are already converted by `run_isolated`, so a
            // join error here means the task was aborted.
            let (id, report) = match joined {
                Ok((id, report)) => (id, report),
                Err(err) => {
                    let id = err.id();
                    let name = index_of
                        .get(&id)
                        .map(|&i| self.actions[i].name())
                        .unwrap_or(self.name.as_str());
                    (id, WorkReport::failure(join_error(name, err)))
                }
            };
            if let Some(slot) = index_of.get(&id).and_then(|&i| reports.get_mut(i)) {
                *slot = Some(report);
            }
        }

        reports.into_iter().flatten().collect()
    }
}

impl Action for ParallelErrorCollector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &WorkContext) -> WorkReport {
        if self.actions.is_empty() {
            return WorkReport::failure(WorkError::NotConfigured {
                combinator: "parallel error collector".to_string(),
                name: self.name.clone(),
            });
        }

        let reports = self.collect(ctx).await;

        let mut result = WorkReport::new(WorkStatus::Completed);
        let mut succeeded = 0usize;
        let mut failed = 0usize;
        let mut data = Vec::with_capacity(reports.len());

        for (index, report) in reports.into_iter().enumerate() {
            match report.status {
                WorkStatus::Completed => succeeded += 1,
                WorkStatus::Failure => failed += 1,
                WorkStatus::Skipped => {}
            }
            for (key, value) in report.metadata {
                result.metadata.insert(format!("action_{index}_{key}"), value);
            }
            result.events.extend(report.events);
            result.errors.extend(report.errors);
            data.push(report.data.unwrap_or(Value::Null));
        }

        let total_errors = result.errors.len();
        if failed > 0 || total_errors > 0 {
            result.status = WorkStatus::Failure;
        }
        result.data = Some(Value::Array(data));

        tracing::debug!(
            collector = %self.name,
            total = self.actions.len(),
            succeeded,
            failed,
            total_errors,
            "parallel error collection finished"
        );

        result
            .with_metadata(TOTAL_ACTIONS_KEY, json!(self.actions.len()))
            .with_metadata(SUCCEEDED_KEY, json!(succeeded))
            .with_metadata(FAILED_KEY, json!(failed))
            .with_metadata(TOTAL_ERRORS_KEY, json!(total_errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionFunc;
    use std::time::{Duration, Instant};

    fn check(name: &'static str, ms: u64, healthy: bool) -> BoxAction {
        BoxAction::new(ActionFunc::new(name, move |_ctx| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            if healthy {
                WorkReport::completed_with(json!(name)).with_metadata("latency_ms", json!(ms))
            } else {
                WorkReport::failure(WorkError::message(format!("{name} unhealthy")))
            }
        }))
    }

    fn explode() -> WorkReport {
        panic!("probe crashed")
    }

    #[tokio::test]
    async fn test_all_healthy_is_completed_with_summary() {
        let collector = ParallelErrorCollector::new("health")
            .with(check("db", 5, true))
            .with(check("cache", 1, true));

        let report = collector.run(&WorkContext::new()).await;

        assert_eq!(report.status, WorkStatus::Completed);
        assert_eq!(report.metadata[TOTAL_ACTIONS_KEY], json!(2));
        assert_eq!(report.metadata[SUCCEEDED_KEY], json!(2));
        assert_eq!(report.metadata[FAILED_KEY], json!(0));
        assert_eq!(report.metadata[TOTAL_ERRORS_KEY], json!(0));
        assert_eq!(report.metadata["action_0_latency_ms"], json!(5));
        assert_eq!(report.metadata["action_1_latency_ms"], json!(1));
        assert_eq!(report.data, Some(json!(["db", "cache"])));
    }

    #[tokio::test]
    async fn test_every_error_is_collected() {
        let collector = ParallelErrorCollector::new("health")
            .with(check("db", 5, false))
            .with(check("cache", 1, true))
            .with(ActionFunc::new("crashy", |_ctx| async { explode() }))
            .with(check("queue", 3, false));

        let report = collector.run(&WorkContext::new()).await;

        assert_eq!(report.status, WorkStatus::Failure);
        assert_eq!(report.errors.len(), 3);
        assert_eq!(report.errors[0], WorkError::message("db unhealthy"));
        assert!(report.errors[1].is_panic());
        assert_eq!(report.errors[2], WorkError::message("queue unhealthy"));
        assert_eq!(report.metadata[SUCCEEDED_KEY], json!(1));
        assert_eq!(report.metadata[FAILED_KEY], json!(3));
        assert_eq!(report.metadata[TOTAL_ERRORS_KEY], json!(3));
    }

    #[tokio::test]
    async fn test_status_only_failure_fails_collection() {
        let collector = ParallelErrorCollector::new("health")
            .with(check("db", 1, true))
            .with(ActionFunc::new("silent", |_ctx| async {
                WorkReport::new(WorkStatus::Failure)
            }));

        let report = collector.run(&WorkContext::new()).await;

        assert_eq!(report.status, WorkStatus::Failure);
        assert!(report.errors.is_empty());
        assert_eq!(report.metadata[FAILED_KEY], json!(1));
        assert_eq!(report.metadata[TOTAL_ERRORS_KEY], json!(0));
        assert_eq!(report.data, Some(json!(["db", null])));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_duration_tracks_slowest_action() {
        let collector = ParallelErrorCollector::new("health")
            .with(check("a", 150, true))
            .with(check("b", 150, false))
            .with(check("c", 150, true));

        let started = Instant::now();
        collector.run(&WorkContext::new()).await;

        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_empty_collector_is_configuration_error() {
        let report = ParallelErrorCollector::new("none").run(&WorkContext::new()).await;
        assert!(matches!(report.first_error(), Some(WorkError::NotConfigured { .. })));
    }
}
