//! Sequential flow: run children one at a time in program order.
//!
//! The flow stops at the first `Failure`, propagating the child's errors
//! prefixed with the child's name. A `Skipped` child does not halt the flow.
//! After each completed child its textual content is written to
//! [`keys::PREVIOUS_OUTPUT`] for the steps that follow.

use taskweave_types::error::WorkError;
use taskweave_types::keys;
use taskweave_types::status::WorkStatus;

use crate::action::{Action, BoxAction};
use crate::content::extract_content;
use crate::context::WorkContext;
use crate::fault::run_isolated;
use crate::report::WorkReport;

/// Separator between the original input and prior outputs in
/// [`ChainMode::Accumulate`].
const ACCUMULATE_SEPARATOR: &str = "\n\n";

/// How a child's input is derived from the outputs before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainMode {
    /// Children read whatever they like from the context.
    #[default]
    Independent,
    /// Each child's [`keys::USER_INPUT`] is rewritten to the previous output only.
    Chain,
    /// Each child's [`keys::USER_INPUT`] is the original input followed by
    /// every prior output.
    Accumulate,
}

/// Ordered list of children run one after another.
#[derive(Debug, Clone)]
pub struct SequentialFlow {
    name: String,
    actions: Vec<BoxAction>,
    mode: ChainMode,
}

impl SequentialFlow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
            mode: ChainMode::Independent,
        }
    }

    /// Append a child.
    pub fn then(mut self, action: impl Action + 'static) -> Self {
        self.actions.push(BoxAction::new(action));
        self
    }

    /// Strict pipeline: each child sees only the previous child's output.
    pub fn chain(self) -> Self {
        self.with_mode(ChainMode::Chain)
    }

    /// Progressive context: each child sees the original input plus all
    /// prior outputs.
    pub fn accumulate(self) -> Self {
        self.with_mode(ChainMode::Accumulate)
    }

    pub fn with_mode(mut self, mode: ChainMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ChainMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Rewrite the user input for the next child.
    fn prepare_input(&self, ctx: &WorkContext, original: Option<&str>, outputs: &[String]) {
        match self.mode {
            ChainMode::Independent => {}
            ChainMode::Chain => {
                if let Some(previous) = outputs.last() {
                    ctx.set(keys::USER_INPUT, previous.as_str());
                }
            }
            ChainMode::Accumulate => {
                if outputs.is_empty() {
                    return;
                }
                let combined: Vec<&str> = original
                    .into_iter()
                    .chain(outputs.iter().map(String::as_str))
                    .collect();
                ctx.set(keys::USER_INPUT, combined.join(ACCUMULATE_SEPARATOR));
            }
        }
    }

    /// Put the caller's input back once a chained run is over.
    fn restore_input(&self, ctx: &WorkContext, original: Option<String>) {
        if self.mode == ChainMode::Independent {
            return;
        }
        match original {
            Some(input) => ctx.set(keys::USER_INPUT, input),
            None => {
                ctx.remove(keys::USER_INPUT);
            }
        }
    }

    async fn run_children(&self, ctx: &WorkContext, original: Option<&str>) -> WorkReport {
        let mut result = WorkReport::completed();
        let mut outputs: Vec<String> = Vec::new();

        for action in &self.actions {
            if ctx.is_cancelled() {
                tracing::info!(flow = %self.name, next = action.name(), "sequential flow cancelled");
                result.status = WorkStatus::Failure;
                result.add_error(WorkError::Cancelled {
                    name: self.name.clone(),
                });
                return result;
            }

            self.prepare_input(ctx, original, &outputs);

            tracing::debug!(flow = %self.name, action = action.name(), "running sequential step");
            let report = run_isolated(action, ctx).await;
            result.absorb_events_and_metadata(&report);

            if report.is_failure() {
                tracing::debug!(
                    flow = %self.name,
                    action = action.name(),
                    errors = report.errors.len(),
                    "sequential step failed, stopping flow"
                );
                result.status = report.status;
                result.errors = report
                    .errors
                    .into_iter()
                    .map(|err| err.in_action(action.name()))
                    .collect();
                result.data = report.data;
                return result;
            }

            if report.is_skipped() {
                continue;
            }

            if let Some(content) = extract_content(report.data.as_ref()) {
                ctx.set(keys::PREVIOUS_OUTPUT, content.as_str());
                outputs.push(content);
            }
            result.data = report.data;
        }

        result
    }
}

impl Action for SequentialFlow {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &WorkContext) -> WorkReport {
        if self.actions.is_empty() {
            return WorkReport::failure(WorkError::NotConfigured {
                combinator: "sequential flow".to_string(),
                name: self.name.clone(),
            });
        }

        let original = ctx.get_string(keys::USER_INPUT);
        if self.mode != ChainMode::Independent {
            if let Some(input) = &original {
                ctx.set(keys::ORIGINAL_INPUT, input.as_str());
            }
        }

        let report = self.run_children(ctx, original.as_deref()).await;
        self.restore_input(ctx, original);
        report
    }
}
