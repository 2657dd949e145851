//! Control-flow combinators.
//!
//! Each combinator is itself an [`Action`](crate::action::Action), so flows
//! nest arbitrarily:
//!
//! - `sequential` -- `SequentialFlow`: ordered children, stop at first failure
//! - `parallel` -- `ParallelFlow`: concurrent children, aggregated report
//! - `conditional` -- `ConditionalFlow`: one predicate, two branches
//! - `switch` -- `SwitchFlow`: ordered cases, first match wins
//! - `loops` -- `Loop`: counted, while, until, and iterator loops

use std::sync::Arc;

use taskweave_types::error::WorkError;

use crate::context::WorkContext;
use crate::fault::isolate_sync;

pub mod conditional;
pub mod loops;
pub mod parallel;
pub mod sequential;
pub mod switch;

pub use conditional::ConditionalFlow;
pub use loops::{Loop, LoopKind, MAX_LOOP_ITERATIONS};
pub use parallel::{DEFAULT_SEPARATOR, ParallelFlow};
pub use sequential::{ChainMode, SequentialFlow};
pub use switch::SwitchFlow;

/// A caller-supplied condition over the run context.
pub type Predicate = Arc<dyn Fn(&WorkContext) -> Result<bool, WorkError> + Send + Sync>;

/// Wrap a closure as a [`Predicate`].
pub fn predicate<F>(f: F) -> Predicate
where
    F: Fn(&WorkContext) -> Result<bool, WorkError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Evaluate a predicate behind the isolation boundary.
///
/// Both a returned error and a panic surface as `Err`; a returned error is
/// wrapped as [`WorkError::Condition`] naming the owning combinator.
pub(crate) fn evaluate(owner: &str, predicate: &Predicate, ctx: &WorkContext) -> Result<bool, WorkError> {
    isolate_sync(owner, || predicate(ctx))?.map_err(|err| WorkError::Condition {
        name: owner.to_string(),
        message: err.to_string(),
    })
}
