//! Composable workflow execution engine.
//!
//! Everything that runs is an [`Action`]: a named unit that takes a shared
//! [`WorkContext`] and returns a [`WorkReport`]. Control-flow combinators
//! (`flow`) and resilience wrappers (`resilience`) are themselves actions, so
//! trees of arbitrary depth compose from the same contract. [`execute`]
//! drives a root action and drains the run's callbacks.
//!
//! Depends only on `taskweave-types` plus the async runtime and tracing; no
//! persistence or network IO lives here.

pub mod action;
pub mod config;
pub mod content;
pub mod context;
pub mod event;
pub mod fault;
pub mod flow;
pub mod llm;
pub mod report;
pub mod resilience;
pub mod runner;

pub use action::{Action, ActionFunc, BoxAction, ErrorHandlerFunc, IntoWorkReport};
pub use context::WorkContext;
pub use event::CallbackRegistry;
pub use report::WorkReport;
pub use runner::{execute, execute_with_config};
