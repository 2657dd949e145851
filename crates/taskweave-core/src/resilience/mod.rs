//! Resilience wrappers.
//!
//! Each wrapper is itself an [`Action`](crate::action::Action) around one or
//! more children:
//!
//! - `retry` -- `Retry`: bounded re-execution with pluggable backoff
//! - `circuit_breaker` -- `CircuitBreaker`: fail fast after consecutive failures
//! - `timeout` -- `TimeoutWrapper`: deadline enforcement on a spawned task
//! - `collector` -- `ParallelErrorCollector`: run everything, keep every error
//! - `try_catch` -- `TryCatch`: matcher-dispatched recovery plus finally
//!
//! `backoff` and `matchers` hold the strategies and predicates these wrappers
//! are configured with.

pub mod backoff;
pub mod circuit_breaker;
pub mod collector;
pub mod matchers;
pub mod retry;
pub mod timeout;
pub mod try_catch;

pub use backoff::{BackoffStrategy, BoxBackoff, ExponentialBackoff, FixedBackoff, LinearBackoff};
pub use circuit_breaker::{CircuitBreaker, CircuitMetrics, CircuitState};
pub use collector::ParallelErrorCollector;
pub use matchers::ErrorMatcher;
pub use retry::Retry;
pub use timeout::TimeoutWrapper;
pub use try_catch::{CatchHandler, TryCatch};
