//! Observability setup for taskweave.
//!
//! The engine itself only emits `tracing` spans and events; this crate
//! installs the subscriber that renders them.

pub mod tracing_setup;

pub use tracing_setup::{TracingError, TracingOptions, init_tracing, init_tracing_with, shutdown_tracing};
