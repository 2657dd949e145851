//! Completion-client boundary.
//!
//! - `CompletionClient`: RPITIT trait for concrete backends
//! - `BoxCompletionClient`: object-safe, cloneable wrapper for dynamic dispatch
//! - `CompletionStep`: an Action that sends the current input through a client

pub mod box_client;
pub mod client;
pub mod step;

pub use box_client::{BoxCompletionClient, CompletionClientDyn};
pub use client::CompletionClient;
pub use step::CompletionStep;
