//! Shared domain types for taskweave.
//!
//! This crate contains the value types that flow through the workflow engine:
//! report status, the error carried inside reports, engine events, engine
//! configuration, well-known context keys, and the completion-client data
//! shapes consumed by agents.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod keys;
pub mod llm;
pub mod status;
