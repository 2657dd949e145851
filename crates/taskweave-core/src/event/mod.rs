//! Event fan-out for action trees.
//!
//! - `registry` -- `CallbackRegistry`: async/sync dispatch plus drain (`wait`)

pub mod registry;

pub use registry::{Callback, CallbackRegistry};
