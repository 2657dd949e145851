//! Events emitted while an action tree runs.
//!
//! An `Event` is the unit delivered to callbacks registered on a run. Events
//! are decoupled from the main execution result: losing one never changes a
//! report's status.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event type tags emitted by the built-in combinators.
pub mod types {
    pub const ACTION_TIMED_OUT: &str = "action.timed_out";
    pub const CIRCUIT_STATE_CHANGED: &str = "circuit_breaker.state_changed";
    pub const RETRY_ATTEMPT_FAILED: &str = "retry.attempt_failed";
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";
}

/// A notification emitted by an action or combinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Type tag, e.g. `circuit_breaker.state_changed`.
    pub event_type: String,
    /// Name of the action that emitted the event.
    pub source: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl Event {
    /// Create an event stamped with the current time and an empty payload.
    pub fn new(event_type: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source: source.into(),
            timestamp: Utc::now(),
            payload: Value::Null,
            metadata: HashMap::new(),
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
