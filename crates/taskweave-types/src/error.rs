use thiserror::Error;

/// Error recorded inside a `WorkReport`.
///
/// Reports are merged and copied between combinators, so this type is
/// `Clone` and compares by value. Error classification (retry conditions,
/// catch matchers) works on the `Display` text, so every variant renders a
/// self-describing message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkError {
    /// A failure produced by caller code.
    #[error("{0}")]
    Message(String),

    /// A child failure, prefixed with the name of the action that failed.
    #[error("action '{action}' failed: {source}")]
    ActionFailed {
        action: String,
        #[source]
        source: Box<WorkError>,
    },

    /// An unexpected fault (panic) caught at a fault-isolation boundary.
    #[error("action '{action}' panicked: {message}")]
    Panicked { action: String, message: String },

    #[error("action '{action}' timed out after {timeout_ms}ms")]
    Timeout { action: String, timeout_ms: u64 },

    #[error("circuit breaker '{name}' is open")]
    CircuitOpen { name: String },

    #[error("loop '{name}' exceeded maximum iterations ({max})")]
    MaxIterationsExceeded { name: String, max: usize },

    /// A combinator was run without the child action(s) it needs.
    #[error("{combinator} '{name}' has no action configured")]
    NotConfigured { combinator: String, name: String },

    /// A predicate or condition returned an error while being evaluated.
    #[error("condition evaluation failed in '{name}': {message}")]
    Condition { name: String, message: String },

    #[error("'{name}' cancelled before completion")]
    Cancelled { name: String },

    /// A spawned task could not be joined (aborted by the runtime).
    #[error("task join error: {0}")]
    Join(String),
}

impl WorkError {
    /// Convenience constructor for caller-produced failures.
    pub fn message(message: impl Into<String>) -> Self {
        WorkError::Message(message.into())
    }

    /// Wrap `self` as the failure of the named action.
    pub fn in_action(self, action: impl Into<String>) -> Self {
        WorkError::ActionFailed {
            action: action.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, unwrapping any `ActionFailed` layers.
    pub fn root_cause(&self) -> &WorkError {
        match self {
            WorkError::ActionFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.root_cause(), WorkError::Timeout { .. })
    }

    pub fn is_panic(&self) -> bool {
        matches!(self.root_cause(), WorkError::Panicked { .. })
    }
}

impl From<String> for WorkError {
    fn from(message: String) -> Self {
        WorkError::Message(message)
    }
}

impl From<&str> for WorkError {
    fn from(message: &str) -> Self {
        WorkError::Message(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_failed_display_prefixes_name() {
        let err = WorkError::message("boom").in_action("step-b");
        assert_eq!(err.to_string(), "action 'step-b' failed: boom");
    }

    #[test]
    fn test_root_cause_unwraps_nested_layers() {
        let err = WorkError::Timeout {
            action: "fetch".to_string(),
            timeout_ms: 50,
        }
        .in_action("inner")
        .in_action("outer");
        assert!(err.is_timeout());
        assert!(matches!(err.root_cause(), WorkError::Timeout { timeout_ms: 50, .. }));
    }

    #[test]
    fn test_circuit_open_mentions_is_open() {
        let err = WorkError::CircuitOpen {
            name: "payments".to_string(),
        };
        assert!(err.to_string().contains("is open"));
    }

    #[test]
    fn test_max_iterations_display() {
        let err = WorkError::MaxIterationsExceeded {
            name: "poll".to_string(),
            max: 10_000,
        };
        assert!(err.to_string().contains("exceeded maximum iterations"));
        assert!(err.to_string().contains("10000"));
    }

    #[test]
    fn test_from_str_builds_message() {
        let err: WorkError = "bad input".into();
        assert_eq!(err, WorkError::Message("bad input".to_string()));
        assert!(!err.is_panic());
    }
}
