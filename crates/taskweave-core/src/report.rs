//! Uniform result envelope returned by every `Action`.

use std::collections::HashMap;

use serde_json::Value;
use taskweave_types::error::WorkError;
use taskweave_types::event::Event;
use taskweave_types::status::WorkStatus;

/// Result of one `Action::run`.
///
/// A `Failure` report does not have to carry errors: some paths produce a
/// status-only failure, and callers must not assume `errors` is non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkReport {
    pub status: WorkStatus,
    pub errors: Vec<WorkError>,
    /// Opaque payload produced by the action.
    pub data: Option<Value>,
    pub events: Vec<Event>,
    pub metadata: HashMap<String, Value>,
}

impl WorkReport {
    pub fn new(status: WorkStatus) -> Self {
        Self {
            status,
            errors: Vec::new(),
            data: None,
            events: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn completed() -> Self {
        Self::new(WorkStatus::Completed)
    }

    pub fn completed_with(data: Value) -> Self {
        Self::completed().with_data(data)
    }

    pub fn skipped() -> Self {
        Self::new(WorkStatus::Skipped)
    }

    pub fn failure(error: WorkError) -> Self {
        Self::failures(vec![error])
    }

    pub fn failures(errors: Vec<WorkError>) -> Self {
        Self {
            errors,
            ..Self::new(WorkStatus::Failure)
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    pub fn add_error(&mut self, error: WorkError) {
        self.errors.push(error);
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }

    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    pub fn is_skipped(&self) -> bool {
        self.status.is_skipped()
    }

    pub fn first_error(&self) -> Option<&WorkError> {
        self.errors.first()
    }

    /// Append `other`'s events and copy its metadata over ours (later keys win).
    pub fn absorb_events_and_metadata(&mut self, other: &WorkReport) {
        self.events.extend(other.events.iter().cloned());
        self.metadata
            .extend(other.metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}
