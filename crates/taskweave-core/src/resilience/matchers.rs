//! Error classification predicates for `TryCatch` and `Retry`.
//!
//! Classification works on an error's display text, matched
//! case-insensitively. Wrapped errors (`ActionFailed`) render their whole
//! chain, so a keyword anywhere in the chain matches.

use std::sync::Arc;

use taskweave_types::error::WorkError;

/// Decides whether an error is handled by a particular catch clause.
pub type ErrorMatcher = Arc<dyn Fn(&WorkError) -> bool + Send + Sync>;

const TIMEOUT_KEYWORDS: &[&str] = &["timeout", "timed out", "deadline"];

const NETWORK_KEYWORDS: &[&str] = &[
    "network",
    "connect",
    "dns",
    "unreachable",
    "refused",
    "reset by peer",
    "broken pipe",
    "socket",
];

// Bare "missing" / "required" also appear in IO and lookup failures, so
// only their field-oriented phrasings count.
const VALIDATION_KEYWORDS: &[&str] = &[
    "validation",
    "invalid",
    "is required",
    "required field",
    "missing field",
    "missing required",
    "malformed",
    "must be",
];

/// Wrap a closure as an [`ErrorMatcher`].
pub fn matcher<F>(f: F) -> ErrorMatcher
where
    F: Fn(&WorkError) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

fn contains_any(error: &WorkError, keywords: &'static [&'static str]) -> bool {
    let text = error.to_string().to_lowercase();
    keywords.iter().any(|keyword| text.contains(keyword))
}

/// Matches every error.
pub fn any_error() -> ErrorMatcher {
    matcher(|_| true)
}

/// Timeout-like errors, including [`WorkError::Timeout`].
pub fn timeout_errors() -> ErrorMatcher {
    matcher(|error| error.is_timeout() || contains_any(error, TIMEOUT_KEYWORDS))
}

pub fn network_errors() -> ErrorMatcher {
    matcher(|error| contains_any(error, NETWORK_KEYWORDS))
}

pub fn validation_errors() -> ErrorMatcher {
    matcher(|error| contains_any(error, VALIDATION_KEYWORDS))
}

/// Exact message match against either the full text or the root cause.
pub fn message_equals(message: impl Into<String>) -> ErrorMatcher {
    let message = message.into();
    matcher(move |error| {
        error.to_string() == message || error.root_cause().to_string() == message
    })
}

/// Case-insensitive substring match.
pub fn message_contains(fragment: impl Into<String>) -> ErrorMatcher {
    let fragment = fragment.into().to_lowercase();
    matcher(move |error| error.to_string().to_lowercase().contains(&fragment))
}

/// Matches when any of `matchers` does.
pub fn any_of(matchers: impl IntoIterator<Item = ErrorMatcher>) -> ErrorMatcher {
    let matchers: Vec<ErrorMatcher> = matchers.into_iter().collect();
    matcher(move |error| matchers.iter().any(|m| m(error)))
}
