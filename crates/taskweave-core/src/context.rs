//! Shared execution context passed through an action tree.
//!
//! `WorkContext` bundles the state every action in a run can reach: a
//! key/value store behind a single reader/writer lock, the run's
//! cancellation token, the run's tracing span, and an optional callback
//! registry. Cloning is cheap and produces a handle to the *same* run state;
//! that is how one context is shared with spawned branches.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde_json::Value;
use taskweave_types::event::Event;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::event::CallbackRegistry;

/// Run-scoped execution environment.
///
/// Values are cloned on read so no lock guard ever outlives a call, and no
/// guard is held across an `.await`.
#[derive(Clone)]
pub struct WorkContext {
    run_id: Uuid,
    store: Arc<RwLock<HashMap<String, Value>>>,
    cancellation: CancellationToken,
    span: tracing::Span,
    callbacks: Option<CallbackRegistry>,
}

impl WorkContext {
    /// Create a root context for a new run.
    pub fn new() -> Self {
        let run_id = Uuid::now_v7();
        Self {
            run_id,
            store: Arc::new(RwLock::new(HashMap::new())),
            cancellation: CancellationToken::new(),
            span: tracing::info_span!("workflow_run", run_id = %run_id),
            callbacks: None,
        }
    }

    /// Attach the callback registry events of this run are delivered to.
    pub fn with_callbacks(mut self, registry: CallbackRegistry) -> Self {
        self.callbacks = Some(registry);
        self
    }

    /// Use an externally owned cancellation token (e.g. a server shutdown token).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Replace the run's span, e.g. to nest the run under a caller's span.
    pub fn with_logger(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Seed a value before the run starts.
    pub fn with_value(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Derive a context sharing this run's store and callbacks but carrying
    /// a child cancellation token. Cancelling the parent cancels the child,
    /// not vice versa.
    pub fn child(&self) -> Self {
        Self {
            cancellation: self.cancellation.child_token(),
            ..self.clone()
        }
    }

    /// Derive a child context whose token is cancelled once `timeout` elapses.
    ///
    /// The timer task holds only the child token, so it never extends the
    /// lifetime of the run state. Must be called inside a tokio runtime.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let child = self.child();
        let token = child.cancellation.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => token.cancel(),
                _ = token.cancelled() => {}
            }
        });
        child
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Insert or overwrite a value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    /// Get a cloned copy of the value at `key`, or `None` if absent.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Get the value at `key` as a string, rendering non-string values as JSON.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(|value| match value {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Snapshot of all current keys.
    pub fn keys(&self) -> Vec<String> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Snapshot of the whole store.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The run's cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// The run's structured logger.
    pub fn logger(&self) -> &tracing::Span {
        &self.span
    }

    pub fn callbacks(&self) -> Option<&CallbackRegistry> {
        self.callbacks.as_ref()
    }

    /// Deliver an event asynchronously. A no-op without a registry.
    pub fn emit_event(&self, event: Event) {
        if let Some(registry) = &self.callbacks {
            registry.emit(event);
        }
    }

    /// Deliver an event synchronously, in callback registration order.
    pub fn emit_event_sync(&self, event: &Event) {
        if let Some(registry) = &self.callbacks {
            registry.emit_sync(event);
        }
    }

    /// Wait until every callback dispatched through this run has finished.
    pub async fn wait(&self) {
        if let Some(registry) = &self.callbacks {
            registry.wait().await;
        }
    }
}

impl Default for WorkContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WorkContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkContext")
            .field("run_id", &self.run_id)
            .field("keys", &self.keys())
            .field("cancelled", &self.is_cancelled())
            .field("callbacks", &self.callbacks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn set_get_roundtrip() {
        let ctx = WorkContext::new();
        ctx.set("key1", "hello");
        assert_eq!(ctx.get("key1"), Some(json!("hello")));
        assert_eq!(ctx.get("missing"), None);
    }

    #[test]
    fn set_overwrites() {
        let ctx = WorkContext::new();
        ctx.set("k", 1);
        ctx.set("k", 2);
        assert_eq!(ctx.get("k"), Some(json!(2)));
    }

    #[test]
    fn get_string_renders_non_strings() {
        let ctx = WorkContext::new().with_value("n", 42).with_value("s", "text");
        assert_eq!(ctx.get_string("n").as_deref(), Some("42"));
        assert_eq!(ctx.get_string("s").as_deref(), Some("text"));
    }

    #[test]
    fn clones_share_the_store() {
        let ctx = WorkContext::new();
        let other = ctx.clone();
        other.set("shared", true);
        assert!(ctx.contains("shared"));
        assert_eq!(ctx.remove("shared"), Some(json!(true)));
        assert!(!other.contains("shared"));
    }

    #[test]
    fn child_shares_store_and_inherits_cancellation() {
        let ctx = WorkContext::new();
        let child = ctx.child();
        child.set("from_child", 1);
        assert_eq!(ctx.get("from_child"), Some(json!(1)));

        child.cancellation().cancel();
        assert!(!ctx.is_cancelled());

        let second = ctx.child();
        ctx.cancellation().cancel();
        assert!(second.is_cancelled());
    }

    #[tokio::test]
    async fn with_timeout_cancels_child_after_deadline() {
        let ctx = WorkContext::new();
        let child = ctx.with_timeout(Duration::from_millis(20));
        assert!(!child.is_cancelled());
        tokio::time::timeout(Duration::from_secs(1), child.cancellation().cancelled())
            .await
            .expect("child token should be cancelled by the deadline");
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_access_no_panic() {
        let ctx = WorkContext::new();
        let mut handles = Vec::new();
        for i in 0..50 {
            let ctx = ctx.clone();
            handles.push(tokio::spawn(async move {
                ctx.set(format!("key{i}"), i);
                ctx.get(&format!("key{i}"))
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_some());
        }
        assert_eq!(ctx.keys().len(), 50);
    }

    #[test]
    fn emit_without_registry_is_noop() {
        let ctx = WorkContext::new();
        ctx.emit_event(Event::new("noop", "test"));
        ctx.emit_event_sync(&Event::new("noop", "test"));
    }

    #[test]
    fn emit_event_sync_reaches_registry() {
        let registry = CallbackRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        registry.register(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let ctx = WorkContext::new().with_callbacks(registry);

        ctx.emit_event_sync(&Event::new("sync", "test"));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn wait_drains_async_events() {
        let registry = CallbackRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        registry.register(move |_| {
            std::thread::sleep(Duration::from_millis(30));
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let ctx = WorkContext::new().with_callbacks(registry);

        ctx.emit_event(Event::new("async", "test"));
        ctx.emit_event(Event::new("async", "test"));
        ctx.wait().await;

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
