//! Callback registry for fanning out `Event`s during a run.
//!
//! `emit` dispatches each callback on its own blocking task and returns
//! immediately; `wait` blocks until every dispatched callback has finished.
//! `emit_sync` runs callbacks in registration order on the caller's task.
//! A panicking callback is isolated and discarded in both modes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use taskweave_types::event::Event;
use tokio::sync::Notify;

use crate::fault::isolate_sync;

/// A registered event callback.
pub type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

/// Ordered list of callbacks plus an outstanding-dispatch counter.
///
/// Cloning produces a shared view of the same registry (backed by `Arc`).
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    callbacks: RwLock<Vec<Callback>>,
    pending: AtomicUsize,
    idle: Notify,
}

/// Decrements the pending counter when a dispatched callback finishes,
/// including when the blocking task is torn down.
struct PendingGuard(Arc<RegistryInner>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.0.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback. Callbacks are invoked in registration order by `emit_sync`.
    pub fn register<F>(&self, callback: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner
            .callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    pub fn len(&self) -> usize {
        self.inner
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of dispatched callbacks that have not finished yet.
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }

    fn snapshot(&self) -> Vec<Callback> {
        self.inner
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fire-and-forget dispatch: every callback runs on its own blocking task.
    ///
    /// Outside a tokio runtime the callbacks run inline instead.
    pub fn emit(&self, event: Event) {
        let callbacks = self.snapshot();
        if callbacks.is_empty() {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(
                event_type = event.event_type.as_str(),
                "no runtime available, dispatching callbacks inline"
            );
            self.emit_sync(&event);
            return;
        };

        for callback in callbacks {
            self.inner.pending.fetch_add(1, Ordering::AcqRel);
            let guard = PendingGuard(Arc::clone(&self.inner));
            let event = event.clone();
            handle.spawn_blocking(move || {
                let _guard = guard;
                let _ = isolate_sync(&event.source, || callback(&event));
            });
        }
    }

    /// Run every callback on the caller's task, in registration order.
    pub fn emit_sync(&self, event: &Event) {
        for callback in self.snapshot() {
            let _ = isolate_sync(&event.source, || callback(event));
        }
    }

    /// Wait until every callback dispatched by `emit` has finished.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.idle.notified();
            let mut notified = std::pin::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callbacks", &self.len())
            .field("pending", &self.pending())
            .finish()
    }
}
