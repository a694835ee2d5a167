//! Progress Event Bus
//!
//! Synchronous fan-out of [`IndexProgressEvent`]s to every registered
//! listener, across all collections. Listeners run on the emitting task in
//! registration order; the listener set is snapshotted at emission time so
//! listeners may subscribe or unsubscribe from inside a callback.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::mpsc;
use tracing::warn;
use vault_index_core::IndexProgressEvent;

/// Callback invoked for every progress event.
pub type ProgressListener = Arc<dyn Fn(&IndexProgressEvent) + Send + Sync>;

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, ProgressListener)>>,
}

impl BusInner {
    fn remove(&self, id: u64) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }
}

/// Publish/subscribe hub for index progress.
#[derive(Clone, Default)]
pub struct ProgressEventBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for ProgressEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressEventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl ProgressEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. The returned handle removes it again; dropping
    /// the handle without calling [`ProgressSubscription::unsubscribe`]
    /// leaves the listener registered.
    pub fn subscribe<F>(&self, listener: F) -> ProgressSubscription
    where
        F: Fn(&IndexProgressEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        ProgressSubscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Register a listener that forwards every event into an unbounded
    /// channel. The listener stays registered until unsubscribed, even if
    /// the receiver is dropped (sends are then ignored).
    pub fn subscribe_channel(
        &self,
    ) -> (
        ProgressSubscription,
        mpsc::UnboundedReceiver<IndexProgressEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |event| {
            let _ = tx.send(event.clone());
        });
        (subscription, rx)
    }

    /// Deliver `event` to every listener registered right now.
    pub fn emit(&self, event: &IndexProgressEvent) {
        let snapshot: Vec<ProgressListener> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(
                    collection = %event.collection_id(),
                    run_id = event.run_id(),
                    "progress bus: listener panicked"
                );
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Registration handle returned by [`ProgressEventBus::subscribe`].
#[derive(Debug)]
pub struct ProgressSubscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl ProgressSubscription {
    /// Remove the listener. Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        match self.bus.upgrade() {
            Some(bus) => bus.remove(self.id),
            None => false,
        }
    }
}
