//! Vault Index Actor
//!
//! One logical actor per collection id. Callers push [`IndexChange`]s with
//! [`VaultIndexActor::touch_index`] and return immediately; a drain task per
//! collection reduces everything queued since the last drain into one
//! workset, executes it, and loops until the queue stays empty.
//!
//! Guarantees per collection:
//! - at most one drain scheduled or running at a time,
//! - a scheduled drain waits until touches stop arriving for one coalescing
//!   window, so a burst from any thread lands in one snapshot,
//! - changes touched during a run are picked up by the next loop iteration.
//!
//! Different collections drain fully concurrently.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vault_index_core::{
    count_index_workset_items, reduce, IndexChange, IndexError, IndexExecutor, IndexProgressEvent,
};

use super::config::IndexActorConfig;
use super::event_bus::{ProgressEventBus, ProgressSubscription};
use super::run::{classify_mode, execute_workset, RunContext};
use crate::utils::error::{AppError, AppResult};

/// Per-collection bookkeeping. Only the actor's enqueue and drain paths
/// mutate it.
#[derive(Debug, Default)]
struct VaultActorState {
    /// A drain loop is executing a workset
    running: bool,
    /// A drain has been spawned but has not taken its snapshot yet
    drain_scheduled: bool,
    /// Incremented once per executed workset
    run_id: u64,
    /// Incremented on every queued change; a scheduled drain waits for it to settle
    touch_seq: u64,
    pending_changes: Vec<IndexChange>,
    cancel_handle: Option<CancellationToken>,
}

impl VaultActorState {
    fn is_idle(&self) -> bool {
        !self.running && !self.drain_scheduled && self.pending_changes.is_empty()
    }
}

/// Point-in-time view of one collection's actor state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultIndexStatus {
    pub collection_id: String,
    pub running: bool,
    pub drain_scheduled: bool,
    pub run_id: u64,
    pub pending: usize,
}

struct ActorInner {
    executor: Arc<dyn IndexExecutor>,
    config: IndexActorConfig,
    runtime: Handle,
    bus: ProgressEventBus,
    states: Mutex<HashMap<String, VaultActorState>>,
    /// Signalled whenever a drain loop exits.
    idle: Notify,
}

/// Serializes index work per collection.
///
/// Cheap to clone; clones share the same registry, executor and bus.
#[derive(Clone)]
pub struct VaultIndexActor {
    inner: Arc<ActorInner>,
}

impl std::fmt::Debug for VaultIndexActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultIndexActor")
            .field("config", &self.inner.config)
            .field("collections", &self.collections())
            .finish()
    }
}

impl VaultIndexActor {
    /// Create an actor that drains on the current tokio runtime.
    pub fn new(executor: Arc<dyn IndexExecutor>, config: IndexActorConfig) -> AppResult<Self> {
        let runtime = Handle::try_current().map_err(|e| AppError::runtime(e.to_string()))?;
        Self::with_runtime(executor, config, runtime)
    }

    /// Create an actor that drains on `runtime`. `touch_index` may then be
    /// called from any thread, including ones outside the runtime.
    pub fn with_runtime(
        executor: Arc<dyn IndexExecutor>,
        config: IndexActorConfig,
        runtime: Handle,
    ) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(ActorInner {
                executor,
                config,
                runtime,
                bus: ProgressEventBus::new(),
                states: Mutex::new(HashMap::new()),
                idle: Notify::new(),
            }),
        })
    }

    fn states(&self) -> MutexGuard<'_, HashMap<String, VaultActorState>> {
        self.inner
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `change` for `collection_id` and return without waiting.
    ///
    /// A `ForceRebuild` is dropped when the collection already has a run in
    /// progress, a drain scheduled, or queued changes.
    pub fn touch_index(&self, collection_id: &str, change: IndexChange) {
        let schedule = {
            let mut states = self.states();
            let state = states.entry(collection_id.to_string()).or_default();

            if change.is_force_rebuild() && !state.is_idle() {
                debug!(
                    collection = %collection_id,
                    running = state.running,
                    pending = state.pending_changes.len(),
                    "vault index: redundant rebuild dropped"
                );
                return;
            }

            debug!(
                collection = %collection_id,
                change = change.kind(),
                pending = state.pending_changes.len() + 1,
                "vault index: change queued"
            );
            state.pending_changes.push(change);
            state.touch_seq += 1;

            if state.running || state.drain_scheduled {
                false
            } else {
                state.drain_scheduled = true;
                true
            }
        };

        if schedule {
            let actor = self.clone();
            let collection_id = collection_id.to_string();
            self.inner.runtime.spawn(async move {
                actor.drain(collection_id).await;
            });
        }
    }

    /// Drop queued changes for `collection_id` and cancel its in-flight run.
    pub fn cancel_index(&self, collection_id: &str) {
        let mut states = self.states();
        let Some(state) = states.get_mut(collection_id) else {
            return;
        };
        let dropped = state.pending_changes.len();
        state.pending_changes.clear();
        let in_flight = match &state.cancel_handle {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        };
        info!(
            collection = %collection_id,
            dropped,
            in_flight,
            "vault index: cancel requested"
        );
    }

    /// Register a listener for progress events of every collection.
    pub fn subscribe_index_progress<F>(&self, listener: F) -> ProgressSubscription
    where
        F: Fn(&IndexProgressEvent) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(listener)
    }

    pub fn progress_bus(&self) -> &ProgressEventBus {
        &self.inner.bus
    }

    pub fn config(&self) -> &IndexActorConfig {
        &self.inner.config
    }

    /// Snapshot of one collection's state, `None` if it was never touched.
    pub fn status(&self, collection_id: &str) -> Option<VaultIndexStatus> {
        self.states()
            .get(collection_id)
            .map(|state| VaultIndexStatus {
                collection_id: collection_id.to_string(),
                running: state.running,
                drain_scheduled: state.drain_scheduled,
                run_id: state.run_id,
                pending: state.pending_changes.len(),
            })
    }

    /// Known collection ids, sorted.
    pub fn collections(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.states().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Forget an idle collection. Returns `false` while a drain is scheduled
    /// or running, or when the id is unknown.
    pub fn discard_index_state(&self, collection_id: &str) -> bool {
        let mut states = self.states();
        let discardable = states
            .get(collection_id)
            .is_some_and(VaultActorState::is_idle);
        if discardable {
            states.remove(collection_id);
            debug!(collection = %collection_id, "vault index: state discarded");
        }
        discardable
    }

    /// `true` when the collection has nothing queued, scheduled or running.
    pub fn is_idle(&self, collection_id: &str) -> bool {
        self.states()
            .get(collection_id)
            .map_or(true, VaultActorState::is_idle)
    }

    /// Resolve once `collection_id` is idle.
    pub async fn wait_idle(&self, collection_id: &str) {
        loop {
            let mut notified = std::pin::pin!(self.inner.idle.notified());
            notified.as_mut().enable();
            if self.is_idle(collection_id) {
                return;
            }
            notified.await;
        }
    }

    fn touch_seq(&self, collection_id: &str) -> u64 {
        self.states()
            .get(collection_id)
            .map_or(0, |state| state.touch_seq)
    }

    /// Wait until a full coalescing window passes without a new touch.
    ///
    /// On a multi-threaded runtime the drain task can start on another
    /// worker while the caller is still in its touch loop, so a single yield
    /// is not enough.
    async fn settle(&self, collection_id: &str) {
        let window = self.inner.config.coalesce_delay();
        let mut seen = self.touch_seq(collection_id);
        loop {
            if window.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(window).await;
            }
            let current = self.touch_seq(collection_id);
            if current == seen {
                return;
            }
            seen = current;
        }
    }

    async fn drain(&self, collection_id: String) {
        self.settle(&collection_id).await;

        loop {
            let next = {
                let mut states = self.states();
                let Some(state) = states.get_mut(&collection_id) else {
                    break;
                };
                state.drain_scheduled = false;
                if state.pending_changes.is_empty() {
                    state.running = false;
                    None
                } else {
                    state.running = true;
                    state.run_id += 1;
                    let cancel = CancellationToken::new();
                    state.cancel_handle = Some(cancel.clone());
                    Some((std::mem::take(&mut state.pending_changes), state.run_id, cancel))
                }
            };

            let Some((snapshot, run_id, cancel)) = next else {
                break;
            };

            self.run_once(&collection_id, snapshot, run_id, cancel).await;

            if let Some(state) = self.states().get_mut(&collection_id) {
                state.cancel_handle = None;
            }
        }

        self.inner.idle.notify_waiters();
    }

    async fn run_once(
        &self,
        collection_id: &str,
        snapshot: Vec<IndexChange>,
        run_id: u64,
        cancel: CancellationToken,
    ) {
        let queued_work_items = snapshot.len();
        let workset = reduce(&snapshot);
        let mode = classify_mode(&workset);
        debug!(
            collection = %collection_id,
            run_id,
            queued_work_items,
            reduced_items = count_index_workset_items(&workset),
            "vault index: snapshot reduced"
        );

        let ctx = RunContext {
            collection_id: collection_id.to_string(),
            run_id,
            queued_work_items,
            mode,
            batch_size: self.inner.config.batch_size,
            executor: Arc::clone(&self.inner.executor),
            bus: self.inner.bus.clone(),
            cancel,
        };

        // Run on its own task so an executor panic cannot leave the
        // collection stuck in `running`.
        let outcome = self
            .inner
            .runtime
            .spawn(async move { execute_workset(&ctx, &workset).await })
            .await;

        let error_message = match outcome {
            Ok(Ok(_)) => return,
            Ok(Err(e)) if e.is_cancelled() => {
                debug!(collection = %collection_id, run_id, "vault index: run cancelled");
                return;
            }
            Ok(Err(e)) => e.to_string(),
            Err(join_error) => join_error_to_index_error(join_error).to_string(),
        };

        warn!(
            collection = %collection_id,
            run_id,
            error = %error_message,
            "vault index: run failed"
        );
        self.inner.bus.emit(&IndexProgressEvent::Failed {
            collection_id: collection_id.to_string(),
            run_id,
            error_message,
            mode,
            queued_work_items,
        });
    }
}

fn join_error_to_index_error(err: JoinError) -> IndexError {
    if err.is_cancelled() {
        return IndexError::internal("index run aborted");
    }
    let payload = err.into_panic();
    let message = if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("index executor panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("index executor panicked: {msg}")
    } else {
        "index executor panicked".to_string()
    };
    IndexError::internal(message)
}
