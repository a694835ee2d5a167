//! Workset Execution
//!
//! Executes one reduced workset against an [`IndexExecutor`] and reports
//! progress for it. Step order is fixed: rebuild (exclusive), or
//! prefix renames, path renames, prefix removals, batched path removals,
//! batched upserts, then the manifest scan. The cancellation token is checked
//! before every executor call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, trace};
use vault_index_core::{
    check_cancelled, count_index_workset_items, IndexExecutor, IndexMode, IndexProgressEvent,
    IndexResult, ReducedWorkset, SubProgressCallback,
};

use super::batching::into_batches;
use super::event_bus::ProgressEventBus;

/// Everything one run needs besides the workset itself.
pub(crate) struct RunContext {
    pub collection_id: String,
    pub run_id: u64,
    pub queued_work_items: usize,
    pub mode: IndexMode,
    pub batch_size: usize,
    pub executor: Arc<dyn IndexExecutor>,
    pub bus: ProgressEventBus,
    pub cancel: CancellationToken,
}

/// Strategy reported in `Started` for a workset.
pub(crate) fn classify_mode(workset: &ReducedWorkset) -> IndexMode {
    if workset.is_full_pass() {
        IndexMode::Dumb
    } else {
        IndexMode::Smart
    }
}

#[derive(Debug, Clone, Copy)]
struct Counts {
    indexed: usize,
    total: usize,
}

/// Running `indexed`/`total` for one run. `indexed` only moves forward and
/// `total` is only ever revised upward.
struct RunTracker {
    collection_id: String,
    run_id: u64,
    mode: IndexMode,
    queued_work_items: usize,
    bus: ProgressEventBus,
    counts: Mutex<Counts>,
}

/// Bookkeeping for one scan/rebuild call that reports sub-progress.
struct SubPass {
    base: usize,
    reported: Arc<AtomicBool>,
}

impl RunTracker {
    fn new(ctx: &RunContext, total: usize) -> Self {
        Self {
            collection_id: ctx.collection_id.clone(),
            run_id: ctx.run_id,
            mode: ctx.mode,
            queued_work_items: ctx.queued_work_items,
            bus: ctx.bus.clone(),
            counts: Mutex::new(Counts { indexed: 0, total }),
        }
    }

    fn counts(&self) -> Counts {
        *self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<F>(&self, f: F) -> Counts
    where
        F: FnOnce(&mut Counts),
    {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        let before = counts.indexed;
        f(&mut counts);
        counts.indexed = counts.indexed.max(before);
        counts.total = counts.total.max(counts.indexed);
        *counts
    }

    fn emit_started(&self) {
        let counts = self.counts();
        self.bus.emit(&IndexProgressEvent::Started {
            collection_id: self.collection_id.clone(),
            run_id: self.run_id,
            total: counts.total,
            mode: self.mode,
            queued_work_items: self.queued_work_items,
        });
    }

    fn emit_progress(&self, counts: Counts) {
        self.bus.emit(&IndexProgressEvent::Progress {
            collection_id: self.collection_id.clone(),
            run_id: self.run_id,
            indexed: counts.indexed,
            total: counts.total,
            mode: self.mode,
            queued_work_items: self.queued_work_items,
        });
    }

    /// Completed runs always report `Smart`, whatever `Started` said.
    fn emit_completed(&self, started_at: Instant) -> usize {
        let counts = self.counts();
        let elapsed_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.bus.emit(&IndexProgressEvent::Completed {
            collection_id: self.collection_id.clone(),
            run_id: self.run_id,
            indexed: counts.indexed,
            elapsed_ms,
            mode: IndexMode::Smart,
            queued_work_items: self.queued_work_items,
        });
        counts.indexed
    }

    /// Record `done` finished items and emit `Progress`.
    fn advance(&self, done: usize) {
        let counts = self.update(|c| c.indexed += done);
        trace!(
            collection = %self.collection_id,
            run_id = self.run_id,
            indexed = counts.indexed,
            total = counts.total,
            "vault index: progress"
        );
        self.emit_progress(counts);
    }

    fn begin_sub_pass(&self) -> SubPass {
        SubPass {
            base: self.counts().indexed,
            reported: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Callback handed to the executor. Sub-counts are offset by the pass
    /// base, clamped to `[0, total]`, and folded into a running maximum.
    fn sub_progress_callback(self: &Arc<Self>, pass: &SubPass) -> SubProgressCallback {
        let tracker = Arc::clone(self);
        let base = pass.base;
        let reported = Arc::clone(&pass.reported);
        Arc::new(move |done: usize, sub_total: usize| {
            reported.store(true, Ordering::Release);
            let counts = tracker.update(|c| {
                c.total = c.total.max(base.saturating_add(sub_total));
                let candidate = base.saturating_add(done).min(c.total);
                c.indexed = c.indexed.max(candidate);
            });
            tracker.emit_progress(counts);
        })
    }

    /// Close a sub-pass. A pass that never reported still advances by one so
    /// the display shows measurable completion.
    fn end_sub_pass(&self, pass: &SubPass) {
        let silent = !pass.reported.load(Ordering::Acquire);
        let counts = self.update(|c| {
            if silent {
                c.indexed = c.indexed.max(pass.base + 1);
            }
        });
        self.emit_progress(counts);
    }
}

/// Execute `workset`, emitting `Started`, `Progress` and `Completed`.
///
/// Returns the final `indexed` count. Errors (including
/// [`vault_index_core::IndexError::Cancelled`]) are returned without a
/// terminal event; the caller decides whether to report them.
pub(crate) async fn execute_workset(
    ctx: &RunContext,
    workset: &ReducedWorkset,
) -> IndexResult<usize> {
    let started_at = Instant::now();
    let tracker = Arc::new(RunTracker::new(ctx, count_index_workset_items(workset)));
    let collection_id = ctx.collection_id.as_str();
    let executor = ctx.executor.as_ref();
    let cancel = &ctx.cancel;

    info!(
        collection = %collection_id,
        run_id = ctx.run_id,
        mode = %ctx.mode,
        queued_work_items = ctx.queued_work_items,
        total = tracker.counts().total,
        "vault index: run started"
    );
    tracker.emit_started();

    if workset.force_rebuild {
        check_cancelled(cancel)?;
        let pass = tracker.begin_sub_pass();
        executor
            .rebuild(
                collection_id,
                Some(tracker.sub_progress_callback(&pass)),
                cancel,
            )
            .await?;
        tracker.end_sub_pass(&pass);
        return Ok(finish(ctx, &tracker, started_at));
    }

    if !workset.rename_prefixes.is_empty() {
        check_cancelled(cancel)?;
        executor
            .rename_prefixes(collection_id, &workset.rename_prefixes, cancel)
            .await?;
        tracker.advance(workset.rename_prefixes.len());
    }

    if !workset.rename_paths.is_empty() {
        check_cancelled(cancel)?;
        executor
            .rename_paths(collection_id, &workset.rename_paths, cancel)
            .await?;
        tracker.advance(workset.rename_paths.len());
    }

    if !workset.remove_prefixes.is_empty() {
        check_cancelled(cancel)?;
        let prefixes: Vec<String> = workset.remove_prefixes.iter().cloned().collect();
        executor
            .remove_prefixes(collection_id, &prefixes, cancel)
            .await?;
        tracker.advance(prefixes.len());
    }

    for batch in into_batches(workset.remove_paths.iter().cloned(), ctx.batch_size) {
        check_cancelled(cancel)?;
        executor.remove_paths(collection_id, &batch, cancel).await?;
        tracker.advance(batch.len());
    }

    for batch in into_batches(workset.upsert_paths.iter().cloned(), ctx.batch_size) {
        check_cancelled(cancel)?;
        executor.upsert_paths(collection_id, &batch, cancel).await?;
        tracker.advance(batch.len());
    }

    if workset.force_scan {
        check_cancelled(cancel)?;
        let pass = tracker.begin_sub_pass();
        executor
            .scan(
                collection_id,
                Some(tracker.sub_progress_callback(&pass)),
                cancel,
            )
            .await?;
        tracker.end_sub_pass(&pass);
    }

    Ok(finish(ctx, &tracker, started_at))
}

fn finish(ctx: &RunContext, tracker: &RunTracker, started_at: Instant) -> usize {
    let indexed = tracker.emit_completed(started_at);
    info!(
        collection = %ctx.collection_id,
        run_id = ctx.run_id,
        indexed,
        elapsed_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
        "vault index: run completed"
    );
    indexed
}
