//! Vault Index Actor Integration Tests
//!
//! Drives the actor through its public surface only:
//! - rebuild deduplication and burst coalescing
//! - changes arriving mid-run are picked up by the next loop iteration
//! - cancellation before and during a run
//! - executor errors and panics surface as `Failed` without poisoning the actor
//! - independent collections drain concurrently

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use vault_index::{
    ExecutorCall, IndexActorConfig, IndexChange, IndexMode, IndexProgressEvent, MemoryIndexExecutor,
    VaultIndexActor,
};

use super::support::{assert_run_protocol, drain_events, events_for_run, GatedExecutor};

// ============================================================================
// Helpers
// ============================================================================

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn memory_actor() -> (Arc<MemoryIndexExecutor>, VaultIndexActor) {
    let executor = Arc::new(MemoryIndexExecutor::new());
    let actor = VaultIndexActor::new(executor.clone(), IndexActorConfig::default())
        .expect("actor should build inside a runtime");
    (executor, actor)
}

fn gated_actor() -> (Arc<GatedExecutor>, VaultIndexActor) {
    let executor = GatedExecutor::new();
    let actor = VaultIndexActor::new(executor.clone(), IndexActorConfig::default())
        .expect("actor should build inside a runtime");
    (executor, actor)
}

// ============================================================================
// Deduplication and coalescing
// ============================================================================

#[tokio::test]
async fn test_double_rebuild_runs_once() {
    let (executor, actor) = memory_actor();
    executor.set_manifest("vault", ["a.md", "b.md"]);
    let (_sub, mut rx) = actor.progress_bus().subscribe_channel();

    actor.touch_index("vault", IndexChange::rebuild());
    actor.touch_index("vault", IndexChange::rebuild());
    actor.wait_idle("vault").await;

    assert_eq!(
        executor.calls(),
        vec![ExecutorCall::Rebuild {
            collection_id: "vault".to_string()
        }]
    );
    assert_eq!(executor.indexed_paths("vault"), strings(&["a.md", "b.md"]));

    let events = drain_events(&mut rx);
    assert_run_protocol(&events, 1);
    assert!(matches!(
        events.first(),
        Some(IndexProgressEvent::Started {
            total: 1,
            mode: IndexMode::Dumb,
            queued_work_items: 1,
            ..
        })
    ));
    assert!(matches!(
        events.last(),
        Some(IndexProgressEvent::Completed {
            indexed: 2,
            mode: IndexMode::Smart,
            queued_work_items: 1,
            ..
        })
    ));
}

#[tokio::test]
async fn test_burst_is_reduced_into_one_run() {
    let (executor, actor) = memory_actor();
    let (_sub, mut rx) = actor.progress_bus().subscribe_channel();

    for i in 0..20 {
        actor.touch_index("vault", IndexChange::upsert("daily.md"));
        actor.touch_index("vault", IndexChange::upsert(format!("notes/{i:02}.md")));
    }
    actor.wait_idle("vault").await;

    let events = drain_events(&mut rx);
    assert_eq!(actor.status("vault").unwrap().run_id, 1);
    assert_eq!(
        events.first().map(IndexProgressEvent::queued_work_items),
        Some(40)
    );
    assert!(matches!(
        events.first(),
        Some(IndexProgressEvent::Started { total: 21, .. })
    ));
    assert_eq!(executor.indexed_paths("vault").len(), 21);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_synchronous_burst_coalesces_on_multi_thread_runtime() {
    let (executor, actor) = memory_actor();

    for round in 0..20u64 {
        let collection_id = format!("vault-{round}");
        for i in 0..2000 {
            actor.touch_index(
                &collection_id,
                IndexChange::upsert(format!("notes/{i:04}.md")),
            );
        }
        actor.wait_idle(&collection_id).await;

        assert_eq!(
            actor.status(&collection_id).unwrap().run_id,
            1,
            "round {round} split one burst into several runs"
        );
        assert_eq!(executor.indexed_paths(&collection_id).len(), 2000);
    }
}

#[tokio::test]
async fn test_coalesce_delay_merges_spaced_touches() {
    let executor = Arc::new(MemoryIndexExecutor::new());
    let config = IndexActorConfig::default().with_coalesce_delay(Duration::from_millis(100));
    let actor = VaultIndexActor::new(executor.clone(), config).unwrap();

    actor.touch_index("vault", IndexChange::upsert("a.md"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    actor.touch_index("vault", IndexChange::upsert("b.md"));
    actor.wait_idle("vault").await;

    assert_eq!(actor.status("vault").unwrap().run_id, 1);
    assert_eq!(
        executor.calls(),
        vec![ExecutorCall::UpsertPaths {
            collection_id: "vault".to_string(),
            paths: strings(&["a.md", "b.md"]),
        }]
    );
}

// ============================================================================
// Changes arriving mid-run
// ============================================================================

#[tokio::test]
async fn test_touch_during_scan_starts_second_run() {
    let (executor, actor) = gated_actor();
    let (_sub, mut rx) = actor.progress_bus().subscribe_channel();

    actor.touch_index("vault", IndexChange::scan());
    executor.wait_entered().await;
    assert!(actor.status("vault").unwrap().running);

    actor.touch_index("vault", IndexChange::upsert("a.md"));
    assert_eq!(actor.status("vault").unwrap().pending, 1);

    executor.release(1);
    actor.wait_idle("vault").await;

    assert_eq!(
        executor.inner.calls(),
        vec![
            ExecutorCall::Scan {
                collection_id: "vault".to_string()
            },
            ExecutorCall::UpsertPaths {
                collection_id: "vault".to_string(),
                paths: strings(&["a.md"]),
            },
        ]
    );
    assert_eq!(actor.status("vault").unwrap().run_id, 2);

    let events = drain_events(&mut rx);
    assert_run_protocol(&events, 1);
    assert_run_protocol(&events, 2);

    let first = events_for_run(&events, 1);
    assert_eq!(first[0].mode(), IndexMode::Dumb);
    assert_eq!(
        first.last().map(IndexProgressEvent::mode),
        Some(IndexMode::Smart)
    );

    let second = events_for_run(&events, 2);
    assert_eq!(second[0].mode(), IndexMode::Smart);
    assert_eq!(second[0].queued_work_items(), 1);

    // Runs never interleave.
    let last_of_first = events.iter().rposition(|e| e.run_id() == 1).unwrap();
    let first_of_second = events.iter().position(|e| e.run_id() == 2).unwrap();
    assert!(last_of_first < first_of_second);
}

#[tokio::test]
async fn test_rebuild_during_run_is_dropped() {
    let (executor, actor) = gated_actor();

    actor.touch_index("vault", IndexChange::scan());
    executor.wait_entered().await;
    actor.touch_index("vault", IndexChange::rebuild());
    assert_eq!(actor.status("vault").unwrap().pending, 0);

    executor.release(1);
    actor.wait_idle("vault").await;

    assert_eq!(actor.status("vault").unwrap().run_id, 1);
    assert!(!executor
        .inner
        .calls()
        .iter()
        .any(|call| matches!(call, ExecutorCall::Rebuild { .. })));
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancel_before_drain_starts() {
    let (executor, actor) = memory_actor();
    let (_sub, mut rx) = actor.progress_bus().subscribe_channel();

    actor.touch_index("vault", IndexChange::remove("a.md"));
    actor.cancel_index("vault");
    actor.wait_idle("vault").await;

    assert!(executor.calls().is_empty());
    assert!(drain_events(&mut rx).is_empty());
    assert!(actor.status("vault").is_some());
}

#[tokio::test]
async fn test_cancel_during_run_is_silent_and_recoverable() {
    let (executor, actor) = gated_actor();
    let (_sub, mut rx) = actor.progress_bus().subscribe_channel();

    actor.touch_index("vault", IndexChange::scan());
    executor.wait_entered().await;
    actor.touch_index("vault", IndexChange::upsert("queued.md"));
    actor.cancel_index("vault");
    actor.wait_idle("vault").await;

    let events = drain_events(&mut rx);
    assert_eq!(events.len(), 1, "only Started is emitted: {events:?}");
    assert!(matches!(
        events[0],
        IndexProgressEvent::Started { run_id: 1, .. }
    ));
    assert!(executor.inner.indexed_paths("vault").is_empty());

    actor.touch_index("vault", IndexChange::upsert("after.md"));
    actor.wait_idle("vault").await;

    let events = drain_events(&mut rx);
    assert_run_protocol(&events, 2);
    assert_eq!(
        executor.inner.indexed_paths("vault"),
        strings(&["after.md"])
    );
}

// ============================================================================
// Failure isolation
// ============================================================================

#[tokio::test]
async fn test_executor_error_reports_failed_and_actor_recovers() {
    let (executor, actor) = memory_actor();
    let (_sub, mut rx) = actor.progress_bus().subscribe_channel();

    executor.fail_next("disk full");
    actor.touch_index("vault", IndexChange::upsert("a.md"));
    actor.wait_idle("vault").await;

    let events = drain_events(&mut rx);
    assert_run_protocol(&events, 1);
    match events.last() {
        Some(IndexProgressEvent::Failed {
            run_id,
            error_message,
            mode,
            queued_work_items,
            ..
        }) => {
            assert_eq!(*run_id, 1);
            assert_eq!(error_message, "Executor error: disk full");
            assert_eq!(*mode, IndexMode::Smart);
            assert_eq!(*queued_work_items, 1);
        }
        other => panic!("expected Failed, got {other:?}"),
    }

    actor.touch_index("vault", IndexChange::upsert("b.md"));
    actor.wait_idle("vault").await;

    let events = drain_events(&mut rx);
    assert_run_protocol(&events, 2);
    assert!(matches!(
        events.last(),
        Some(IndexProgressEvent::Completed { run_id: 2, .. })
    ));
    assert_eq!(executor.indexed_paths("vault"), strings(&["b.md"]));
}

#[tokio::test]
async fn test_executor_panic_reports_failed() {
    let (executor, actor) = gated_actor();
    let (_sub, mut rx) = actor.progress_bus().subscribe_channel();

    executor.panic_on_next_upsert();
    actor.touch_index("vault", IndexChange::upsert("a.md"));
    actor.wait_idle("vault").await;

    let events = drain_events(&mut rx);
    assert_run_protocol(&events, 1);
    match events.last() {
        Some(IndexProgressEvent::Failed { error_message, .. }) => {
            assert_eq!(
                error_message,
                "Internal error: index executor panicked: upsert of 1 paths blew up"
            );
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    assert!(!actor.status("vault").unwrap().running);

    actor.touch_index("vault", IndexChange::upsert("b.md"));
    actor.wait_idle("vault").await;
    assert_eq!(executor.inner.indexed_paths("vault"), strings(&["b.md"]));
}

// ============================================================================
// Concurrency across collections
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_collections_drain_independently() {
    let (executor, actor) = gated_actor();

    actor.touch_index("alpha", IndexChange::scan());
    executor.wait_entered().await;

    actor.touch_index("beta", IndexChange::upsert("n.md"));
    tokio::time::timeout(Duration::from_secs(5), actor.wait_idle("beta"))
        .await
        .expect("beta must not wait for alpha");

    assert!(actor.status("alpha").unwrap().running);
    assert_eq!(executor.inner.indexed_paths("beta"), strings(&["n.md"]));

    executor.release(1);
    actor.wait_idle("alpha").await;
    assert_eq!(actor.collections(), strings(&["alpha", "beta"]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_touch_from_non_runtime_thread() {
    let (executor, actor) = memory_actor();

    let toucher = actor.clone();
    std::thread::spawn(move || {
        for i in 0..50 {
            toucher.touch_index("vault", IndexChange::upsert(format!("n{i:02}.md")));
        }
    })
    .join()
    .unwrap();

    actor.wait_idle("vault").await;
    assert_eq!(executor.indexed_paths("vault").len(), 50);
}

// ============================================================================
// Subscriptions
// ============================================================================

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let (_executor, actor) = memory_actor();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let sub = actor.subscribe_index_progress(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    actor.touch_index("vault", IndexChange::upsert("a.md"));
    actor.wait_idle("vault").await;
    let after_first = seen.load(Ordering::SeqCst);
    assert_eq!(after_first, 3, "Started, Progress, Completed");

    assert!(sub.unsubscribe());
    actor.touch_index("vault", IndexChange::upsert("b.md"));
    actor.wait_idle("vault").await;
    assert_eq!(seen.load(Ordering::SeqCst), after_first);
}
