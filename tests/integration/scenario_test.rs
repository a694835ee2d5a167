//! Vault Edit Scenario Tests
//!
//! Realistic bursts of file-watcher notifications applied through the actor
//! to the in-memory executor. Each test checks both the executor calls the
//! burst was reduced to and the resulting index contents.

use std::sync::Arc;

use vault_index::{
    ExecutorCall, IndexActorConfig, IndexChange, IndexProgressEvent, MemoryIndexExecutor,
    PathRename, PrefixRename, VaultIndexActor,
};

use super::support::{assert_run_protocol, drain_events};

const VAULT: &str = "personal";

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Actor over an index pre-populated by a rebuild from `manifest`.
async fn seeded_actor(manifest: &[&str]) -> (Arc<MemoryIndexExecutor>, VaultIndexActor) {
    let executor = Arc::new(MemoryIndexExecutor::new());
    executor.set_manifest(VAULT, manifest.iter().copied());
    let actor = VaultIndexActor::new(executor.clone(), IndexActorConfig::default()).unwrap();

    actor.touch_index(VAULT, IndexChange::rebuild());
    actor.wait_idle(VAULT).await;
    executor.clear_calls();
    (executor, actor)
}

#[tokio::test]
async fn test_folder_rename_with_edits_inside() {
    let (executor, actor) = seeded_actor(&["inbox/a.md", "inbox/b.md", "top.md"]).await;

    actor.touch_index(VAULT, IndexChange::upsert("inbox/a.md"));
    actor.touch_index(VAULT, IndexChange::rename_prefix("inbox", "archive"));
    actor.touch_index(VAULT, IndexChange::upsert("archive/c.md"));
    actor.touch_index(VAULT, IndexChange::remove("top.md"));
    actor.wait_idle(VAULT).await;

    assert_eq!(
        executor.calls(),
        vec![
            ExecutorCall::RenamePrefixes {
                collection_id: VAULT.to_string(),
                renames: vec![PrefixRename::new("inbox/", "archive/")],
            },
            ExecutorCall::RemovePaths {
                collection_id: VAULT.to_string(),
                paths: strings(&["top.md"]),
            },
            ExecutorCall::UpsertPaths {
                collection_id: VAULT.to_string(),
                paths: strings(&["archive/a.md", "archive/c.md"]),
            },
        ]
    );
    assert_eq!(
        executor.indexed_paths(VAULT),
        strings(&["archive/a.md", "archive/b.md", "archive/c.md"])
    );
}

#[tokio::test]
async fn test_folder_delete_after_edits() {
    let (executor, actor) = seeded_actor(&["docs/z.md", "keep.md"]).await;

    actor.touch_index(VAULT, IndexChange::upsert("docs/x.md"));
    actor.touch_index(VAULT, IndexChange::upsert("docs/y.md"));
    actor.touch_index(VAULT, IndexChange::remove_prefix("docs"));
    actor.wait_idle(VAULT).await;

    assert_eq!(
        executor.calls(),
        vec![ExecutorCall::RemovePrefixes {
            collection_id: VAULT.to_string(),
            prefixes: strings(&["docs/"]),
        }]
    );
    assert_eq!(executor.indexed_paths(VAULT), strings(&["keep.md"]));
}

#[tokio::test]
async fn test_rename_chain_then_edit() {
    let (executor, actor) = seeded_actor(&["a.md"]).await;

    actor.touch_index(VAULT, IndexChange::rename("a.md", "b.md"));
    actor.touch_index(VAULT, IndexChange::rename("b.md", "c.md"));
    actor.touch_index(VAULT, IndexChange::upsert("c.md"));
    actor.wait_idle(VAULT).await;

    assert_eq!(
        executor.calls(),
        vec![
            ExecutorCall::RenamePaths {
                collection_id: VAULT.to_string(),
                renames: vec![PathRename::new("a.md", "c.md")],
            },
            ExecutorCall::UpsertPaths {
                collection_id: VAULT.to_string(),
                paths: strings(&["c.md"]),
            },
        ]
    );
    assert_eq!(executor.indexed_paths(VAULT), strings(&["c.md"]));
}

#[tokio::test]
async fn test_undo_rename_makes_no_calls() {
    let (executor, actor) = seeded_actor(&["a.md"]).await;

    actor.touch_index(VAULT, IndexChange::rename("a.md", "tmp.md"));
    actor.touch_index(VAULT, IndexChange::rename("tmp.md", "a.md"));
    actor.wait_idle(VAULT).await;

    assert!(executor.calls().is_empty());
    assert_eq!(executor.indexed_paths(VAULT), strings(&["a.md"]));
}

#[tokio::test]
async fn test_rebuild_absorbs_changes_in_same_snapshot() {
    let (executor, actor) = seeded_actor(&["a.md"]).await;

    actor.touch_index(VAULT, IndexChange::rebuild());
    actor.touch_index(VAULT, IndexChange::upsert("unsaved.md"));
    actor.wait_idle(VAULT).await;

    assert_eq!(
        executor.calls(),
        vec![ExecutorCall::Rebuild {
            collection_id: VAULT.to_string()
        }]
    );
    assert_eq!(executor.indexed_paths(VAULT), strings(&["a.md"]));
}

#[tokio::test]
async fn test_rebuild_behind_queued_edit_is_dropped() {
    let (executor, actor) = seeded_actor(&["a.md"]).await;

    actor.touch_index(VAULT, IndexChange::upsert("b.md"));
    actor.touch_index(VAULT, IndexChange::rebuild());
    actor.wait_idle(VAULT).await;

    assert_eq!(
        executor.calls(),
        vec![ExecutorCall::UpsertPaths {
            collection_id: VAULT.to_string(),
            paths: strings(&["b.md"]),
        }]
    );
}

#[tokio::test]
async fn test_large_import_is_batched() {
    let (executor, actor) = seeded_actor(&[]).await;
    let (_sub, mut rx) = actor.progress_bus().subscribe_channel();

    for i in 0..450 {
        actor.touch_index(VAULT, IndexChange::upsert(format!("import/{i:03}.md")));
    }
    actor.wait_idle(VAULT).await;

    let batch_sizes: Vec<usize> = executor
        .calls()
        .iter()
        .map(|call| match call {
            ExecutorCall::UpsertPaths { paths, .. } => paths.len(),
            other => panic!("unexpected call {other:?}"),
        })
        .collect();
    assert_eq!(batch_sizes, vec![200, 200, 50]);
    assert_eq!(executor.indexed_paths(VAULT).len(), 450);

    // The seeding rebuild was run 1.
    let events = drain_events(&mut rx);
    assert_run_protocol(&events, 2);
    let progress: Vec<(usize, usize)> = events
        .iter()
        .filter_map(|event| match event {
            IndexProgressEvent::Progress { indexed, total, .. } => Some((*indexed, *total)),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![(200, 450), (400, 450), (450, 450)]);
}

#[tokio::test]
async fn test_scan_reconciles_missed_events() {
    let (executor, actor) = seeded_actor(&["a.md", "b.md"]).await;

    // The watcher missed a delete and a create while the app was asleep.
    executor.set_manifest(VAULT, ["b.md", "c.md"]);
    actor.touch_index(VAULT, IndexChange::scan());
    actor.wait_idle(VAULT).await;

    assert_eq!(executor.indexed_paths(VAULT), strings(&["b.md", "c.md"]));
}
