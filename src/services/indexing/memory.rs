//! In-Memory Index Executor
//!
//! A reference [`IndexExecutor`] that keeps one set of indexed paths per
//! collection. `scan` and `rebuild` reconcile against a manifest supplied with
//! [`MemoryIndexExecutor::set_manifest`]. Every call is recorded so hosts and
//! tests can assert on exactly what the actor asked for.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use vault_index_core::{
    check_cancelled, IndexError, IndexExecutor, IndexResult, PathRename, PrefixRename,
    SubProgressCallback,
};

/// How many manifest entries a scan/rebuild processes between cancellation
/// checks and progress reports.
const PROGRESS_STRIDE: usize = 64;

/// One recorded executor invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorCall {
    Scan { collection_id: String },
    Rebuild { collection_id: String },
    UpsertPaths {
        collection_id: String,
        paths: Vec<String>,
    },
    RemovePaths {
        collection_id: String,
        paths: Vec<String>,
    },
    RemovePrefixes {
        collection_id: String,
        prefixes: Vec<String>,
    },
    RenamePaths {
        collection_id: String,
        renames: Vec<PathRename>,
    },
    RenamePrefixes {
        collection_id: String,
        renames: Vec<PrefixRename>,
    },
}

#[derive(Debug, Default)]
pub struct MemoryIndexExecutor {
    indexes: Mutex<HashMap<String, BTreeSet<String>>>,
    manifests: Mutex<HashMap<String, BTreeSet<String>>>,
    calls: Mutex<Vec<ExecutorCall>>,
    fail_next: Mutex<Option<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryIndexExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the document manifest used by `scan` and `rebuild`.
    pub fn set_manifest<I, S>(&self, collection_id: &str, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.manifests).insert(
            collection_id.to_string(),
            paths.into_iter().map(Into::into).collect(),
        );
    }

    /// Currently indexed paths, sorted.
    pub fn indexed_paths(&self, collection_id: &str) -> Vec<String> {
        lock(&self.indexes)
            .get(collection_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<ExecutorCall> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Make the next executor call fail with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        *lock(&self.fail_next) = Some(message.into());
    }

    fn begin(&self, call: ExecutorCall) -> IndexResult<()> {
        lock(&self.calls).push(call);
        match lock(&self.fail_next).take() {
            Some(message) => Err(IndexError::executor(message)),
            None => Ok(()),
        }
    }

    fn with_index<R>(
        &self,
        collection_id: &str,
        f: impl FnOnce(&mut BTreeSet<String>) -> R,
    ) -> R {
        let mut indexes = lock(&self.indexes);
        f(indexes.entry(collection_id.to_string()).or_default())
    }

    fn manifest(&self, collection_id: &str) -> BTreeSet<String> {
        lock(&self.manifests)
            .get(collection_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Bring the index in line with the manifest, reporting progress per
    /// manifest entry.
    fn reconcile(
        &self,
        collection_id: &str,
        manifest: &BTreeSet<String>,
        on_progress: Option<&SubProgressCallback>,
        cancel: &CancellationToken,
    ) -> IndexResult<()> {
        self.with_index(collection_id, |index| index.retain(|p| manifest.contains(p)));

        let total = manifest.len();
        for (i, path) in manifest.iter().enumerate() {
            if i % PROGRESS_STRIDE == 0 {
                check_cancelled(cancel)?;
                if let Some(cb) = on_progress {
                    cb(i, total);
                }
            }
            self.with_index(collection_id, |index| index.insert(path.clone()));
        }
        if let Some(cb) = on_progress {
            cb(total, total);
        }
        Ok(())
    }
}

#[async_trait]
impl IndexExecutor for MemoryIndexExecutor {
    async fn scan(
        &self,
        collection_id: &str,
        on_progress: Option<SubProgressCallback>,
        cancel: &CancellationToken,
    ) -> IndexResult<()> {
        self.begin(ExecutorCall::Scan {
            collection_id: collection_id.to_string(),
        })?;
        let manifest = self.manifest(collection_id);
        self.reconcile(collection_id, &manifest, on_progress.as_ref(), cancel)
    }

    async fn rebuild(
        &self,
        collection_id: &str,
        on_progress: Option<SubProgressCallback>,
        cancel: &CancellationToken,
    ) -> IndexResult<()> {
        self.begin(ExecutorCall::Rebuild {
            collection_id: collection_id.to_string(),
        })?;
        self.with_index(collection_id, |index| index.clear());
        let manifest = self.manifest(collection_id);
        self.reconcile(collection_id, &manifest, on_progress.as_ref(), cancel)
    }

    async fn upsert_paths(
        &self,
        collection_id: &str,
        paths: &[String],
        _cancel: &CancellationToken,
    ) -> IndexResult<()> {
        self.begin(ExecutorCall::UpsertPaths {
            collection_id: collection_id.to_string(),
            paths: paths.to_vec(),
        })?;
        self.with_index(collection_id, |index| index.extend(paths.iter().cloned()));
        Ok(())
    }

    async fn remove_paths(
        &self,
        collection_id: &str,
        paths: &[String],
        _cancel: &CancellationToken,
    ) -> IndexResult<()> {
        self.begin(ExecutorCall::RemovePaths {
            collection_id: collection_id.to_string(),
            paths: paths.to_vec(),
        })?;
        self.with_index(collection_id, |index| {
            for path in paths {
                index.remove(path);
            }
        });
        Ok(())
    }

    async fn remove_prefixes(
        &self,
        collection_id: &str,
        prefixes: &[String],
        _cancel: &CancellationToken,
    ) -> IndexResult<()> {
        self.begin(ExecutorCall::RemovePrefixes {
            collection_id: collection_id.to_string(),
            prefixes: prefixes.to_vec(),
        })?;
        self.with_index(collection_id, |index| {
            index.retain(|p| !prefixes.iter().any(|prefix| p.starts_with(prefix.as_str())));
        });
        Ok(())
    }

    async fn rename_paths(
        &self,
        collection_id: &str,
        renames: &[PathRename],
        _cancel: &CancellationToken,
    ) -> IndexResult<()> {
        self.begin(ExecutorCall::RenamePaths {
            collection_id: collection_id.to_string(),
            renames: renames.to_vec(),
        })?;
        self.with_index(collection_id, |index| {
            for rename in renames {
                index.remove(&rename.old_path);
                index.insert(rename.new_path.clone());
            }
        });
        Ok(())
    }

    async fn rename_prefixes(
        &self,
        collection_id: &str,
        renames: &[PrefixRename],
        _cancel: &CancellationToken,
    ) -> IndexResult<()> {
        self.begin(ExecutorCall::RenamePrefixes {
            collection_id: collection_id.to_string(),
            renames: renames.to_vec(),
        })?;
        self.with_index(collection_id, |index| {
            for rename in renames {
                let moved: Vec<String> = index
                    .iter()
                    .filter(|p| p.starts_with(rename.old_prefix.as_str()))
                    .cloned()
                    .collect();
                for path in moved {
                    index.remove(&path);
                    let rest = &path[rename.old_prefix.len()..];
                    index.insert(format!("{}{}", rename.new_prefix, rest));
                }
            }
        });
        Ok(())
    }
}
