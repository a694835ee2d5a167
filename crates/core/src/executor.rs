//! Index Executor Trait
//!
//! The storage/search engine that physically mutates an index implements
//! [`IndexExecutor`]. The actor layer never calls two methods concurrently
//! for the same collection, so implementations need not be reentrant per
//! collection.
//!
//! Every method receives the run's cancellation token. Long operations should
//! check it between batches and return [`IndexError::Cancelled`] promptly.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::change::{PathRename, PrefixRename};
use crate::error::{IndexError, IndexResult};

/// Callback type for reporting sub-progress of a scan or rebuild.
///
/// Called with `(done, total)`. Values are not required to be monotonic; the
/// caller clamps and keeps a running maximum.
pub type SubProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Performs index mutations for a collection.
#[async_trait]
pub trait IndexExecutor: Send + Sync {
    /// Reconcile the index against the current document manifest.
    async fn scan(
        &self,
        collection_id: &str,
        on_progress: Option<SubProgressCallback>,
        cancel: &CancellationToken,
    ) -> IndexResult<()>;

    /// Drop all index state and rebuild from the documents.
    async fn rebuild(
        &self,
        collection_id: &str,
        on_progress: Option<SubProgressCallback>,
        cancel: &CancellationToken,
    ) -> IndexResult<()>;

    async fn upsert_paths(
        &self,
        collection_id: &str,
        paths: &[String],
        cancel: &CancellationToken,
    ) -> IndexResult<()>;

    async fn remove_paths(
        &self,
        collection_id: &str,
        paths: &[String],
        cancel: &CancellationToken,
    ) -> IndexResult<()>;

    /// Remove every indexed path starting with one of `prefixes`.
    async fn remove_prefixes(
        &self,
        collection_id: &str,
        prefixes: &[String],
        cancel: &CancellationToken,
    ) -> IndexResult<()>;

    async fn rename_paths(
        &self,
        collection_id: &str,
        renames: &[PathRename],
        cancel: &CancellationToken,
    ) -> IndexResult<()>;

    async fn rename_prefixes(
        &self,
        collection_id: &str,
        renames: &[PrefixRename],
        cancel: &CancellationToken,
    ) -> IndexResult<()>;
}

/// Returns `Err(IndexError::Cancelled)` once `cancel` has fired.
pub fn check_cancelled(cancel: &CancellationToken) -> IndexResult<()> {
    if cancel.is_cancelled() {
        Err(IndexError::Cancelled)
    } else {
        Ok(())
    }
}
