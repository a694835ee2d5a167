//! Vault Index
//!
//! Keeps a vault's search index consistent with a constantly mutating file
//! tree without blocking the caller. It includes:
//! - Per-vault index actors that queue, coalesce and serialize index work
//! - Progress events fanned out to any number of listeners
//! - Actor configuration and error types
//!
//! The change model, reducer and executor trait live in `vault-index-core`
//! and are re-exported here.

pub mod services;
pub mod utils;

pub use vault_index_core::{
    count_index_workset_items, reduce, IndexChange, IndexError, IndexExecutor, IndexMode,
    IndexProgressEvent, IndexResult, PathRename, PrefixRename, ReducedWorkset, SubProgressCallback,
};

pub use services::indexing::{
    ExecutorCall, IndexActorConfig, MemoryIndexExecutor, ProgressEventBus, ProgressSubscription,
    VaultIndexActor, VaultIndexStatus,
};
pub use utils::error::{AppError, AppResult};
