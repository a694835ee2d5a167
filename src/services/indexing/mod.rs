//! Vault Indexing Service
//!
//! Keeps each vault's search index consistent with its file tree:
//!
//! - `actor` - per-collection queueing, coalescing, serialized drains, cancellation
//! - `run` - execution of one reduced workset with progress reporting
//! - `event_bus` - progress fan-out to listeners
//! - `batching` - chunking of path lists for executor calls
//! - `config` - actor tunables loaded from TOML/JSON
//! - `memory` - in-memory reference executor

pub mod actor;
pub mod batching;
pub mod config;
pub mod event_bus;
pub mod memory;
mod run;

pub use actor::{VaultIndexActor, VaultIndexStatus};
pub use batching::into_batches;
pub use config::IndexActorConfig;
pub use event_bus::{ProgressEventBus, ProgressListener, ProgressSubscription};
pub use memory::{ExecutorCall, MemoryIndexExecutor};
