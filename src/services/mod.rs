//! Services
//!
//! Business logic services for the library.

pub mod indexing;

pub use indexing::{
    IndexActorConfig, MemoryIndexExecutor, ProgressEventBus, ProgressSubscription, VaultIndexActor,
    VaultIndexStatus,
};
