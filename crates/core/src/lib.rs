//! Vault Index Core
//!
//! Foundational types for keeping a vault's search index in step with its
//! file tree. This crate has no dependency on the actor, storage or any index engine.
//!
//! ## Module Organization
//!
//! - `error` - Core error type (`IndexError`, `IndexResult`)
//! - `change` - Raw change notifications (`IndexChange`) and path normalization
//! - `workset` - Pure reduction of a change burst into a `ReducedWorkset`
//! - `progress` - Per-run progress events (`IndexProgressEvent`, `IndexMode`)
//! - `executor` - The `IndexExecutor` trait implemented by index engines
//!
//! ## Design Principles
//!
//! 1. **Pure reduction** - the reducer is deterministic and cannot fail
//! 2. **Trait-based executor** - enables mocking, testing and engine swaps
//! 3. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod change;
pub mod error;
pub mod executor;
pub mod progress;
pub mod workset;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{IndexError, IndexResult};

// ── Changes ────────────────────────────────────────────────────────────
pub use change::{
    normalize_vault_path, normalize_vault_prefix, IndexChange, PathRename, PrefixRename,
};

// ── Reduction ──────────────────────────────────────────────────────────
pub use workset::{count_index_workset_items, reduce, ReducedWorkset};

// ── Progress ───────────────────────────────────────────────────────────
pub use progress::{IndexMode, IndexProgressEvent};

// ── Executor ───────────────────────────────────────────────────────────
pub use executor::{check_cancelled, IndexExecutor, SubProgressCallback};
