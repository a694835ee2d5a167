//! Progress Events
//!
//! Events emitted by the actor layer for every index run. Listeners see, per
//! `run_id`, one `Started`, zero or more `Progress`, then exactly one
//! `Completed` or `Failed`.

use serde::{Deserialize, Serialize};

/// Indexing strategy of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMode {
    /// Incremental, path-level work
    Smart,
    /// Full scan or rebuild
    Dumb,
}

impl IndexMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Smart => "smart",
            Self::Dumb => "dumb",
        }
    }
}

impl std::fmt::Display for IndexMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress event for one run of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexProgressEvent {
    Started {
        collection_id: String,
        run_id: u64,
        total: usize,
        mode: IndexMode,
        queued_work_items: usize,
    },
    /// `indexed` never decreases within a run.
    Progress {
        collection_id: String,
        run_id: u64,
        indexed: usize,
        total: usize,
        mode: IndexMode,
        queued_work_items: usize,
    },
    Completed {
        collection_id: String,
        run_id: u64,
        indexed: usize,
        elapsed_ms: u64,
        mode: IndexMode,
        queued_work_items: usize,
    },
    Failed {
        collection_id: String,
        run_id: u64,
        error_message: String,
        mode: IndexMode,
        queued_work_items: usize,
    },
}

impl IndexProgressEvent {
    pub fn collection_id(&self) -> &str {
        match self {
            Self::Started { collection_id, .. }
            | Self::Progress { collection_id, .. }
            | Self::Completed { collection_id, .. }
            | Self::Failed { collection_id, .. } => collection_id,
        }
    }

    pub fn run_id(&self) -> u64 {
        match self {
            Self::Started { run_id, .. }
            | Self::Progress { run_id, .. }
            | Self::Completed { run_id, .. }
            | Self::Failed { run_id, .. } => *run_id,
        }
    }

    pub fn mode(&self) -> IndexMode {
        match self {
            Self::Started { mode, .. }
            | Self::Progress { mode, .. }
            | Self::Completed { mode, .. }
            | Self::Failed { mode, .. } => *mode,
        }
    }

    pub fn queued_work_items(&self) -> usize {
        match self {
            Self::Started {
                queued_work_items, ..
            }
            | Self::Progress {
                queued_work_items, ..
            }
            | Self::Completed {
                queued_work_items, ..
            }
            | Self::Failed {
                queued_work_items, ..
            } => *queued_work_items,
        }
    }

    /// `true` for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}
