//! Workset Reduction
//!
//! Folds a burst of [`IndexChange`] values into a [`ReducedWorkset`]: the
//! smallest conflict-free plan that brings the index to the state the burst
//! describes. Reduction is pure and total; the same input always yields the
//! same plan.
//!
//! Rules, applied in input order:
//!
//! - `ForceRebuild` clears everything accumulated so far and absorbs the rest
//!   of the batch (later changes are ignored, not replayed).
//! - `UpsertPath`/`RemovePath` are last-writer-wins per path.
//! - `RemovePrefix` drops pending single-path work under the prefix.
//! - Renames remap pending paths and compose with earlier renames
//!   (`A→B, B→C` becomes `A→C`; `A→B, B→A` disappears).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::change::{IndexChange, PathRename, PrefixRename};

/// Deduplicated execution plan derived from one batch of changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReducedWorkset {
    pub upsert_paths: BTreeSet<String>,
    pub remove_paths: BTreeSet<String>,
    pub remove_prefixes: BTreeSet<String>,
    pub rename_paths: Vec<PathRename>,
    pub rename_prefixes: Vec<PrefixRename>,
    pub force_scan: bool,
    pub force_rebuild: bool,
}

impl ReducedWorkset {
    /// Reduce a batch of changes in order.
    pub fn from_changes<'a, I>(changes: I) -> Self
    where
        I: IntoIterator<Item = &'a IndexChange>,
    {
        let mut workset = Self::default();
        for change in changes {
            workset.apply(change);
        }
        workset
    }

    /// Fold one more change into the plan.
    pub fn apply(&mut self, change: &IndexChange) {
        // Rebuild absorbs everything after it in the same batch.
        if self.force_rebuild {
            return;
        }

        match change {
            IndexChange::ForceRebuild => {
                *self = Self {
                    force_rebuild: true,
                    ..Self::default()
                };
            }
            IndexChange::ForceScan => {
                self.force_scan = true;
            }
            IndexChange::UpsertPath { path } => {
                self.remove_paths.remove(path);
                self.upsert_paths.insert(path.clone());
            }
            IndexChange::RemovePath { path } => {
                self.upsert_paths.remove(path);
                self.remove_paths.insert(path.clone());
            }
            IndexChange::RemovePrefix { prefix } => {
                self.upsert_paths.retain(|p| !p.starts_with(prefix.as_str()));
                self.remove_paths.retain(|p| !p.starts_with(prefix.as_str()));
                self.remove_prefixes.insert(prefix.clone());
            }
            IndexChange::RenamePath { old_path, new_path } => {
                self.remap_paths(|p| (p == old_path.as_str()).then(|| new_path.clone()));
                compose_path_rename(&mut self.rename_paths, old_path, new_path);
            }
            IndexChange::RenamePrefix {
                old_prefix,
                new_prefix,
            } => {
                let remap = |p: &str| {
                    p.strip_prefix(old_prefix.as_str())
                        .map(|rest| format!("{new_prefix}{rest}"))
                };
                self.remap_paths(remap);
                self.remove_prefixes = std::mem::take(&mut self.remove_prefixes)
                    .into_iter()
                    .map(|p| remap(&p).unwrap_or(p))
                    .collect();
                compose_prefix_rename(&mut self.rename_prefixes, old_prefix, new_prefix);
            }
        }
    }

    /// Move pending upserts/removes through a rename.
    ///
    /// A moved entry takes over its destination, so `upsert_paths` and
    /// `remove_paths` stay disjoint.
    fn remap_paths<F>(&mut self, remap: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut moved_upserts = Vec::new();
        self.upsert_paths.retain(|p| match remap(p) {
            Some(target) => {
                moved_upserts.push(target);
                false
            }
            None => true,
        });

        let mut moved_removes = Vec::new();
        self.remove_paths.retain(|p| match remap(p) {
            Some(target) => {
                moved_removes.push(target);
                false
            }
            None => true,
        });

        for path in moved_upserts {
            self.remove_paths.remove(&path);
            self.upsert_paths.insert(path);
        }
        for path in moved_removes {
            self.upsert_paths.remove(&path);
            self.remove_paths.insert(path);
        }
    }

    /// `true` when executing this plan would not touch the executor.
    pub fn is_empty(&self) -> bool {
        !self.force_rebuild && !self.force_scan && count_index_workset_items(self) == 0
    }

    /// `true` for full-strategy runs (scan or rebuild).
    pub fn is_full_pass(&self) -> bool {
        self.force_rebuild || self.force_scan
    }
}

fn compose_path_rename(renames: &mut Vec<PathRename>, old_path: &str, new_path: &str) {
    if let Some(pos) = renames.iter().position(|r| r.new_path == old_path) {
        if renames[pos].old_path == new_path {
            renames.remove(pos);
        } else {
            renames[pos].new_path = new_path.to_string();
        }
        return;
    }
    if old_path != new_path {
        renames.push(PathRename::new(old_path, new_path));
    }
}

fn compose_prefix_rename(renames: &mut Vec<PrefixRename>, old_prefix: &str, new_prefix: &str) {
    if let Some(pos) = renames.iter().position(|r| r.new_prefix == old_prefix) {
        if renames[pos].old_prefix == new_prefix {
            renames.remove(pos);
        } else {
            renames[pos].new_prefix = new_prefix.to_string();
        }
        return;
    }
    if old_prefix != new_prefix {
        renames.push(PrefixRename::new(old_prefix, new_prefix));
    }
}

/// Reduce a batch of raw changes into one execution plan.
pub fn reduce(changes: &[IndexChange]) -> ReducedWorkset {
    ReducedWorkset::from_changes(changes)
}

/// Cost estimate used for progress reporting only.
///
/// A rebuild always counts as one item regardless of anything else.
pub fn count_index_workset_items(workset: &ReducedWorkset) -> usize {
    if workset.force_rebuild {
        return 1;
    }
    workset.rename_paths.len()
        + workset.rename_prefixes.len()
        + workset.remove_prefixes.len()
        + workset.remove_paths.len()
        + workset.upsert_paths.len()
        + usize::from(workset.force_scan)
}
