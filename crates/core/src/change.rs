//! Raw Index Changes
//!
//! One `IndexChange` describes a single mutation notification coming from a
//! file watcher or a service call. Changes are cheap values; the reducer in
//! [`crate::workset`] folds a burst of them into one execution plan.

use serde::{Deserialize, Serialize};

/// A single-document move.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathRename {
    pub old_path: String,
    pub new_path: String,
}

impl PathRename {
    pub fn new(old_path: impl Into<String>, new_path: impl Into<String>) -> Self {
        Self {
            old_path: old_path.into(),
            new_path: new_path.into(),
        }
    }
}

/// A whole-subtree move.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrefixRename {
    pub old_prefix: String,
    pub new_prefix: String,
}

impl PrefixRename {
    pub fn new(old_prefix: impl Into<String>, new_prefix: impl Into<String>) -> Self {
        Self {
            old_prefix: old_prefix.into(),
            new_prefix: new_prefix.into(),
        }
    }
}

/// Raw mutation notification for one collection.
///
/// Paths and prefixes are vault-relative and forward-slash separated. A
/// prefix covers every path that starts with it literally, so folder
/// prefixes should end with `/` (the constructors below take care of that).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndexChange {
    /// A single document was created or modified
    UpsertPath { path: String },
    /// A single document was deleted
    RemovePath { path: String },
    /// An entire subtree was deleted
    RemovePrefix { prefix: String },
    /// A single document moved
    RenamePath { old_path: String, new_path: String },
    /// An entire subtree moved
    RenamePrefix {
        old_prefix: String,
        new_prefix: String,
    },
    /// Reconcile the index against the document manifest
    ForceScan,
    /// Discard all index state and rebuild from scratch
    ForceRebuild,
}

impl IndexChange {
    /// Document created or modified.
    pub fn upsert(path: impl AsRef<str>) -> Self {
        Self::UpsertPath {
            path: normalize_vault_path(path.as_ref()),
        }
    }

    /// Document deleted.
    pub fn remove(path: impl AsRef<str>) -> Self {
        Self::RemovePath {
            path: normalize_vault_path(path.as_ref()),
        }
    }

    /// Folder deleted.
    pub fn remove_prefix(prefix: impl AsRef<str>) -> Self {
        Self::RemovePrefix {
            prefix: normalize_vault_prefix(prefix.as_ref()),
        }
    }

    /// Document moved.
    pub fn rename(old_path: impl AsRef<str>, new_path: impl AsRef<str>) -> Self {
        Self::RenamePath {
            old_path: normalize_vault_path(old_path.as_ref()),
            new_path: normalize_vault_path(new_path.as_ref()),
        }
    }

    /// Folder moved.
    pub fn rename_prefix(old_prefix: impl AsRef<str>, new_prefix: impl AsRef<str>) -> Self {
        Self::RenamePrefix {
            old_prefix: normalize_vault_prefix(old_prefix.as_ref()),
            new_prefix: normalize_vault_prefix(new_prefix.as_ref()),
        }
    }

    pub fn scan() -> Self {
        Self::ForceScan
    }

    pub fn rebuild() -> Self {
        Self::ForceRebuild
    }

    /// Stable snake_case label, matching the serde tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpsertPath { .. } => "upsert_path",
            Self::RemovePath { .. } => "remove_path",
            Self::RemovePrefix { .. } => "remove_prefix",
            Self::RenamePath { .. } => "rename_path",
            Self::RenamePrefix { .. } => "rename_prefix",
            Self::ForceScan => "force_scan",
            Self::ForceRebuild => "force_rebuild",
        }
    }

    pub fn is_force_rebuild(&self) -> bool {
        matches!(self, Self::ForceRebuild)
    }
}

/// Normalize a raw path into vault-relative, forward-slash form.
///
/// Backslashes become `/`, leading `./` and `/` segments are stripped and
/// repeated slashes collapse into one. A trailing slash is kept.
pub fn normalize_vault_path(raw: &str) -> String {
    let unified = raw.replace('\\', "/");
    let mut rest = unified.as_str();
    loop {
        if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        } else {
            break;
        }
    }

    let mut out = String::with_capacity(rest.len());
    let mut prev_slash = false;
    for ch in rest.chars() {
        if ch == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(ch);
    }
    out
}

/// Normalize a folder prefix; non-empty prefixes always end with `/` so that
/// `docs/` never matches `docs-archive/x.md`.
pub fn normalize_vault_prefix(raw: &str) -> String {
    let mut prefix = normalize_vault_path(raw);
    if !prefix.is_empty() && !prefix.ends_with('/') {
        prefix.push('/');
    }
    prefix
}
