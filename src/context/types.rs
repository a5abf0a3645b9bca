//! Context snapshot data model.
//!
//! Every layer and nearly every field is optional: absence always means
//! "unknown", never "false". A snapshot is assembled once per analysis
//! request and is not mutated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use crate::domain::{Position, Range};

/// Layered snapshot of what the developer is looking at and why it matters.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContextSnapshot {
    pub immediate: Option<ImmediateContext>,
    pub project: Option<ProjectContext>,
    pub history: Option<HistoryContext>,
    pub external: Option<ExternalContext>,
    #[serde(default)]
    pub signals: Signals,
    /// Free-form updates propagated between agents in a chain.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub notes: BTreeMap<String, String>,
}

/// What is directly under the cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImmediateContext {
    pub file_path: String,
    pub language_id: Option<String>,
    /// Best-effort enclosing function/class name from a nearby keyword
    /// scan, not a parse. May be wrong in nested or multi-line signatures.
    pub enclosing_symbol: Option<String>,
    pub cursor: Position,
    pub selection_text: Option<String>,
    pub selection_range: Option<Range>,
    /// Fixed window of lines around the cursor.
    pub surrounding_code: String,
}

/// Kind of a file found during project enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Source,
    Test,
    Config,
    Doc,
    Other,
}

/// Metadata for one enumerated file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMeta {
    /// Relative path with forward-slash separators.
    pub path: String,
    pub size: u64,
    pub kind: FileKind,
    /// Modification time in milliseconds since epoch.
    pub mtime_ms: u64,
}

/// Dependency maps parsed from the project manifest.
///
/// A malformed manifest yields empty maps rather than an error.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DependencyManifest {
    pub production: BTreeMap<String, String>,
    pub development: BTreeMap<String, String>,
    /// Peer dependencies; only package.json manifests have these.
    pub peer: BTreeMap<String, String>,
}

/// What the surrounding workspace looks like.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProjectContext {
    pub root: Option<String>,
    pub directories: Vec<String>,
    pub files: Vec<FileMeta>,
    pub entry_points: Vec<String>,
    pub test_files: Vec<String>,
    pub dependencies: DependencyManifest,
    pub config_files: Vec<String>,
    /// Heuristic labels from folder-name matching, e.g. "mvc".
    pub architecture_labels: Vec<String>,
}

/// One recent commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    pub message: String,
    pub author: String,
    pub date: DateTime<Utc>,
}

/// Version-control state at snapshot time.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HistoryContext {
    pub branch: Option<String>,
    pub recent_commits: Vec<CommitInfo>,
    pub uncommitted_files: Vec<String>,
}

/// Advisory/version metadata from outside services. Placeholders unless an
/// external collaborator populates them.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExternalContext {
    pub advisories: Vec<String>,
    pub library_versions: BTreeMap<String, String>,
}

/// Derived boolean/threshold signals used for agent suggestion scoring.
///
/// `None` means the signal was not evaluated, which scoring treats as
/// "no evidence", not as "false".
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Signals {
    pub has_errors: Option<bool>,
    pub has_warnings: Option<bool>,
    pub missing_docs: Option<bool>,
    pub is_config_file: Option<bool>,
    pub is_architectural_file: Option<bool>,
    /// Keyword-count complexity estimate, base 1.
    pub complexity: Option<u32>,
    pub has_uncommitted_changes: Option<bool>,
    pub has_ci_config: Option<bool>,
    pub has_tests: Option<bool>,
}

impl ContextSnapshot {
    /// Current file path, if an immediate layer is present.
    pub fn current_file(&self) -> Option<&str> {
        self.immediate.as_ref().map(|i| i.file_path.as_str())
    }

    /// Code window around the cursor, if present and non-empty.
    pub fn surrounding_code(&self) -> Option<&str> {
        self.immediate
            .as_ref()
            .map(|i| i.surrounding_code.as_str())
            .filter(|s| !s.trim().is_empty())
    }
}
