//! Context engine: assembles snapshots from the individual layers.
//!
//! `build_full` produces all four layers; `build_fast` is the
//! latency-sensitive path (on-keystroke analysis) that only extracts the
//! immediate layer and reuses whatever project layer is already cached.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::context::cache::SnapshotCache;
use crate::context::history::{find_repo_root, GitHistoryProvider};
use crate::context::types::{ContextSnapshot, ExternalContext};
use crate::context::{immediate, project};
use crate::domain::DocumentView;

/// Builds and caches context snapshots.
pub struct ContextEngine {
    cache: SnapshotCache,
    git: Arc<dyn GitHistoryProvider>,
    max_commits: usize,
}

impl ContextEngine {
    pub fn new(git: Arc<dyn GitHistoryProvider>, max_commits: usize) -> Self {
        Self {
            cache: SnapshotCache::new(),
            git,
            max_commits,
        }
    }

    /// Full snapshot: immediate + project + history + external layers.
    ///
    /// Served from cache when the document identity is fresh; a rebuild
    /// stores the result last-writer-wins.
    pub async fn build_full(&self, document: &DocumentView) -> ContextSnapshot {
        let key = document.identity();
        if let Some(snapshot) = self.cache.get(&key) {
            debug!("Context cache hit for {}", key);
            return snapshot;
        }

        let mut snapshot = self.immediate_only(document);

        let root = self.workspace_root(document);
        if let Some(root) = &root {
            snapshot.project = Some(project::enumerate(root));
            snapshot.signals.has_ci_config = Some(project::has_ci_config(root));
            snapshot.signals.has_tests = snapshot
                .project
                .as_ref()
                .map(|p| !p.test_files.is_empty());
        }

        if let Some(repo_root) = root.as_deref().and_then(find_repo_root) {
            snapshot.history = self.git.gather(&repo_root, self.max_commits).await;
            snapshot.signals.has_uncommitted_changes = snapshot
                .history
                .as_ref()
                .map(|h| !h.uncommitted_files.is_empty());
        }

        // External layer stays a placeholder until an advisory service
        // populates it.
        snapshot.external = Some(ExternalContext::default());

        self.cache.prune();
        self.cache.put(&key, snapshot.clone());
        snapshot
    }

    /// Fast snapshot: immediate layer only, plus a cached project layer
    /// from a previous full build when one is still fresh.
    pub fn build_fast(&self, document: &DocumentView) -> ContextSnapshot {
        let mut snapshot = self.immediate_only(document);
        if let Some(cached) = self.cache.get(&document.identity()) {
            snapshot.project = cached.project;
        }
        snapshot
    }

    /// Explicitly drop a cached snapshot so the next request rebuilds.
    pub fn refresh(&self, document: &DocumentView) {
        self.cache.invalidate(&document.identity());
    }

    fn immediate_only(&self, document: &DocumentView) -> ContextSnapshot {
        ContextSnapshot {
            immediate: Some(immediate::extract(document)),
            signals: immediate::derive_signals(document),
            ..Default::default()
        }
    }

    fn workspace_root(&self, document: &DocumentView) -> Option<PathBuf> {
        if let Some(root) = &document.workspace_root {
            return Some(root.clone());
        }
        let path = PathBuf::from(document.uri.trim_start_matches("file://"));
        path.parent().map(Path::to_path_buf)
    }
}
