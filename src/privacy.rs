//! Privacy policy engine.
//!
//! Gates every outgoing request and context snapshot before anything is
//! sent to the completion service. Three modes of increasing strictness:
//! `Open` permits everything without scanning, `Balanced` adds content and
//! path rules, `Strict` adds a filename veto on top. Evaluation never
//! fails: when no rule fires, the request is processable.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::debug;

use crate::completion::{CompletionError, CompletionRequest, CompletionService};
use crate::context::types::ContextSnapshot;

/// Privacy mode, ordered by strictness.
///
/// Every restriction active at a given mode is also active at all stricter
/// modes, so blocking is monotone in the mode order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyMode {
    /// Everything is sent as-is. No scanning is performed at all; this is
    /// a deliberate performance trade-off, not a gap.
    Open,
    /// Content patterns and exclusion lists apply.
    #[default]
    Balanced,
    /// Balanced rules plus a filename-based veto.
    Strict,
}

impl PrivacyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyMode::Open => "open",
            PrivacyMode::Balanced => "balanced",
            PrivacyMode::Strict => "strict",
        }
    }

    /// Parse a mode name as it appears in settings or on the CLI.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "open" => Some(PrivacyMode::Open),
            "balanced" => Some(PrivacyMode::Balanced),
            "strict" => Some(PrivacyMode::Strict),
            _ => None,
        }
    }
}

/// Fixed sensitive-content detectors, compiled once per process.
fn sensitive_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // API-key shaped tokens (sk-..., ghp_..., xoxb-..., etc.)
            r"(?i)\b(?:sk|pk|ghp|gho|xox[abprs])[-_][A-Za-z0-9_-]{16,}\b",
            // Key/token assignments
            r#"(?i)\b(?:api[_-]?key|access[_-]?token|auth[_-]?token)\b\s*[:=]\s*['"]?\S+"#,
            // Password/secret/credential assignments
            r#"(?i)\b(?:password|passwd|secret|credential)s?\b\s*[:=]\s*['"]?\S+"#,
            // Email addresses
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            // SSN-shaped digit groups
            r"\b\d{3}-\d{2}-\d{4}\b",
            // Credit-card-shaped digit groups
            r"\b\d{4}[ -]?\d{4}[ -]?\d{4}[ -]?\d{4}\b",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("invalid sensitive-data pattern"))
        .collect()
    })
}

/// Filename substrings vetoed in strict mode.
const STRICT_FILENAME_MARKERS: &[&str] = &["secret", "password", "credential"];

/// Normalize a path for exclusion matching.
fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Privacy guard holding the mode and the current exclusion lists.
///
/// The exclusion lists are mutable at runtime; every evaluation reads the
/// live lists, so a freshly excluded path takes effect on the next call.
/// Already-sent requests are never re-evaluated.
#[derive(Debug, Clone)]
pub struct PrivacyGuard {
    mode: PrivacyMode,
    excluded_files: BTreeSet<String>,
    excluded_dirs: BTreeSet<String>,
}

impl PrivacyGuard {
    pub fn new(
        mode: PrivacyMode,
        excluded_files: BTreeSet<String>,
        excluded_dirs: BTreeSet<String>,
    ) -> Self {
        Self {
            mode,
            excluded_files: excluded_files.iter().map(|p| normalize_path(p)).collect(),
            excluded_dirs: excluded_dirs.iter().map(|p| normalize_path(p)).collect(),
        }
    }

    pub fn mode(&self) -> PrivacyMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PrivacyMode) {
        self.mode = mode;
    }

    pub fn exclude_file(&mut self, path: &str) {
        self.excluded_files.insert(normalize_path(path));
    }

    pub fn unexclude_file(&mut self, path: &str) {
        self.excluded_files.remove(&normalize_path(path));
    }

    pub fn exclude_dir(&mut self, path: &str) {
        self.excluded_dirs
            .insert(normalize_path(path).trim_end_matches('/').to_string());
    }

    pub fn unexclude_dir(&mut self, path: &str) {
        self.excluded_dirs
            .remove(normalize_path(path).trim_end_matches('/'));
    }

    pub fn excluded_files(&self) -> &BTreeSet<String> {
        &self.excluded_files
    }

    pub fn excluded_dirs(&self) -> &BTreeSet<String> {
        &self.excluded_dirs
    }

    /// Whether a free-text request may be sent to the completion service.
    pub fn can_process_request(&self, request: &str) -> bool {
        if self.mode == PrivacyMode::Open {
            return true;
        }
        if contains_sensitive_data(request) {
            debug!("Request blocked: sensitive content pattern matched");
            return false;
        }
        true
    }

    /// Whether a context snapshot may be sent to the completion service.
    pub fn can_process_context(&self, snapshot: &ContextSnapshot) -> bool {
        if self.mode == PrivacyMode::Open {
            return true;
        }

        if let Some(immediate) = &snapshot.immediate {
            let path = normalize_path(&immediate.file_path);

            if self.is_path_excluded(&path) {
                debug!("Context blocked: {} is excluded", path);
                return false;
            }

            if self.mode == PrivacyMode::Strict && filename_is_vetoed(&path) {
                debug!("Context blocked: filename veto on {}", path);
                return false;
            }

            if let Some(selection) = &immediate.selection_text {
                if contains_sensitive_data(selection) {
                    debug!("Context blocked: sensitive content in selection");
                    return false;
                }
            }
            if contains_sensitive_data(&immediate.surrounding_code) {
                debug!("Context blocked: sensitive content near cursor");
                return false;
            }
        }

        true
    }

    /// Exact-file match or nesting under an excluded directory prefix.
    ///
    /// Exclusion entries are usually workspace-relative while snapshot
    /// paths may be absolute, so entries also match as path suffixes.
    fn is_path_excluded(&self, path: &str) -> bool {
        if self
            .excluded_files
            .iter()
            .any(|file| path == file || path.ends_with(&format!("/{}", file)))
        {
            return true;
        }
        self.excluded_dirs.iter().any(|dir| {
            path == dir
                || path.starts_with(&format!("{}/", dir))
                || path.contains(&format!("/{}/", dir))
                || {
                    // Excluded dirs may be given as bare names matching any segment.
                    !dir.contains('/') && path.split('/').any(|seg| seg == dir.as_str())
                }
        })
    }
}

/// Whether any fixed sensitive-content pattern matches.
pub fn contains_sensitive_data(text: &str) -> bool {
    sensitive_patterns().iter().any(|p| p.is_match(text))
}

/// Strict-mode filename veto: marker substring or a `.env` suffix.
fn filename_is_vetoed(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path).to_lowercase();
    if name == ".env" || name.ends_with(".env") || name.starts_with(".env") {
        return true;
    }
    STRICT_FILENAME_MARKERS.iter().any(|m| name.contains(m))
}

/// Completion service wrapper that screens every outgoing prompt.
///
/// The wire client never sees a prompt the policy rejects. The guard is
/// shared with the orchestrator so mid-session policy changes take effect
/// on the next call.
pub struct GuardedCompletion {
    inner: Arc<dyn CompletionService>,
    guard: Arc<Mutex<PrivacyGuard>>,
}

impl GuardedCompletion {
    pub fn new(inner: Arc<dyn CompletionService>, guard: Arc<Mutex<PrivacyGuard>>) -> Self {
        Self { inner, guard }
    }
}

#[async_trait]
impl CompletionService for GuardedCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let allowed = {
            let guard = self.guard.lock().expect("privacy guard lock poisoned");
            guard.can_process_request(&request.prompt)
        };
        if !allowed {
            debug!("prompt blocked by privacy policy");
            return Err(CompletionError::PrivacyBlocked);
        }
        self.inner.complete(request).await
    }
}
