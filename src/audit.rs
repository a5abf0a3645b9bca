//! Append-only audit trail.
//!
//! One JSON object per line. Each entry carries a summary and a content
//! fingerprint, never the full snapshot or result, to bound log size and
//! leakage. The file is opened and flushed per write so a process restart
//! cannot corrupt more than the line being written. A failed audit write
//! is logged and swallowed; it must never abort the user-facing
//! operation.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::agents::types::AgentResult;
use crate::agents::AgentKind;
use crate::context::types::ContextSnapshot;

/// Compact description of a result, sized for a log line.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResultSummary {
    pub findings: usize,
    pub suggestions: usize,
    pub code_changes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResultSummary {
    pub fn from_result(result: &AgentResult) -> Self {
        Self {
            findings: result.findings.len(),
            suggestions: result.suggestions.len(),
            code_changes: result.code_changes.len(),
            confidence: result.confidence,
            error: result.error.clone(),
        }
    }
}

/// One audit log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(rename = "type")]
    pub entry_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "agentType")]
    pub agent_kind: AgentKind,
    pub success: bool,
    pub duration_ms: u64,
    /// SHA-256 over the current file path and code window.
    pub context_fingerprint: String,
    pub summary: ResultSummary,
}

impl AuditEntry {
    pub fn execution(
        agent_kind: AgentKind,
        snapshot: &ContextSnapshot,
        result: &AgentResult,
    ) -> Self {
        Self {
            entry_type: "execution".to_string(),
            timestamp: Utc::now(),
            agent_kind,
            success: result.success,
            duration_ms: result.duration_ms,
            context_fingerprint: fingerprint(snapshot),
            summary: ResultSummary::from_result(result),
        }
    }
}

/// SHA-256 fingerprint of the snapshot's identifying content.
pub fn fingerprint(snapshot: &ContextSnapshot) -> String {
    let mut hasher = Sha256::new();
    if let Some(immediate) = &snapshot.immediate {
        hasher.update(immediate.file_path.as_bytes());
        hasher.update(immediate.surrounding_code.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Audit trail bound to one log file.
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Log under the default cache directory (~/.codemate/audit.log).
    pub fn default_location(cache_dir: Option<PathBuf>) -> Result<Self> {
        let base_dir = match cache_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".codemate"),
        };
        std::fs::create_dir_all(&base_dir)
            .with_context(|| format!("Failed to create cache directory: {:?}", base_dir))?;
        Ok(Self::new(base_dir.join("audit.log")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry. Failures are logged and swallowed.
    pub fn append(&self, entry: &AuditEntry) {
        if let Err(e) = self.try_append(entry) {
            warn!("Failed to write audit entry: {}", e);
        }
    }

    fn try_append(&self, entry: &AuditEntry) -> Result<()> {
        let line = serde_json::to_string(entry).context("Failed to serialize audit entry")?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open audit log {}", self.path.display()))?;
        writeln!(file, "{}", line).context("Failed to append audit entry")?;
        file.flush().context("Failed to flush audit log")
    }

    /// Read the last `n` entries (all of them when `n` is 0). Unparsable
    /// lines are skipped.
    pub fn tail(&self, n: usize) -> Result<Vec<AuditEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read audit log {}", self.path.display()))?;
        let entries: Vec<AuditEntry> = content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();
        let skip = if n == 0 || n >= entries.len() {
            0
        } else {
            entries.len() - n
        };
        Ok(entries.into_iter().skip(skip).collect())
    }

    /// Explicit wipe; the only way entries are ever removed.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to clear audit log {}", self.path.display()))?;
        }
        Ok(())
    }
}
