//! Agent result data model.
//!
//! An [`AgentResult`] is produced once per invocation and never mutated
//! afterwards. All structured content (findings, code changes, doc
//! outputs, alternatives) is optional; a reply the parser could not
//! structure still yields a successful result carrying the raw message.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{Position, Range};

/// Severity of an analysis finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// One structured finding extracted from a model reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub category: String,
    pub severity: Severity,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
}

/// Kind of edit an agent proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeKind {
    Replace,
    Insert,
    Delete,
    CreateFile,
    RenameFile,
}

/// A proposed edit. The core only describes intended edits; applying
/// them is the editor collaborator's responsibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChange {
    pub kind: ChangeKind,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    pub new_text: String,
    /// Heuristic confidence in [0, 1].
    pub confidence: f64,
}

/// Documentation artifact produced by the documentation agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocOutput {
    pub doc_type: String,
    pub path: String,
    pub content: String,
    pub format: String,
}

/// Implementation-difficulty tier for an alternative approach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityTier {
    Low,
    Medium,
    High,
}

/// One alternative approach with trade-offs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alternative {
    pub title: String,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub complexity: ComplexityTier,
    pub time_estimate: Option<String>,
}

/// Why an invocation failed, so callers can explain what happened
/// instead of showing a generic error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    /// Context failed the agent's precondition; never retried.
    Validation,
    /// Vetoed by the privacy policy.
    PrivacyBlocked,
    /// The completion service failed after retries.
    Service,
    /// Unexpected fault inside orchestration.
    Internal,
    Cancelled,
}

/// Outcome of one agent invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub success: bool,
    pub agent: super::AgentKind,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code_changes: Vec<CodeChange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documentation: Vec<DocOutput>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<Alternative>,
    /// Heuristic confidence in [0.3, 0.95]; a ranking signal, not a
    /// calibrated probability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_steps: Vec<String>,
    /// Propagated into the next agent's context in a chain.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context_updates: BTreeMap<String, String>,
    #[serde(default)]
    pub cancelled: bool,
}

impl AgentResult {
    pub fn success(agent: super::AgentKind, duration_ms: u64) -> Self {
        Self {
            success: true,
            agent,
            duration_ms,
            error: None,
            failure_reason: None,
            message: None,
            suggestions: Vec::new(),
            code_changes: Vec::new(),
            documentation: Vec::new(),
            findings: Vec::new(),
            alternatives: Vec::new(),
            confidence: None,
            reasoning: None,
            next_steps: Vec::new(),
            context_updates: BTreeMap::new(),
            cancelled: false,
        }
    }

    pub fn failure(agent: super::AgentKind, duration_ms: u64, error: impl Into<String>) -> Self {
        let mut result = Self::success(agent, duration_ms);
        result.success = false;
        result.error = Some(error.into());
        result
    }

    pub fn failure_with_reason(
        agent: super::AgentKind,
        duration_ms: u64,
        reason: FailureReason,
        error: impl Into<String>,
    ) -> Self {
        let mut result = Self::failure(agent, duration_ms, error);
        result.failure_reason = Some(reason);
        result
    }

    pub fn cancelled(agent: super::AgentKind) -> Self {
        let mut result =
            Self::failure_with_reason(agent, 0, FailureReason::Cancelled, "Execution cancelled");
        result.cancelled = true;
        result
    }
}
