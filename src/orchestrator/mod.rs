//! Agent orchestration.
//!
//! The orchestrator owns the registry, the context engine, the privacy
//! guard, and the execution history. Every `execute_agent` call runs the
//! same sequence: cancellation check, privacy gate, context validation,
//! dispatch, and exactly one history/audit record regardless of outcome.

pub mod suggest;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agents::types::{AgentResult, FailureReason};
use crate::agents::{AgentKind, AgentRegistry, OutputSink};
use crate::audit::{AuditEntry, AuditLog};
use crate::context::types::ContextSnapshot;
use crate::context::ContextEngine;
use crate::domain::DocumentView;
use crate::privacy::PrivacyGuard;

pub use suggest::AgentSuggestion;

/// One entry of the in-memory execution history.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub agent: AgentKind,
    pub snapshot: ContextSnapshot,
    pub result: AgentResult,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate statistics derived from history on demand.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ExecutionStats {
    pub total_executions: usize,
    pub successes: usize,
    pub failures: usize,
    /// Percentage in [0, 100].
    pub success_rate: f64,
    pub average_duration_ms: f64,
    pub per_agent: BTreeMap<AgentKind, usize>,
}

/// Selects, dispatches, and records agent executions.
pub struct Orchestrator {
    registry: AgentRegistry,
    engine: ContextEngine,
    privacy: Arc<Mutex<PrivacyGuard>>,
    audit: AuditLog,
    history: Mutex<Vec<ExecutionRecord>>,
}

impl Orchestrator {
    /// The privacy guard is shared: the completion-side prompt screen
    /// holds the same handle, so `update_privacy` reaches both gates.
    pub fn new(
        registry: AgentRegistry,
        engine: ContextEngine,
        privacy: Arc<Mutex<PrivacyGuard>>,
        audit: AuditLog,
    ) -> Self {
        Self {
            registry,
            engine,
            privacy,
            audit,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Build a full snapshot for the document (cache permitting).
    pub async fn snapshot(&self, document: &DocumentView) -> ContextSnapshot {
        self.engine.build_full(document).await
    }

    /// Fast snapshot for latency-sensitive paths.
    pub fn snapshot_fast(&self, document: &DocumentView) -> ContextSnapshot {
        self.engine.build_fast(document)
    }

    /// Mutate the privacy guard (config push from the editor).
    pub fn update_privacy(&self, mutate: impl FnOnce(&mut PrivacyGuard)) {
        let mut guard = self.privacy.lock().expect("privacy guard poisoned");
        mutate(&mut guard);
    }

    /// Execute one agent against a snapshot.
    ///
    /// Exactly one execution record is appended per call, whatever the
    /// outcome.
    pub async fn execute_agent(
        &self,
        kind: AgentKind,
        context: &ContextSnapshot,
        cancel: &CancellationToken,
        sink: &dyn OutputSink,
    ) -> AgentResult {
        debug!("Executing agent {}", kind);
        let started = Utc::now();
        let result = self.dispatch(kind, context, cancel, sink).await;
        self.record(kind, context, &result, started);
        result
    }

    async fn dispatch(
        &self,
        kind: AgentKind,
        context: &ContextSnapshot,
        cancel: &CancellationToken,
        sink: &dyn OutputSink,
    ) -> AgentResult {
        let Some(agent) = self.registry.get(kind) else {
            // Internal fault: the registry should cover every kind.
            warn!("No agent registered for {}", kind);
            return AgentResult::failure_with_reason(
                kind,
                0,
                FailureReason::Internal,
                format!("No agent registered for '{}'", kind),
            );
        };

        if cancel.is_cancelled() {
            debug!("{} cancelled before dispatch", kind);
            return AgentResult::cancelled(kind);
        }

        let allowed = {
            let guard = self.privacy.lock().expect("privacy guard poisoned");
            guard.can_process_context(context)
        };
        if !allowed {
            info!("{} blocked by privacy policy", kind);
            return AgentResult::failure_with_reason(
                kind,
                0,
                FailureReason::PrivacyBlocked,
                "The privacy policy does not allow sending this context externally",
            );
        }

        let validation = agent.validate_context(context);
        if !validation.valid {
            let reason = validation
                .reason
                .unwrap_or_else(|| "Context validation failed".to_string());
            debug!("{} validation failed: {}", kind, reason);
            return AgentResult::failure_with_reason(kind, 0, FailureReason::Validation, reason);
        }

        agent.execute(context, cancel, sink).await
    }

    fn record(
        &self,
        kind: AgentKind,
        context: &ContextSnapshot,
        result: &AgentResult,
        timestamp: DateTime<Utc>,
    ) {
        self.audit.append(&AuditEntry::execution(kind, context, result));

        let record = ExecutionRecord {
            agent: kind,
            snapshot: context.clone(),
            result: result.clone(),
            timestamp,
            duration_ms: result.duration_ms,
            success: result.success,
            error: result.error.clone(),
        };
        self.history
            .lock()
            .expect("history poisoned")
            .push(record);
    }

    /// Run agents in order, propagating context updates forward. Stops at
    /// the first failure or cancellation; the partial result list is the
    /// defined outcome, not an error.
    pub async fn execute_chain(
        &self,
        kinds: &[AgentKind],
        context: &ContextSnapshot,
        cancel: &CancellationToken,
        sink: &dyn OutputSink,
    ) -> Vec<AgentResult> {
        let mut results = Vec::new();
        let mut current = context.clone();

        for kind in kinds {
            let result = self.execute_agent(*kind, &current, cancel, sink).await;
            let stop = !result.success;
            if result.success && !result.context_updates.is_empty() {
                current.notes.extend(result.context_updates.clone());
            }
            results.push(result);
            if stop {
                break;
            }
        }

        results
    }

    /// All agents ranked by suitability for the context.
    pub fn all_suggestions(&self, context: &ContextSnapshot) -> Vec<AgentSuggestion> {
        suggest::rank(&self.registry.kinds(), context)
    }

    /// The most suitable agent, if any is registered.
    pub fn suggest_agent(&self, context: &ContextSnapshot) -> Option<AgentSuggestion> {
        self.all_suggestions(context).into_iter().next()
    }

    /// Recompute aggregate statistics from history.
    pub fn execution_stats(&self) -> ExecutionStats {
        let history = self.history.lock().expect("history poisoned");
        let total = history.len();
        if total == 0 {
            return ExecutionStats::default();
        }

        let successes = history.iter().filter(|r| r.success).count();
        let total_duration: u64 = history.iter().map(|r| r.duration_ms).sum();
        let mut per_agent = BTreeMap::new();
        for record in history.iter() {
            *per_agent.entry(record.agent).or_insert(0) += 1;
        }

        ExecutionStats {
            total_executions: total,
            successes,
            failures: total - successes,
            success_rate: successes as f64 / total as f64 * 100.0,
            average_duration_ms: total_duration as f64 / total as f64,
            per_agent,
        }
    }

    /// History snapshot in completion order.
    pub fn history(&self) -> Vec<ExecutionRecord> {
        self.history.lock().expect("history poisoned").clone()
    }

    /// Explicit wipe of the in-memory history.
    pub fn clear_history(&self) {
        self.history.lock().expect("history poisoned").clear();
    }
}
