//! Shared execution skeleton for all agents.
//!
//! Owns the busy-flag discipline, the cancellation check before the
//! external call, the completion-service error mapping, and the status
//! counter update. Individual agents supply only the prompt and the
//! synthesis step.

use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::agents::status::{AgentStatus, StatusCell};
use crate::agents::types::{AgentResult, FailureReason};
use crate::agents::{AgentKind, OutputSink};
use crate::completion::{CompletionError, CompletionRequest, CompletionService};

/// Per-agent plumbing shared by every concrete agent.
pub struct AgentCore {
    kind: AgentKind,
    client: Arc<dyn CompletionService>,
    status: StatusCell,
}

impl AgentCore {
    pub fn new(kind: AgentKind, client: Arc<dyn CompletionService>) -> Self {
        Self {
            kind,
            client,
            status: StatusCell::new(),
        }
    }

    pub fn status(&self) -> AgentStatus {
        self.status.snapshot()
    }

    /// Run one execution: cancellation check, completion call, synthesis.
    ///
    /// `synthesize` receives the raw reply and the elapsed milliseconds and
    /// must produce the final result. Errors never escape; they become
    /// failed results with the counters updated either way.
    pub async fn run<F>(
        &self,
        prompt: String,
        cancel: &CancellationToken,
        sink: &dyn OutputSink,
        synthesize: F,
    ) -> AgentResult
    where
        F: FnOnce(&str, u64) -> AgentResult,
    {
        let _busy = self.status.begin();
        let started = Instant::now();

        // Cooperative cancellation: checked before the external call; an
        // in-flight call is not interrupted.
        if cancel.is_cancelled() {
            let result = AgentResult::cancelled(self.kind);
            self.status.record(0, false);
            return result;
        }

        debug!("{} prompt ({} bytes)", self.kind, prompt.len());
        let reply = self.client.complete(CompletionRequest::new(prompt)).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let result = match reply {
            Ok(text) => {
                sink.append(&text);
                synthesize(&text, duration_ms)
            }
            Err(err) => {
                warn!("{} completion failed: {}", self.kind, err);
                let reason = match err {
                    CompletionError::PrivacyBlocked => FailureReason::PrivacyBlocked,
                    _ => FailureReason::Service,
                };
                let detail = if err.is_transient() {
                    format!("Service temporarily unavailable, please retry: {}", err)
                } else {
                    err.to_string()
                };
                AgentResult::failure_with_reason(self.kind, duration_ms, reason, detail)
            }
        };

        self.status.record(duration_ms, result.success);
        result
    }
}
