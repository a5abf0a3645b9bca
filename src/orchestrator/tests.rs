//! Tests for the orchestrator.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::agents::tests::{code_context, FakeCompletion};
use crate::agents::types::FailureReason;
use crate::agents::{AgentKind, AgentRegistry, NullSink};
use crate::audit::AuditLog;
use crate::completion::CompletionError;
use crate::context::history::StaticHistory;
use crate::context::types::ContextSnapshot;
use crate::context::ContextEngine;
use crate::orchestrator::Orchestrator;
use crate::privacy::{PrivacyGuard, PrivacyMode};

struct Harness {
    orchestrator: Orchestrator,
    client: Arc<FakeCompletion>,
    _dir: TempDir,
}

fn harness_with(client: Arc<FakeCompletion>, privacy: PrivacyGuard) -> Harness {
    let dir = TempDir::new().unwrap();
    let audit = AuditLog::new(dir.path().join("audit.jsonl"));
    let engine = ContextEngine::new(Arc::new(StaticHistory(None)), 10);
    let registry = AgentRegistry::standard(client.clone());
    Harness {
        orchestrator: Orchestrator::new(registry, engine, Arc::new(Mutex::new(privacy)), audit),
        client,
        _dir: dir,
    }
}

fn harness(client: Arc<FakeCompletion>) -> Harness {
    harness_with(
        client,
        PrivacyGuard::new(PrivacyMode::Open, BTreeSet::new(), BTreeSet::new()),
    )
}

fn structured_reply() -> &'static str {
    "Issue: unchecked index\nFix: bounds check before indexing\n"
}

#[tokio::test]
async fn test_execute_records_success() {
    let h = harness(FakeCompletion::replying(structured_reply()));
    let context = code_context("src/lib.rs", "fn f() { v[0] }");

    let result = h
        .orchestrator
        .execute_agent(
            AgentKind::BugFix,
            &context,
            &CancellationToken::new(),
            &NullSink,
        )
        .await;

    assert!(result.success);
    assert_eq!(h.client.calls(), 1);

    let history = h.orchestrator.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].agent, AgentKind::BugFix);
    assert!(history[0].success);
    assert!(history[0].error.is_none());
}

#[tokio::test]
async fn test_validation_failure_still_recorded_once() {
    let h = harness(FakeCompletion::replying("never sent"));

    let result = h
        .orchestrator
        .execute_agent(
            AgentKind::BugFix,
            &ContextSnapshot::default(),
            &CancellationToken::new(),
            &NullSink,
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.failure_reason, Some(FailureReason::Validation));
    // The service is never contacted for invalid context.
    assert_eq!(h.client.calls(), 0);
    assert_eq!(h.orchestrator.history().len(), 1);
}

#[tokio::test]
async fn test_privacy_block_has_distinct_reason() {
    let mut guard = PrivacyGuard::new(PrivacyMode::Balanced, BTreeSet::new(), BTreeSet::new());
    guard.exclude_file("src/secret.rs");
    let h = harness_with(FakeCompletion::replying("never sent"), guard);
    let context = code_context("src/secret.rs", "fn f() {}");

    let result = h
        .orchestrator
        .execute_agent(
            AgentKind::BugFix,
            &context,
            &CancellationToken::new(),
            &NullSink,
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.failure_reason, Some(FailureReason::PrivacyBlocked));
    assert_ne!(result.failure_reason, Some(FailureReason::Validation));
    assert_eq!(h.client.calls(), 0);
    assert_eq!(h.orchestrator.history().len(), 1);
}

#[tokio::test]
async fn test_privacy_exclusion_takes_effect_mid_session() {
    let h = harness_with(
        FakeCompletion::replying(structured_reply()),
        PrivacyGuard::new(PrivacyMode::Balanced, BTreeSet::new(), BTreeSet::new()),
    );
    let context = code_context("src/lib.rs", "fn f() { v[0] }");
    let cancel = CancellationToken::new();

    let first = h
        .orchestrator
        .execute_agent(AgentKind::BugFix, &context, &cancel, &NullSink)
        .await;
    assert!(first.success);

    h.orchestrator
        .update_privacy(|guard| guard.exclude_file("src/lib.rs"));

    let second = h
        .orchestrator
        .execute_agent(AgentKind::BugFix, &context, &cancel, &NullSink)
        .await;
    assert_eq!(second.failure_reason, Some(FailureReason::PrivacyBlocked));
    assert_eq!(h.client.calls(), 1);
}

#[tokio::test]
async fn test_missing_agent_is_internal_failure() {
    let dir = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(
        AgentRegistry::new(),
        ContextEngine::new(Arc::new(StaticHistory(None)), 10),
        Arc::new(Mutex::new(PrivacyGuard::new(
            PrivacyMode::Open,
            BTreeSet::new(),
            BTreeSet::new(),
        ))),
        AuditLog::new(dir.path().join("audit.jsonl")),
    );

    let result = orchestrator
        .execute_agent(
            AgentKind::BugFix,
            &code_context("src/lib.rs", "fn f() {}"),
            &CancellationToken::new(),
            &NullSink,
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.failure_reason, Some(FailureReason::Internal));
    assert_eq!(orchestrator.history().len(), 1);
}

#[tokio::test]
async fn test_chain_stops_at_first_failure() {
    let h = harness(FakeCompletion::failing(|| CompletionError::Server {
        status: 500,
        body: "boom".to_string(),
    }));
    let context = code_context("src/lib.rs", "fn f() { v[0] }");

    let results = h
        .orchestrator
        .execute_chain(
            &[AgentKind::BugFix, AgentKind::CodeReview],
            &context,
            &CancellationToken::new(),
            &NullSink,
        )
        .await;

    // The second agent never runs, so the service saw a single call.
    assert_eq!(results.len(), 1);
    assert!(!results[0].success);
    assert_eq!(h.client.calls(), 1);
    assert_eq!(h.orchestrator.history().len(), 1);
}

#[tokio::test]
async fn test_chain_runs_all_on_success() {
    let h = harness(FakeCompletion::replying(structured_reply()));
    let context = code_context("src/lib.rs", "fn f() { v[0] }");

    let results = h
        .orchestrator
        .execute_chain(
            &[AgentKind::BugFix, AgentKind::CodeReview],
            &context,
            &CancellationToken::new(),
            &NullSink,
        )
        .await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success));
    assert_eq!(results[0].agent, AgentKind::BugFix);
    assert_eq!(results[1].agent, AgentKind::CodeReview);
    assert_eq!(h.client.calls(), 2);
    assert_eq!(h.orchestrator.history().len(), 2);
}

#[tokio::test]
async fn test_cancelled_chain_returns_partial() {
    let h = harness(FakeCompletion::replying(structured_reply()));
    let context = code_context("src/lib.rs", "fn f() { v[0] }");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let results = h
        .orchestrator
        .execute_chain(
            &[AgentKind::BugFix, AgentKind::CodeReview],
            &context,
            &cancel,
            &NullSink,
        )
        .await;

    assert_eq!(results.len(), 1);
    assert!(results[0].cancelled);
    assert_eq!(h.client.calls(), 0);
}

#[tokio::test]
async fn test_stats_recomputed_from_history() {
    let h = harness(FakeCompletion::replying(structured_reply()));
    let context = code_context("src/lib.rs", "fn f() { v[0] }");
    let cancel = CancellationToken::new();

    let first = h
        .orchestrator
        .execute_agent(AgentKind::BugFix, &context, &cancel, &NullSink)
        .await;
    assert!(first.success);
    // Empty context fails validation, giving one failure.
    h.orchestrator
        .execute_agent(
            AgentKind::BugFix,
            &ContextSnapshot::default(),
            &cancel,
            &NullSink,
        )
        .await;

    let stats = h.orchestrator.execution_stats();
    assert_eq!(stats.total_executions, 2);
    assert_eq!(stats.successes, 1);
    assert_eq!(stats.failures, 1);
    assert!((stats.success_rate - 50.0).abs() < f64::EPSILON);
    assert_eq!(stats.per_agent.get(&AgentKind::BugFix), Some(&2));

    h.orchestrator.clear_history();
    let cleared = h.orchestrator.execution_stats();
    assert_eq!(cleared.total_executions, 0);
    assert_eq!(cleared.success_rate, 0.0);
}

#[tokio::test]
async fn test_suggestions_rank_bug_fix_for_errors() {
    let h = harness(FakeCompletion::replying("ok"));
    let mut context = code_context("src/lib.rs", "fn f() {}");
    context.signals.has_errors = Some(true);

    let top = h.orchestrator.suggest_agent(&context).unwrap();
    assert_eq!(top.agent, AgentKind::BugFix);

    let all = h.orchestrator.all_suggestions(&context);
    assert_eq!(all.len(), AgentKind::ALL.len());
    assert!(all.windows(2).all(|w| w[0].confidence >= w[1].confidence));
}
