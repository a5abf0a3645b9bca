//! Tests for the agents module.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use async_trait::async_trait;

use crate::agents::bug_fix::BugFixAgent;
use crate::agents::devops::DevOpsAgent;
use crate::agents::review::CodeReviewAgent;
use crate::agents::types::{ChangeKind, Severity};
use crate::agents::{Agent, AgentKind, AgentRegistry, NullSink};
use crate::completion::{CompletionError, CompletionRequest, CompletionService};
use crate::context::types::{ContextSnapshot, ImmediateContext, ProjectContext};
use crate::domain::Position;

/// Scripted completion service for tests.
pub struct FakeCompletion {
    reply: Result<String, fn() -> CompletionError>,
    calls: AtomicUsize,
}

impl FakeCompletion {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(make_error: fn() -> CompletionError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(make_error),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for FakeCompletion {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(make_error) => Err(make_error()),
        }
    }
}

pub fn code_context(path: &str, code: &str) -> ContextSnapshot {
    let mut snapshot = ContextSnapshot::default();
    snapshot.immediate = Some(ImmediateContext {
        file_path: path.to_string(),
        language_id: Some("rust".to_string()),
        enclosing_symbol: Some("handler".to_string()),
        cursor: Position { line: 0, column: 0 },
        selection_text: None,
        selection_range: None,
        surrounding_code: code.to_string(),
    });
    snapshot.signals.has_errors = Some(false);
    snapshot
}

#[tokio::test]
async fn test_validate_context_reports_missing_fields() {
    let agent = BugFixAgent::new(FakeCompletion::replying("ok"));

    let empty = ContextSnapshot::default();
    let validation = agent.validate_context(&empty);
    assert!(!validation.valid);
    assert!(!validation.reason.as_deref().unwrap_or_default().is_empty());

    // A file with an empty code window is still invalid.
    let blank = code_context("src/lib.rs", "   \n  ");
    assert!(!agent.validate_context(&blank).valid);

    let good = code_context("src/lib.rs", "fn f() { panic!() }");
    assert!(agent.validate_context(&good).valid);
}

#[tokio::test]
async fn test_bug_fix_structured_reply() {
    let client = FakeCompletion::replying(
        "Issue: critical use-after-free\n\
         The buffer is dropped before the read completes.\n\
         Fix: hold the buffer until the read resolves\n\
         ```rust\nlet buffer = buffer.clone();\n```\n",
    );
    let agent = BugFixAgent::new(client.clone());
    let context = code_context("src/io.rs", "fn read() {}");

    let result = agent
        .execute(&context, &CancellationToken::new(), &NullSink)
        .await;

    assert!(result.success);
    assert_eq!(client.calls(), 1);
    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].severity, Severity::Critical);
    assert_eq!(result.findings[0].title, "critical use-after-free");
    assert!(result.findings[0].description.is_some());
    assert_eq!(result.suggestions.len(), 1);
    assert_eq!(result.code_changes.len(), 1);
    assert_eq!(result.code_changes[0].kind, ChangeKind::Replace);
    assert_eq!(result.code_changes[0].path, "src/io.rs");
    let confidence = result.confidence.unwrap();
    assert!((0.3..=0.95).contains(&confidence));

    let status = agent.status();
    assert_eq!(status.success_count, 1);
    assert_eq!(status.error_count, 0);
    assert!(!status.executing);
}

#[tokio::test]
async fn test_unstructured_reply_degrades_to_message() {
    let client = FakeCompletion::replying("I could not find anything wrong here.");
    let agent = CodeReviewAgent::new(client);
    let context = code_context("src/lib.rs", "fn f() {}");

    let result = agent
        .execute(&context, &CancellationToken::new(), &NullSink)
        .await;

    assert!(result.success);
    assert!(result.findings.is_empty());
    assert_eq!(
        result.message.as_deref(),
        Some("I could not find anything wrong here.")
    );
}

#[tokio::test]
async fn test_cancellation_before_dispatch_skips_service() {
    let client = FakeCompletion::replying("never sent");
    let agent = BugFixAgent::new(client.clone());
    let context = code_context("src/lib.rs", "fn f() {}");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = agent.execute(&context, &cancel, &NullSink).await;

    assert!(!result.success);
    assert!(result.cancelled);
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn test_service_error_becomes_failed_result() {
    let client = FakeCompletion::failing(|| CompletionError::Auth { status: 401 });
    let agent = BugFixAgent::new(client);
    let context = code_context("src/lib.rs", "fn f() {}");

    let result = agent
        .execute(&context, &CancellationToken::new(), &NullSink)
        .await;

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap_or_default().contains("401"));

    let status = agent.status();
    assert_eq!(status.error_count, 1);
    assert!(!status.executing);
    assert!(status.ready);
}

#[tokio::test]
async fn test_devops_needs_project_layer() {
    let agent = DevOpsAgent::new(FakeCompletion::replying("ok"));
    assert!(!agent.validate_context(&ContextSnapshot::default()).valid);

    let mut context = ContextSnapshot::default();
    context.project = Some(ProjectContext::default());
    assert!(agent.validate_context(&context).valid);
}

#[tokio::test]
async fn test_devops_create_file_changes() {
    let client = FakeCompletion::replying(
        "Issue: no CI configured\n\
         missing pipeline\n\
         File: .github/workflows/ci.yml\n\
         ```yaml\nname: ci\non: push\n```\n",
    );
    let agent = DevOpsAgent::new(client);
    let mut context = ContextSnapshot::default();
    context.project = Some(ProjectContext::default());
    context.signals.has_ci_config = Some(false);

    let result = agent
        .execute(&context, &CancellationToken::new(), &NullSink)
        .await;

    assert!(result.success);
    assert_eq!(result.code_changes.len(), 1);
    assert_eq!(result.code_changes[0].kind, ChangeKind::CreateFile);
    assert_eq!(result.code_changes[0].path, ".github/workflows/ci.yml");
}

#[test]
fn test_registry_lookup_and_kinds() {
    let registry = AgentRegistry::standard(FakeCompletion::replying("ok"));
    assert_eq!(registry.len(), AgentKind::ALL.len());
    for kind in AgentKind::ALL {
        let agent = registry.get(*kind).expect("registered agent");
        assert_eq!(agent.descriptor().kind, *kind);
    }
    assert!(AgentKind::parse("bug-fix").is_some());
    assert!(AgentKind::parse("nonsense").is_none());
}
