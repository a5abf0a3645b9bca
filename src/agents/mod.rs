//! Agent contract and registry.
//!
//! Every specialized agent implements [`Agent`]: a cheap context
//! precondition check, a capability description, status counters, and the
//! execute path that turns a context snapshot into a prompt and the model
//! reply into a structured [`types::AgentResult`]. The registry is an
//! explicit dependency-injected map so independent orchestrators can be
//! constructed in tests.

pub mod base;
pub mod bug_fix;
pub mod code_gen;
pub mod devops;
pub mod docs;
pub mod parser;
pub mod review;
pub mod status;
pub mod types;

#[cfg(test)]
pub mod tests;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::completion::CompletionService;
use crate::context::types::ContextSnapshot;
use status::AgentStatus;
use types::AgentResult;

/// The specialized agent types. Dispatch is exhaustive: adding a kind
/// without wiring it up is a compile error at every match site.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
    BugFix,
    CodeGeneration,
    Documentation,
    CodeReview,
    DevOps,
}

impl AgentKind {
    pub const ALL: &'static [AgentKind] = &[
        AgentKind::BugFix,
        AgentKind::CodeGeneration,
        AgentKind::Documentation,
        AgentKind::CodeReview,
        AgentKind::DevOps,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::BugFix => "bug-fix",
            AgentKind::CodeGeneration => "code-generation",
            AgentKind::Documentation => "documentation",
            AgentKind::CodeReview => "code-review",
            AgentKind::DevOps => "devops",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "bug-fix" | "bugfix" | "fix" => Some(AgentKind::BugFix),
            "code-generation" | "codegen" | "generate" => Some(AgentKind::CodeGeneration),
            "documentation" | "docs" => Some(AgentKind::Documentation),
            "code-review" | "review" => Some(AgentKind::CodeReview),
            "devops" | "ci" => Some(AgentKind::DevOps),
            _ => None,
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context fields a capability needs before execution makes sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequiredContext {
    CurrentFile,
    SurroundingCode,
    ProjectStructure,
    Diagnostics,
    History,
}

/// What an agent can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputType {
    Message,
    CodeChanges,
    Documentation,
    Findings,
    Alternatives,
}

/// One capability entry in an agent's descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCapability {
    pub name: String,
    /// Supported language ids; empty means any.
    pub languages: Vec<String>,
    /// Supported file extensions; empty means any.
    pub file_types: Vec<String>,
    pub required_context: Vec<RequiredContext>,
    pub outputs: Vec<OutputType>,
}

/// Immutable description of a registered agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub kind: AgentKind,
    pub display_name: String,
    pub description: String,
    pub capabilities: Vec<AgentCapability>,
}

/// Outcome of the fast precondition check.
#[derive(Debug, Clone, Serialize)]
pub struct ContextValidation {
    pub valid: bool,
    pub reason: Option<String>,
}

impl ContextValidation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Check a context snapshot against a required-field list. Returns the
/// first missing requirement as the reason.
pub fn validate_required(
    context: &ContextSnapshot,
    required: &[RequiredContext],
) -> ContextValidation {
    for requirement in required {
        let missing = match requirement {
            RequiredContext::CurrentFile => context.current_file().is_none(),
            RequiredContext::SurroundingCode => context.surrounding_code().is_none(),
            RequiredContext::ProjectStructure => context.project.is_none(),
            RequiredContext::Diagnostics => context.signals.has_errors.is_none(),
            RequiredContext::History => context.history.is_none(),
        };
        if missing {
            let reason = match requirement {
                RequiredContext::CurrentFile => "A current file is required",
                RequiredContext::SurroundingCode => "Surrounding code must be non-empty",
                RequiredContext::ProjectStructure => "Project structure has not been analyzed",
                RequiredContext::Diagnostics => "Diagnostics are not available",
                RequiredContext::History => "Version-control history is not available",
            };
            return ContextValidation::invalid(reason);
        }
    }
    ContextValidation::ok()
}

/// Receives incremental agent output (the model reply as it lands).
pub trait OutputSink: Send + Sync {
    fn append(&self, text: &str);
}

/// Sink that discards everything.
pub struct NullSink;

impl OutputSink for NullSink {
    fn append(&self, _text: &str) {}
}

/// A specialized task handler.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Identity, display name, and capability list. Immutable after
    /// registration.
    fn descriptor(&self) -> AgentDescriptor;

    /// Fast precondition check. Must not do the expensive work `execute`
    /// does and must not call the completion service.
    fn validate_context(&self, context: &ContextSnapshot) -> ContextValidation;

    /// Current status counters.
    fn status(&self) -> AgentStatus;

    /// Run the agent: build a prompt, call the completion service, and
    /// synthesize a structured result. Never lets an error escape; every
    /// failure becomes a failed `AgentResult`.
    async fn execute(
        &self,
        context: &ContextSnapshot,
        cancel: &CancellationToken,
        sink: &dyn OutputSink,
    ) -> AgentResult;
}

/// Explicit agent registry, constructed once at startup and handed to the
/// orchestrator.
#[derive(Default)]
pub struct AgentRegistry {
    agents: BTreeMap<AgentKind, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with all five standard agents wired to one completion
    /// service.
    pub fn standard(client: Arc<dyn CompletionService>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(bug_fix::BugFixAgent::new(Arc::clone(&client))));
        registry.register(Arc::new(code_gen::CodeGenerationAgent::new(Arc::clone(
            &client,
        ))));
        registry.register(Arc::new(docs::DocumentationAgent::new(Arc::clone(&client))));
        registry.register(Arc::new(review::CodeReviewAgent::new(Arc::clone(&client))));
        registry.register(Arc::new(devops::DevOpsAgent::new(client)));
        registry
    }

    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        self.agents.insert(agent.descriptor().kind, agent);
    }

    pub fn get(&self, kind: AgentKind) -> Option<Arc<dyn Agent>> {
        self.agents.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<AgentKind> {
        self.agents.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
