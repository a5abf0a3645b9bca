//! DevOps agent.
//!
//! Works from the project layer rather than the code window: dependency
//! manifest, config files, and the presence or absence of CI
//! configuration. Proposed pipeline files come back as create-file edits.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use async_trait::async_trait;

use crate::agents::base::AgentCore;
use crate::agents::parser::{self, ParsedReply};
use crate::agents::status::AgentStatus;
use crate::agents::types::{AgentResult, ChangeKind, CodeChange};
use crate::agents::{
    validate_required, Agent, AgentCapability, AgentDescriptor, AgentKind, ContextValidation,
    OutputSink, OutputType, RequiredContext,
};
use crate::completion::CompletionService;
use crate::context::types::ContextSnapshot;

const REQUIRED: &[RequiredContext] = &[RequiredContext::ProjectStructure];

pub struct DevOpsAgent {
    core: AgentCore,
}

impl DevOpsAgent {
    pub fn new(client: Arc<dyn CompletionService>) -> Self {
        Self {
            core: AgentCore::new(AgentKind::DevOps, client),
        }
    }

    fn build_prompt(context: &ContextSnapshot) -> Option<String> {
        let project = context.project.as_ref()?;
        let mut prompt = String::from(
            "You are a DevOps assistant. Assess this project's build, test, and \
             delivery setup.\n\
             Report gaps as lines starting with \"Issue:\", remedies as \
             \"Suggestion:\" lines, and proposed pipeline or config files as \
             fenced code blocks preceded by a \"File:\" line naming the path.\n\n",
        );
        if !project.config_files.is_empty() {
            prompt.push_str(&format!(
                "Config files present: {}\n",
                project.config_files.join(", ")
            ));
        }
        if !project.dependencies.production.is_empty() {
            prompt.push_str(&format!(
                "Production dependencies: {}\n",
                project
                    .dependencies
                    .production
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        match context.signals.has_ci_config {
            Some(true) => prompt.push_str("The project already has CI configuration.\n"),
            Some(false) => prompt.push_str("The project has no CI configuration.\n"),
            None => {}
        }
        if !project.test_files.is_empty() {
            prompt.push_str(&format!("Test files: {}\n", project.test_files.len()));
        }
        Some(prompt)
    }

    fn synthesize(raw: &str, reply: ParsedReply, duration_ms: u64) -> AgentResult {
        let mut result = AgentResult::success(AgentKind::DevOps, duration_ms);
        let confidence = parser::confidence_from_text(raw);

        // "File: path" lines immediately preceding a fence name the file
        // the block should create.
        let file_names = proposed_file_names(raw);
        result.code_changes = reply
            .code_blocks
            .iter()
            .enumerate()
            .map(|(idx, block)| CodeChange {
                kind: ChangeKind::CreateFile,
                path: file_names
                    .get(idx)
                    .cloned()
                    .flatten()
                    .unwrap_or_else(|| format!("pipeline-{}.yml", idx + 1)),
                range: None,
                position: None,
                new_text: block.content.clone(),
                confidence,
            })
            .collect();

        result.confidence = Some(if reply.findings.is_empty() {
            confidence
        } else {
            parser::confidence_from_findings(reply.findings.len())
        });
        if reply.is_empty() {
            result.message = Some(raw.to_string());
        }
        result.findings = reply.findings;
        result.suggestions = reply.suggestions;
        result.next_steps = reply.next_steps;
        result
    }
}

/// Per-fence file names: one slot per code fence, in order, `None` for
/// fences with no "File: <path>" line directly before them.
fn proposed_file_names(raw: &str) -> Vec<Option<String>> {
    let mut names = Vec::new();
    let mut pending: Option<String> = None;
    let mut in_fence = false;
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            if in_fence {
                in_fence = false;
            } else {
                in_fence = true;
                names.push(pending.take());
            }
        } else if in_fence {
            continue;
        } else if trimmed.to_lowercase().starts_with("file:") {
            pending = Some(trimmed[5..].trim().to_string());
        } else if !trimmed.is_empty() {
            pending = None;
        }
    }
    names
}

#[async_trait]
impl Agent for DevOpsAgent {
    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor {
            kind: AgentKind::DevOps,
            display_name: "DevOps Advisor".to_string(),
            description: "Assesses build and delivery setup and drafts pipeline configuration"
                .to_string(),
            capabilities: vec![AgentCapability {
                name: "pipeline-advice".to_string(),
                languages: Vec::new(),
                file_types: vec!["yml".to_string(), "yaml".to_string(), "toml".to_string()],
                required_context: REQUIRED.to_vec(),
                outputs: vec![
                    OutputType::Findings,
                    OutputType::CodeChanges,
                    OutputType::Message,
                ],
            }],
        }
    }

    fn validate_context(&self, context: &ContextSnapshot) -> ContextValidation {
        validate_required(context, REQUIRED)
    }

    fn status(&self) -> AgentStatus {
        self.core.status()
    }

    async fn execute(
        &self,
        context: &ContextSnapshot,
        cancel: &CancellationToken,
        sink: &dyn OutputSink,
    ) -> AgentResult {
        let Some(prompt) = Self::build_prompt(context) else {
            return AgentResult::failure(
                AgentKind::DevOps,
                0,
                "Project structure has not been analyzed",
            );
        };
        self.core
            .run(prompt, cancel, sink, |raw, duration_ms| {
                let reply = parser::parse_reply(raw, "devops");
                Self::synthesize(raw, reply, duration_ms)
            })
            .await
    }
}
