//! Bug-fixing agent.
//!
//! Builds a prompt around the code near the cursor and any compiler
//! diagnostics, then extracts findings and fixed code from the reply.
//! Fenced code in the reply becomes a replace-edit against the current
//! file.

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

const REQUIRED: &[RequiredContext] = &[
    RequiredContext::CurrentFile,
    RequiredContext::SurroundingCode,
];

pub struct BugFixAgent {
    core: AgentCore,
}

impl BugFixAgent {
    pub fn new(client: Arc<dyn CompletionService>) -> Self {
        Self {
            core: AgentCore::new(AgentKind::BugFix, client),
        }
    }

    fn build_prompt(context: &ContextSnapshot) -> Option<String> {
        let immediate = context.immediate.as_ref()?;
        let mut prompt = String::from(
            "You are a debugging assistant. Analyze the code below, identify the bug, \
             and propose a fix.\n\
             Report each problem as a line starting with \"Issue:\" followed by one \
             description line, each remedy as a line starting with \"Fix:\", and put \
             corrected code in a fenced code block.\n\n",
        );
        prompt.push_str(&format!("File: {}\n", immediate.file_path));
        if let Some(symbol) = &immediate.enclosing_symbol {
            prompt.push_str(&format!("Enclosing symbol: {}\n", symbol));
        }
        if context.signals.has_errors == Some(true) {
            prompt.push_str("The editor reports compilation errors in this file.\n");
        }
        prompt.push_str("\nCode:\n```\n");
        prompt.push_str(&immediate.surrounding_code);
        prompt.push_str("\n```\n");
        if let Some(selection) = &immediate.selection_text {
            prompt.push_str(&format!("\nThe developer selected:\n{}\n", selection));
        }
        Some(prompt)
    }

    fn synthesize(
        context: &ContextSnapshot,
        reply: ParsedReply,
        raw: &str,
        duration_ms: u64,
    ) -> AgentResult {
        let mut result = AgentResult::success(AgentKind::BugFix, duration_ms);
        let path = context.current_file().unwrap_or_default().to_string();
        let change_confidence = parser::confidence_from_text(raw);

        result.code_changes = reply
            .code_blocks
            .iter()
            .map(|block| CodeChange {
                kind: ChangeKind::Replace,
                path: path.clone(),
                range: context
                    .immediate
                    .as_ref()
                    .and_then(|i| i.selection_range),
                position: None,
                new_text: block.content.clone(),
                confidence: change_confidence,
            })
            .collect();

        result.confidence = Some(if reply.findings.is_empty() {
            change_confidence
        } else {
            parser::confidence_from_findings(reply.findings.len())
        });

        if reply.is_empty() {
            result.message = Some(raw.to_string());
        } else {
            result.reasoning = Some(format!(
                "Identified {} issue(s) and {} candidate fix(es)",
                reply.findings.len(),
                reply.code_blocks.len()
            ));
        }
        result.findings = reply.findings;
        result.suggestions = reply.suggestions;
        result.next_steps = reply.next_steps;
        result
    }
}

#[async_trait]
impl Agent for BugFixAgent {
    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor {
            kind: AgentKind::BugFix,
            display_name: "Bug Fixer".to_string(),
            description: "Diagnoses failures and proposes targeted code fixes".to_string(),
            capabilities: vec![AgentCapability {
                name: "diagnose-and-fix".to_string(),
                languages: Vec::new(),
                file_types: Vec::new(),
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
            return AgentResult::failure(AgentKind::BugFix, 0, "A current file is required");
        };
        self.core
            .run(prompt, cancel, sink, |raw, duration_ms| {
                let reply = parser::parse_reply(raw, "bug");
                Self::synthesize(context, reply, raw, duration_ms)
            })
            .await
    }
}
