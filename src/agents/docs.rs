//! Documentation agent.
//!
//! Asks the model to document the code window and converts the reply into
//! documentation outputs: fenced blocks become inline doc edits, the prose
//! around them becomes a markdown artifact.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use async_trait::async_trait;

use crate::agents::base::AgentCore;
use crate::agents::parser::{self, ParsedReply};
use crate::agents::status::AgentStatus;
use crate::agents::types::{AgentResult, ChangeKind, CodeChange, DocOutput};
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

pub struct DocumentationAgent {
    core: AgentCore,
}

impl DocumentationAgent {
    pub fn new(client: Arc<dyn CompletionService>) -> Self {
        Self {
            core: AgentCore::new(AgentKind::Documentation, client),
        }
    }

    fn build_prompt(context: &ContextSnapshot) -> Option<String> {
        let immediate = context.immediate.as_ref()?;
        let mut prompt = String::from(
            "You are a documentation assistant. Write documentation for the code \
             below.\n\
             Return documented code in a fenced code block and a prose summary \
             after it. Flag anything unclear as a line starting with \"Note:\".\n\n",
        );
        prompt.push_str(&format!("File: {}\n", immediate.file_path));
        if let Some(symbol) = &immediate.enclosing_symbol {
            prompt.push_str(&format!("Focus on: {}\n", symbol));
        }
        if context.signals.missing_docs == Some(true) {
            prompt.push_str("This file has notably sparse documentation.\n");
        }
        prompt.push_str("\nCode:\n```\n");
        prompt.push_str(&immediate.surrounding_code);
        prompt.push_str("\n```\n");
        Some(prompt)
    }

    fn synthesize(
        context: &ContextSnapshot,
        reply: ParsedReply,
        raw: &str,
        duration_ms: u64,
    ) -> AgentResult {
        let mut result = AgentResult::success(AgentKind::Documentation, duration_ms);
        let confidence = parser::confidence_from_text(raw);
        let path = context.current_file().unwrap_or_default().to_string();

        result.code_changes = reply
            .code_blocks
            .iter()
            .map(|block| CodeChange {
                kind: ChangeKind::Replace,
                path: path.clone(),
                range: context.immediate.as_ref().and_then(|i| i.selection_range),
                position: None,
                new_text: block.content.clone(),
                confidence,
            })
            .collect();

        // Prose outside the fences is the standalone documentation artifact.
        let prose: String = raw
            .lines()
            .scan(false, |in_fence, line| {
                if line.trim_start().starts_with("```") {
                    *in_fence = !*in_fence;
                    return Some(None);
                }
                Some(if *in_fence { None } else { Some(line) })
            })
            .flatten()
            .collect::<Vec<_>>()
            .join("\n");
        if !prose.trim().is_empty() {
            result.documentation.push(DocOutput {
                doc_type: "summary".to_string(),
                path: format!("{}.md", path),
                content: prose.trim().to_string(),
                format: "markdown".to_string(),
            });
        }

        result.confidence = Some(confidence);
        result.suggestions = reply.suggestions;
        result.next_steps = reply.next_steps;
        if result.code_changes.is_empty() && result.documentation.is_empty() {
            result.message = Some(raw.to_string());
        }
        result
    }
}

#[async_trait]
impl Agent for DocumentationAgent {
    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor {
            kind: AgentKind::Documentation,
            display_name: "Documenter".to_string(),
            description: "Writes and improves documentation for the code in view".to_string(),
            capabilities: vec![AgentCapability {
                name: "document".to_string(),
                languages: Vec::new(),
                file_types: Vec::new(),
                required_context: REQUIRED.to_vec(),
                outputs: vec![
                    OutputType::Documentation,
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
            return AgentResult::failure(AgentKind::Documentation, 0, "A current file is required");
        };
        self.core
            .run(prompt, cancel, sink, |raw, duration_ms| {
                let reply = parser::parse_reply(raw, "documentation");
                Self::synthesize(context, reply, raw, duration_ms)
            })
            .await
    }
}
