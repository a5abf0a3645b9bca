//! Code-generation agent.
//!
//! Turns the selection (or the code window) plus project dependencies into
//! a generation prompt. Fenced code in the reply becomes either a
//! replacement for the selection or an insertion at the cursor.

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

pub struct CodeGenerationAgent {
    core: AgentCore,
}

impl CodeGenerationAgent {
    pub fn new(client: Arc<dyn CompletionService>) -> Self {
        Self {
            core: AgentCore::new(AgentKind::CodeGeneration, client),
        }
    }

    fn build_prompt(context: &ContextSnapshot) -> Option<String> {
        let immediate = context.immediate.as_ref()?;
        let mut prompt = String::from(
            "You are a code generation assistant. Generate code that fits the style \
             and dependencies of the surrounding project.\n\
             Put generated code in a fenced code block; add any caveats as lines \
             starting with \"Note:\".\n\n",
        );
        prompt.push_str(&format!("File: {}\n", immediate.file_path));
        if let Some(language) = &immediate.language_id {
            prompt.push_str(&format!("Language: {}\n", language));
        }
        if let Some(project) = &context.project {
            if !project.dependencies.production.is_empty() {
                let deps: Vec<String> = project
                    .dependencies
                    .production
                    .iter()
                    .map(|(name, version)| format!("{} {}", name, version))
                    .collect();
                prompt.push_str(&format!("Available dependencies: {}\n", deps.join(", ")));
            }
            if !project.architecture_labels.is_empty() {
                prompt.push_str(&format!(
                    "Project architecture: {}\n",
                    project.architecture_labels.join(", ")
                ));
            }
        }
        prompt.push_str("\nSurrounding code:\n```\n");
        prompt.push_str(&immediate.surrounding_code);
        prompt.push_str("\n```\n");
        match &immediate.selection_text {
            Some(selection) => {
                prompt.push_str(&format!(
                    "\nRewrite or complete this selected fragment:\n{}\n",
                    selection
                ));
            }
            None => prompt.push_str("\nGenerate the code that belongs at the cursor.\n"),
        }
        Some(prompt)
    }

    fn synthesize(
        context: &ContextSnapshot,
        reply: ParsedReply,
        raw: &str,
        duration_ms: u64,
    ) -> AgentResult {
        let mut result = AgentResult::success(AgentKind::CodeGeneration, duration_ms);
        let confidence = parser::confidence_from_text(raw);
        let immediate = context.immediate.as_ref();
        let path = context.current_file().unwrap_or_default().to_string();

        result.code_changes = reply
            .code_blocks
            .iter()
            .map(|block| {
                let selection = immediate.and_then(|i| i.selection_range);
                CodeChange {
                    kind: if selection.is_some() {
                        ChangeKind::Replace
                    } else {
                        ChangeKind::Insert
                    },
                    path: path.clone(),
                    range: selection,
                    position: if selection.is_none() {
                        immediate.map(|i| i.cursor)
                    } else {
                        None
                    },
                    new_text: block.content.clone(),
                    confidence,
                }
            })
            .collect();

        result.confidence = Some(confidence);
        result.suggestions = reply.suggestions;
        result.next_steps = reply.next_steps;
        if result.code_changes.is_empty() {
            result.message = Some(raw.to_string());
        } else {
            result.reasoning = Some(format!(
                "Generated {} code block(s)",
                result.code_changes.len()
            ));
        }
        result
    }
}

#[async_trait]
impl Agent for CodeGenerationAgent {
    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor {
            kind: AgentKind::CodeGeneration,
            display_name: "Code Generator".to_string(),
            description: "Generates code matching the project's style and dependencies"
                .to_string(),
            capabilities: vec![AgentCapability {
                name: "generate".to_string(),
                languages: Vec::new(),
                file_types: Vec::new(),
                required_context: REQUIRED.to_vec(),
                outputs: vec![OutputType::CodeChanges, OutputType::Message],
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
            return AgentResult::failure(AgentKind::CodeGeneration, 0, "A current file is required");
        };
        self.core
            .run(prompt, cancel, sink, |raw, duration_ms| {
                let reply = parser::parse_reply(raw, "generation");
                Self::synthesize(context, reply, raw, duration_ms)
            })
            .await
    }
}
