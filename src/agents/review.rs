//! Code-review agent.
//!
//! Reviews the code window for correctness, clarity, and security smells.
//! The reply is parsed into findings with severities, suggestions, and
//! alternative approaches; confidence comes from the finding count.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use async_trait::async_trait;

use crate::agents::base::AgentCore;
use crate::agents::parser::{self, ParsedReply};
use crate::agents::status::AgentStatus;
use crate::agents::types::AgentResult;
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

pub struct CodeReviewAgent {
    core: AgentCore,
}

impl CodeReviewAgent {
    pub fn new(client: Arc<dyn CompletionService>) -> Self {
        Self {
            core: AgentCore::new(AgentKind::CodeReview, client),
        }
    }

    fn build_prompt(context: &ContextSnapshot) -> Option<String> {
        let immediate = context.immediate.as_ref()?;
        let mut prompt = String::from(
            "You are a code reviewer. Review the code below for correctness, \
             clarity, performance, and security problems.\n\
             Report each finding as a line starting with \"Issue:\" (mention \
             critical/major/minor in the line) followed by one explanation line. \
             Add improvement ideas as \"Suggestion:\" lines and substantially \
             different designs as \"Alternative:\" blocks with Pros:/Cons:/\
             Complexity: lines.\n\n",
        );
        prompt.push_str(&format!("File: {}\n", immediate.file_path));
        if let Some(complexity) = context.signals.complexity {
            prompt.push_str(&format!("Estimated complexity score: {}\n", complexity));
        }
        if let Some(history) = &context.history {
            if !history.uncommitted_files.is_empty() {
                prompt.push_str(&format!(
                    "Uncommitted files in the workspace: {}\n",
                    history.uncommitted_files.join(", ")
                ));
            }
        }
        prompt.push_str("\nCode:\n```\n");
        prompt.push_str(&immediate.surrounding_code);
        prompt.push_str("\n```\n");
        Some(prompt)
    }

    fn synthesize(reply: ParsedReply, raw: &str, duration_ms: u64) -> AgentResult {
        let mut result = AgentResult::success(AgentKind::CodeReview, duration_ms);
        result.confidence = Some(if reply.findings.is_empty() {
            parser::confidence_from_text(raw)
        } else {
            parser::confidence_from_findings(reply.findings.len())
        });

        if reply.is_empty() {
            result.message = Some(raw.to_string());
        } else {
            result.reasoning = Some(format!(
                "Review produced {} finding(s), {} suggestion(s), {} alternative(s)",
                reply.findings.len(),
                reply.suggestions.len(),
                reply.alternatives.len()
            ));
        }
        result.findings = reply.findings;
        result.suggestions = reply.suggestions;
        result.alternatives = reply.alternatives;
        result.next_steps = reply.next_steps;
        result
    }
}

#[async_trait]
impl Agent for CodeReviewAgent {
    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor {
            kind: AgentKind::CodeReview,
            display_name: "Code Reviewer".to_string(),
            description: "Finds correctness, clarity, and security problems in the code in view"
                .to_string(),
            capabilities: vec![AgentCapability {
                name: "review".to_string(),
                languages: Vec::new(),
                file_types: Vec::new(),
                required_context: REQUIRED.to_vec(),
                outputs: vec![
                    OutputType::Findings,
                    OutputType::Alternatives,
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
            return AgentResult::failure(AgentKind::CodeReview, 0, "A current file is required");
        };
        self.core
            .run(prompt, cancel, sink, |raw, duration_ms| {
                let reply = parser::parse_reply(raw, "review");
                Self::synthesize(reply, raw, duration_ms)
            })
            .await
    }
}
