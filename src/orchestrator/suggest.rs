//! Agent suitability scoring.
//!
//! Pure functions from a context snapshot to a ranked list of agent
//! suggestions. Scores are additive weighted signals and are a ranking
//! input, not a calibrated probability; they are clamped to [0, 1] for
//! reporting. Ties keep the earliest agent in evaluation order.

use serde::Serialize;

use crate::agents::AgentKind;
use crate::context::types::ContextSnapshot;

/// High complexity threshold for review pressure.
const COMPLEXITY_REVIEW_THRESHOLD: u32 = 10;

/// Very high complexity also suggests latent bugs.
const COMPLEXITY_BUG_THRESHOLD: u32 = 15;

/// One ranked suggestion.
#[derive(Debug, Clone, Serialize)]
pub struct AgentSuggestion {
    pub agent: AgentKind,
    /// Ranking score clamped to [0, 1].
    pub confidence: f64,
    /// Concatenated rationale fragments for the triggered rules.
    pub reasoning: String,
}

/// Score every registered kind, ranked descending. Order among equal
/// scores follows evaluation order (stable sort).
pub fn rank(kinds: &[AgentKind], context: &ContextSnapshot) -> Vec<AgentSuggestion> {
    let mut suggestions: Vec<AgentSuggestion> =
        kinds.iter().map(|kind| score(*kind, context)).collect();
    suggestions.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    suggestions
}

/// Score one agent kind against the context.
pub fn score(kind: AgentKind, context: &ContextSnapshot) -> AgentSuggestion {
    let signals = &context.signals;
    let mut weight = 0.0f64;
    let mut reasons: Vec<&str> = Vec::new();

    match kind {
        AgentKind::BugFix => {
            if signals.has_errors == Some(true) {
                weight += 0.8;
                reasons.push("compilation errors are present");
            }
            if signals.has_warnings == Some(true) {
                weight += 0.3;
                reasons.push("the editor reports warnings");
            }
            if signals.complexity.unwrap_or(0) > COMPLEXITY_BUG_THRESHOLD {
                weight += 0.2;
                reasons.push("very high complexity invites defects");
            }
        }
        AgentKind::CodeGeneration => {
            if context
                .immediate
                .as_ref()
                .and_then(|i| i.selection_text.as_ref())
                .is_some()
            {
                weight += 0.5;
                reasons.push("a code fragment is selected");
            }
            if context.surrounding_code().is_some() {
                weight += 0.2;
                reasons.push("there is code context to extend");
            }
        }
        AgentKind::Documentation => {
            if signals.missing_docs == Some(true) {
                weight += 0.7;
                reasons.push("documentation is sparse relative to declarations");
            }
            if signals.is_architectural_file == Some(true) {
                weight += 0.2;
                reasons.push("this is an architecturally significant file");
            }
        }
        AgentKind::CodeReview => {
            if signals.complexity.unwrap_or(0) > COMPLEXITY_REVIEW_THRESHOLD {
                weight += 0.4;
                reasons.push("complexity is above the review threshold");
            }
            if signals.has_uncommitted_changes == Some(true) {
                weight += 0.3;
                reasons.push("there are uncommitted changes");
            }
            if signals.has_warnings == Some(true) {
                weight += 0.2;
                reasons.push("warnings suggest review-worthy code");
            }
        }
        AgentKind::DevOps => {
            if signals.has_ci_config == Some(false) {
                weight += 0.6;
                reasons.push("no CI configuration was found");
            }
            if signals.is_config_file == Some(true) {
                weight += 0.3;
                reasons.push("a configuration file is in focus");
            }
            if signals.has_tests == Some(false) {
                weight += 0.2;
                reasons.push("the project has no test files");
            }
        }
    }

    let reasoning = if reasons.is_empty() {
        "no matching signals".to_string()
    } else {
        reasons.join("; ")
    };

    AgentSuggestion {
        agent: kind,
        confidence: weight.clamp(0.0, 1.0),
        reasoning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::types::{ContextSnapshot, ImmediateContext};
    use crate::domain::Position;

    #[test]
    fn test_errors_rank_bug_fix_first() {
        let mut context = ContextSnapshot::default();
        context.signals.has_errors = Some(true);

        let bug_fix = score(AgentKind::BugFix, &context);
        assert!(bug_fix.confidence > 0.0);
        assert!(bug_fix.reasoning.contains("compilation errors"));

        // An agent with no matching signals scores strictly lower.
        let devops = score(AgentKind::DevOps, &context);
        assert!(bug_fix.confidence > devops.confidence);
        assert_eq!(devops.reasoning, "no matching signals");

        let ranked = rank(AgentKind::ALL, &context);
        assert_eq!(ranked[0].agent, AgentKind::BugFix);
    }

    #[test]
    fn test_missing_docs_favors_documentation() {
        let mut context = ContextSnapshot::default();
        context.signals.missing_docs = Some(true);
        let ranked = rank(AgentKind::ALL, &context);
        assert_eq!(ranked[0].agent, AgentKind::Documentation);
    }

    #[test]
    fn test_absent_signals_score_zero() {
        // Unknown is not false: nothing set means no evidence either way.
        let context = ContextSnapshot::default();
        for kind in AgentKind::ALL {
            assert_eq!(score(*kind, &context).confidence, 0.0);
        }
    }

    #[test]
    fn test_scores_are_clamped() {
        let mut context = ContextSnapshot::default();
        context.immediate = Some(ImmediateContext {
            file_path: "src/main.rs".to_string(),
            language_id: None,
            enclosing_symbol: None,
            cursor: Position { line: 0, column: 0 },
            selection_text: Some("let x = 1;".to_string()),
            selection_range: None,
            surrounding_code: "fn f() {}".to_string(),
        });
        context.signals.has_errors = Some(true);
        context.signals.has_warnings = Some(true);
        context.signals.missing_docs = Some(true);
        context.signals.is_config_file = Some(true);
        context.signals.is_architectural_file = Some(true);
        context.signals.complexity = Some(40);
        context.signals.has_uncommitted_changes = Some(true);
        context.signals.has_ci_config = Some(false);
        context.signals.has_tests = Some(false);

        for suggestion in rank(AgentKind::ALL, &context) {
            assert!((0.0..=1.0).contains(&suggestion.confidence));
        }
    }

    #[test]
    fn test_ties_keep_evaluation_order() {
        let context = ContextSnapshot::default();
        let ranked = rank(AgentKind::ALL, &context);
        // Everything scores zero; the stable sort must preserve input order.
        let kinds: Vec<AgentKind> = ranked.iter().map(|s| s.agent).collect();
        assert_eq!(kinds, AgentKind::ALL.to_vec());
    }
}
