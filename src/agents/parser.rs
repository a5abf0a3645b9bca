//! Line-oriented parsing of free-text model replies.
//!
//! The completion service returns prose. This module scans it line by
//! line, recognizes section markers by case-insensitive keyword prefixes
//! ("Issue:", "Fix:", "Alternative:", ...), and accumulates open records
//! until a new marker or end-of-text closes them. Code fences bound
//! generated code blocks. Parsing never fails: a reply with no markers is
//! still a usable result with the full text as its message.
//!
//! The whole heuristic lives behind this one interface so it can be
//! swapped for a constrained output schema later without touching
//! orchestration.

use crate::agents::types::{Alternative, ComplexityTier, Finding, Severity};

/// Lower and upper clamp for every synthesized confidence value.
pub const MIN_CONFIDENCE: f64 = 0.30;
pub const MAX_CONFIDENCE: f64 = 0.95;

/// Everything extracted from one reply.
#[derive(Debug, Default)]
pub struct ParsedReply {
    pub findings: Vec<Finding>,
    pub suggestions: Vec<String>,
    pub alternatives: Vec<Alternative>,
    /// Fenced code blocks in order of appearance, with their fence info
    /// string (language tag) when present.
    pub code_blocks: Vec<CodeBlock>,
    pub next_steps: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub content: String,
}

impl ParsedReply {
    /// Whether any structured record was recognized at all.
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
            && self.suggestions.is_empty()
            && self.alternatives.is_empty()
            && self.code_blocks.is_empty()
            && self.next_steps.is_empty()
    }
}

/// Markers that open a finding.
const FINDING_MARKERS: &[&str] = &["issue:", "problem:", "bug:", "vulnerability:"];

/// Markers collected as plain suggestions.
const SUGGESTION_MARKERS: &[&str] = &["fix:", "suggestion:", "recommendation:", "note:"];

/// Markers collected as next steps.
const NEXT_STEP_MARKERS: &[&str] = &["next:", "next step:", "next steps:"];

fn strip_bullet(line: &str) -> &str {
    line.trim_start_matches(['-', '*', '#']).trim_start()
}

/// If `line` starts with any marker (case-insensitive), return the text
/// after the marker.
fn match_marker<'a>(line: &'a str, markers: &[&str]) -> Option<&'a str> {
    let stripped = strip_bullet(line.trim());
    let lower = stripped.to_lowercase();
    for marker in markers {
        if lower.starts_with(marker) {
            return Some(stripped[marker.len()..].trim());
        }
    }
    None
}

fn is_any_marker(line: &str) -> bool {
    match_marker(line, FINDING_MARKERS).is_some()
        || match_marker(line, SUGGESTION_MARKERS).is_some()
        || match_marker(line, NEXT_STEP_MARKERS).is_some()
        || match_marker(line, &["alternative:", "pros:", "cons:", "complexity:", "estimate:"])
            .is_some()
}

/// Severity inference from the marker line, keyword based.
pub fn infer_severity(line: &str) -> Severity {
    let lower = line.to_lowercase();
    if lower.contains("critical") || lower.contains("severe") {
        Severity::Critical
    } else if lower.contains("error") || lower.contains("major") {
        Severity::Error
    } else if lower.contains("warning") || lower.contains("minor") {
        Severity::Warning
    } else {
        Severity::Info
    }
}

/// Scan a reply into structured records.
pub fn parse_reply(text: &str, category: &str) -> ParsedReply {
    let mut reply = ParsedReply::default();

    let mut open_finding: Option<Finding> = None;
    let mut open_alternative: Option<Alternative> = None;
    let mut fence: Option<CodeBlock> = None;

    for raw_line in text.lines() {
        let line = raw_line.trim_end();

        // Fences take priority over everything; markers inside generated
        // code must not open records.
        if fence.is_some() {
            if line.trim_start().starts_with("```") {
                reply.code_blocks.extend(fence.take());
            } else if let Some(block) = &mut fence {
                block.content.push_str(raw_line);
                block.content.push('\n');
            }
            continue;
        }
        if let Some(info) = line.trim_start().strip_prefix("```") {
            let info = info.trim();
            fence = Some(CodeBlock {
                language: if info.is_empty() {
                    None
                } else {
                    Some(info.to_string())
                },
                content: String::new(),
            });
            continue;
        }

        if let Some(title) = match_marker(line, FINDING_MARKERS) {
            // A new finding flushes the previous one.
            if let Some(finding) = open_finding.take() {
                reply.findings.push(finding);
            }
            open_finding = Some(Finding {
                category: category.to_string(),
                severity: infer_severity(line),
                title: title.to_string(),
                description: None,
                location: None,
            });
            continue;
        }

        if let Some(suggestion) = match_marker(line, SUGGESTION_MARKERS) {
            if !suggestion.is_empty() {
                reply.suggestions.push(suggestion.to_string());
            }
            continue;
        }

        if let Some(step) = match_marker(line, NEXT_STEP_MARKERS) {
            if !step.is_empty() {
                reply.next_steps.push(step.to_string());
            }
            continue;
        }

        if let Some(title) = match_marker(line, &["alternative:"]) {
            if let Some(alternative) = open_alternative.take() {
                reply.alternatives.push(alternative);
            }
            open_alternative = Some(Alternative {
                title: title.to_string(),
                pros: Vec::new(),
                cons: Vec::new(),
                complexity: ComplexityTier::Medium,
                time_estimate: None,
            });
            continue;
        }

        if let Some(alternative) = &mut open_alternative {
            if let Some(pros) = match_marker(line, &["pros:"]) {
                alternative.pros.extend(split_list(pros));
                continue;
            }
            if let Some(cons) = match_marker(line, &["cons:"]) {
                alternative.cons.extend(split_list(cons));
                continue;
            }
            if let Some(tier) = match_marker(line, &["complexity:"]) {
                alternative.complexity = parse_tier(tier);
                continue;
            }
            if let Some(estimate) = match_marker(line, &["estimate:", "time:"]) {
                alternative.time_estimate = Some(estimate.to_string());
                continue;
            }
        }

        // The first non-empty, non-marker line after an opened finding is
        // its description; at most one arrives through this path.
        if let Some(finding) = &mut open_finding {
            if finding.description.is_none() && !line.trim().is_empty() && !is_any_marker(line) {
                finding.description = Some(line.trim().to_string());
            }
        }
    }

    // End of text closes whatever is still open, including an unterminated
    // fence.
    if let Some(finding) = open_finding {
        reply.findings.push(finding);
    }
    if let Some(alternative) = open_alternative {
        reply.alternatives.push(alternative);
    }
    if let Some(block) = fence {
        reply.code_blocks.push(block);
    }

    reply
}

fn split_list(text: &str) -> Vec<String> {
    text.split(&[',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn parse_tier(text: &str) -> ComplexityTier {
    let lower = text.to_lowercase();
    if lower.contains("low") || lower.contains("simple") {
        ComplexityTier::Low
    } else if lower.contains("high") || lower.contains("complex") {
        ComplexityTier::High
    } else {
        ComplexityTier::Medium
    }
}

pub fn clamp_confidence(value: f64) -> f64 {
    value.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

/// Confidence from textual quality signals in the reply.
pub fn confidence_from_text(text: &str) -> f64 {
    let mut score: f64 = 0.5;

    if text.contains("///") || text.contains("/**") || text.contains("\"\"\"") {
        score += 0.1;
    }
    if text.contains("try") && text.contains("catch")
        || text.contains("Result<")
        || text.contains("?;")
    {
        score += 0.1;
    }
    let lower = text.to_lowercase();
    if lower.contains("test") || lower.contains("assert") {
        score += 0.1;
    }
    if text.contains("->") || text.contains(": string") || text.contains(": number") {
        score += 0.05;
    }
    if lower.contains(": any") || lower.contains("todo") || lower.contains("fixme") {
        score -= 0.1;
    }
    if text.len() < 50 {
        score -= 0.1;
    }
    if text.len() > 10_000 {
        score -= 0.1;
    }

    clamp_confidence(score)
}

/// Confidence from the count of distinct structured findings.
pub fn confidence_from_findings(count: usize) -> f64 {
    clamp_confidence(0.4 + 0.1 * count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_issue_and_suggestion() {
        let reply = parse_reply(
            "Issue: X\nThe cause is a stale cache.\nSuggestion: Y\n",
            "analysis",
        );
        assert_eq!(reply.findings.len(), 1);
        assert_eq!(reply.findings[0].title, "X");
        assert_eq!(
            reply.findings[0].description.as_deref(),
            Some("The cause is a stale cache.")
        );
        assert_eq!(reply.suggestions, vec!["Y".to_string()]);
    }

    #[test]
    fn test_new_issue_flushes_previous() {
        let reply = parse_reply("Issue: first\nIssue: second\n", "analysis");
        assert_eq!(reply.findings.len(), 2);
        assert_eq!(reply.findings[0].title, "first");
        assert!(reply.findings[0].description.is_none());
    }

    #[test]
    fn test_at_most_one_description_line() {
        let reply = parse_reply("Problem: leak\nfirst line\nsecond line\n", "analysis");
        assert_eq!(reply.findings.len(), 1);
        assert_eq!(reply.findings[0].description.as_deref(), Some("first line"));
    }

    #[test]
    fn test_severity_keywords() {
        assert_eq!(infer_severity("Issue: critical overflow"), Severity::Critical);
        assert_eq!(infer_severity("Issue: severe leak"), Severity::Critical);
        assert_eq!(infer_severity("Issue: major error in loop"), Severity::Error);
        assert_eq!(infer_severity("Issue: minor style nit"), Severity::Warning);
        assert_eq!(infer_severity("Issue: naming"), Severity::Info);
    }

    #[test]
    fn test_fence_bounds_code_block() {
        let text = "Fix: use a guard\n```rust\nIssue: not a marker\nlet x = 1;\n```\ntail\n";
        let reply = parse_reply(text, "analysis");
        assert_eq!(reply.code_blocks.len(), 1);
        assert_eq!(reply.code_blocks[0].language.as_deref(), Some("rust"));
        assert_eq!(
            reply.code_blocks[0].content,
            "Issue: not a marker\nlet x = 1;\n"
        );
        // The marker inside the fence must not have opened a finding.
        assert!(reply.findings.is_empty());
        assert_eq!(reply.suggestions, vec!["use a guard".to_string()]);
    }

    #[test]
    fn test_unterminated_fence_closes_at_eof() {
        let reply = parse_reply("```\nlet a = 1;\n", "analysis");
        assert_eq!(reply.code_blocks.len(), 1);
        assert_eq!(reply.code_blocks[0].content, "let a = 1;\n");
    }

    #[test]
    fn test_alternatives_with_trade_offs() {
        let text = "Alternative: rewrite with channels\n\
                    Pros: no shared state, simpler shutdown\n\
                    Cons: more allocation\n\
                    Complexity: high\n\
                    Estimate: 2 days\n";
        let reply = parse_reply(text, "analysis");
        assert_eq!(reply.alternatives.len(), 1);
        let alt = &reply.alternatives[0];
        assert_eq!(alt.title, "rewrite with channels");
        assert_eq!(alt.pros, vec!["no shared state", "simpler shutdown"]);
        assert_eq!(alt.cons, vec!["more allocation"]);
        assert_eq!(alt.complexity, ComplexityTier::High);
        assert_eq!(alt.time_estimate.as_deref(), Some("2 days"));
    }

    #[test]
    fn test_unstructured_reply_is_empty_but_not_error() {
        let reply = parse_reply("Just some prose without any markers.", "analysis");
        assert!(reply.is_empty());
    }

    #[test]
    fn test_markers_are_case_insensitive_and_bulleted() {
        let reply = parse_reply("- ISSUE: shouting\n* fix: lowercase\n", "analysis");
        assert_eq!(reply.findings.len(), 1);
        assert_eq!(reply.findings[0].title, "shouting");
        assert_eq!(reply.suggestions, vec!["lowercase".to_string()]);
    }

    #[test]
    fn test_confidence_always_clamped() {
        let inputs = [
            "",
            "x",
            "a perfectly ordinary sentence",
            &"assert test Result< -> /// ?;".repeat(40),
            &"todo any fixme".repeat(200),
        ];
        for input in inputs {
            let c = confidence_from_text(input);
            assert!((MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&c), "{}", c);
        }
        for count in 0..20 {
            let c = confidence_from_findings(count);
            assert!((MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&c));
        }
    }
}
