//! Immediate-layer extraction and derived signals.
//!
//! Everything here is a deliberate line-scan approximation. The enclosing
//! symbol comes from walking upward until a declaration-looking line
//! matches; the complexity score counts control-flow keywords. Neither is a
//! parse, and both can be wrong in nested or multi-line-signature code.
//! That tolerance for error is part of the contract; do not quietly swap
//! in a real parser here.

use regex::Regex;
use std::sync::OnceLock;

use crate::context::types::{ImmediateContext, Signals};
use crate::domain::{DiagnosticSeverity, DocumentView};

/// Lines captured on each side of the cursor.
const SURROUNDING_WINDOW: usize = 20;

/// Control-flow and logical keywords counted by the complexity estimate.
/// `match`/`loop` cover Rust sources; the base-1 additive scheme is the
/// same keyword count used by the original heuristic.
const COMPLEXITY_KEYWORDS: &[&str] = &[
    "if", "else", "while", "for", "switch", "case", "catch", "match", "loop",
];

fn declaration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?x)
            (?:\b(?:pub(?:\([^)]*\))?\s+)?fn\s+(?P<rustfn>[A-Za-z_][A-Za-z0-9_]*))
            | (?:\bfunction\s+(?P<jsfn>[A-Za-z_$][A-Za-z0-9_$]*))
            | (?:\b(?:class|interface|trait|struct|enum|impl)\s+(?P<ty>[A-Za-z_][A-Za-z0-9_]*))
            | (?:\bdef\s+(?P<pyfn>[A-Za-z_][A-Za-z0-9_]*))
            ",
        )
        .expect("invalid declaration pattern")
    })
}

fn comment_marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?m)^\s*(?://[/!]?|#|/\*|\*)").expect("invalid pattern"))
}

/// File name fragments that mark configuration files.
const CONFIG_FILE_MARKERS: &[&str] = &[
    "package.json",
    "cargo.toml",
    "pyproject.toml",
    "tsconfig",
    "webpack",
    ".yml",
    ".yaml",
    ".toml",
    ".ini",
    "dockerfile",
    "makefile",
];

/// File name fragments that mark architecturally significant files.
const ARCHITECTURAL_FILE_MARKERS: &[&str] = &[
    "main.", "index.", "app.", "server.", "lib.", "mod.", "router", "schema",
];

/// Extract the immediate layer from the active document.
pub fn extract(document: &DocumentView) -> ImmediateContext {
    ImmediateContext {
        file_path: document.uri.replace('\\', "/"),
        language_id: document.language_id.clone(),
        enclosing_symbol: enclosing_symbol(&document.text, document.cursor.line),
        cursor: document.cursor,
        selection_text: document.selection_text(),
        selection_range: document.selection,
        surrounding_code: surrounding_window(&document.text, document.cursor.line),
    }
}

/// Derive the signal set from the document and its diagnostics.
pub fn derive_signals(document: &DocumentView) -> Signals {
    let has_errors = document
        .diagnostics
        .iter()
        .any(|d| d.severity == DiagnosticSeverity::Error);
    let has_warnings = document
        .diagnostics
        .iter()
        .any(|d| d.severity == DiagnosticSeverity::Warning);

    let path_lower = document.uri.to_lowercase();

    Signals {
        has_errors: Some(has_errors),
        has_warnings: Some(has_warnings),
        missing_docs: Some(missing_documentation(&document.text)),
        is_config_file: Some(
            CONFIG_FILE_MARKERS
                .iter()
                .any(|marker| path_lower.ends_with(marker) || path_lower.contains(marker)),
        ),
        is_architectural_file: Some(
            ARCHITECTURAL_FILE_MARKERS
                .iter()
                .any(|marker| path_lower.contains(marker)),
        ),
        complexity: Some(estimate_complexity(&document.text)),
        has_uncommitted_changes: None,
        has_ci_config: None,
        has_tests: None,
    }
}

/// Walk upward from the cursor line; the first declaration match wins.
pub fn enclosing_symbol(text: &str, cursor_line: usize) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return None;
    }
    let start = cursor_line.min(lines.len() - 1);

    for line in lines[..=start].iter().rev() {
        if let Some(caps) = declaration_pattern().captures(line) {
            for group in ["rustfn", "jsfn", "ty", "pyfn"] {
                if let Some(name) = caps.name(group) {
                    return Some(name.as_str().to_string());
                }
            }
        }
    }
    None
}

/// Fixed-size window of lines around the cursor.
pub fn surrounding_window(text: &str, cursor_line: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return String::new();
    }
    let start = cursor_line.saturating_sub(SURROUNDING_WINDOW);
    let end = (cursor_line + SURROUNDING_WINDOW + 1).min(lines.len());
    if start >= end {
        return String::new();
    }
    lines[start..end].join("\n")
}

/// Base 1, plus one per whole-word occurrence of each control-flow keyword,
/// plus one per `&&`/`||`. Intentionally crude; a ranking input, not true
/// cyclomatic complexity.
pub fn estimate_complexity(text: &str) -> u32 {
    static WORD_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = WORD_PATTERNS.get_or_init(|| {
        COMPLEXITY_KEYWORDS
            .iter()
            .map(|kw| Regex::new(&format!(r"\b{}\b", kw)).expect("invalid keyword pattern"))
            .collect()
    });

    let mut score: u32 = 1;
    for pattern in patterns {
        score += pattern.find_iter(text).count() as u32;
    }
    score += text.matches("&&").count() as u32;
    score += text.matches("||").count() as u32;
    score
}

/// Count function/class style declarations in the document.
pub fn declaration_count(text: &str) -> usize {
    text.lines()
        .filter(|line| declaration_pattern().is_match(line))
        .count()
}

/// True when declarations exist and comment markers cover less than half
/// of them.
pub fn missing_documentation(text: &str) -> bool {
    let declarations = declaration_count(text);
    if declarations == 0 {
        return false;
    }
    let comments = comment_marker_pattern().find_iter(text).count();
    comments * 2 < declarations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enclosing_symbol_first_match_upward() {
        let text = "fn outer() {\n    let x = 1;\n    fn inner() {\n        body();\n    }\n}";
        assert_eq!(enclosing_symbol(text, 3).as_deref(), Some("inner"));
        assert_eq!(enclosing_symbol(text, 1).as_deref(), Some("outer"));
        assert_eq!(enclosing_symbol("let a = 1;", 0), None);
    }

    #[test]
    fn test_enclosing_symbol_other_languages() {
        assert_eq!(
            enclosing_symbol("class Widget {\n  render() {}\n}", 1).as_deref(),
            Some("Widget")
        );
        assert_eq!(
            enclosing_symbol("def handler(event):\n    pass", 1).as_deref(),
            Some("handler")
        );
    }

    #[test]
    fn test_complexity_baseline_and_keywords() {
        assert_eq!(estimate_complexity(""), 1);
        assert_eq!(estimate_complexity("let x = 1;"), 1);
        // if + else + && -> 1 + 3
        assert_eq!(estimate_complexity("if a && b { } else { }"), 4);
    }

    #[test]
    fn test_complexity_whole_word_only() {
        // "iffy" and "for_each" must not count as if/for.
        assert_eq!(estimate_complexity("let iffy = for_each;"), 1);
    }

    #[test]
    fn test_missing_documentation_threshold() {
        // Two declarations, one comment marker: 1*2 >= 2, documented enough.
        let documented = "// adds things\nfn add() {}\nfn sub() {}";
        assert!(!missing_documentation(documented));
        // Three declarations, one comment: 1*2 < 3.
        let sparse = "// only one\nfn a() {}\nfn b() {}\nfn c() {}";
        assert!(missing_documentation(sparse));
        assert!(!missing_documentation("let x = 1;"));
    }

    #[test]
    fn test_surrounding_window_bounds() {
        let text = (0..100)
            .map(|i| format!("line{}", i))
            .collect::<Vec<_>>()
            .join("\n");
        let window = surrounding_window(&text, 50);
        let lines: Vec<&str> = window.lines().collect();
        assert_eq!(lines.len(), 41);
        assert_eq!(lines[0], "line30");
        assert_eq!(lines[40], "line70");

        let top = surrounding_window(&text, 0);
        assert_eq!(top.lines().next(), Some("line0"));
    }
}
