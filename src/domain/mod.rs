//! Domain types shared across modules.
//!
//! These describe what the editor collaborator hands the core: the active
//! document's text, the cursor/selection, and current diagnostics. The core
//! never talks to an editor directly; the CLI (or an editor adapter) builds
//! a [`DocumentView`] and passes it in.

use serde::{Deserialize, Serialize};

/// Zero-based position in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// Half-open range between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// Severity of an editor diagnostic marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
    Hint,
}

/// One diagnostic marker supplied by the editor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub range: Range,
}

/// Snapshot of the active document as supplied by the editor collaborator.
#[derive(Debug, Clone)]
pub struct DocumentView {
    /// Stable identity of the document (path or editor URI).
    pub uri: String,
    /// Monotonic version bumped by the editor on each edit.
    pub version: u64,
    /// Language identifier, e.g. "rust", "typescript".
    pub language_id: Option<String>,
    /// Full document text.
    pub text: String,
    pub cursor: Position,
    pub selection: Option<Range>,
    pub diagnostics: Vec<Diagnostic>,
    /// Workspace root the document belongs to, if known.
    pub workspace_root: Option<std::path::PathBuf>,
}

impl DocumentView {
    /// Cache key: identity plus version, so edits invalidate naturally.
    pub fn identity(&self) -> String {
        format!("{}@{}", self.uri, self.version)
    }

    /// Selected text, if the selection is non-empty and within bounds.
    ///
    /// Editor columns are byte offsets and may land inside a multibyte
    /// character; they are clamped down to the nearest char boundary.
    pub fn selection_text(&self) -> Option<String> {
        let range = self.selection?;
        if range.start == range.end {
            return None;
        }
        let lines: Vec<&str> = self.text.lines().collect();
        if lines.is_empty() || range.start.line >= lines.len() {
            return None;
        }
        let end_line = range.end.line.min(lines.len() - 1);

        if range.start.line == end_line {
            let line = lines[range.start.line];
            let start = clamp_to_char_boundary(line, range.start.column);
            let end = clamp_to_char_boundary(line, range.end.column).max(start);
            return Some(line[start..end].to_string());
        }

        let mut out = Vec::new();
        for (idx, line) in lines[range.start.line..=end_line].iter().enumerate() {
            if idx == 0 {
                out.push(line[clamp_to_char_boundary(line, range.start.column)..].to_string());
            } else if range.start.line + idx == end_line {
                out.push(line[..clamp_to_char_boundary(line, range.end.column)].to_string());
            } else {
                out.push(line.to_string());
            }
        }
        Some(out.join("\n"))
    }
}

/// Largest char-boundary byte index not past `column` (or the line end).
fn clamp_to_char_boundary(line: &str, column: usize) -> usize {
    let mut idx = column.min(line.len());
    while !line.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
