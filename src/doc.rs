//! The offset/position oracle boundary.
//!
//! The core never reimplements a text index: it accepts a `DocumentRef`
//! capability and only ever rewrites positions it is handed through
//! `position::shift`. `PlainTextDocument` is the in-memory reference
//! implementation tests substitute in place of a real host-backed rope.

use crate::position::Position;

/// Capability a host exposes for one open document. Offsets are UTF-8 byte
/// offsets into the document text; positions are zero-based `(line, column)`
/// pairs where `column` counts chars, not bytes.
pub trait DocumentRef {
    fn offset_at(&self, pos: Position) -> usize;
    fn position_at(&self, offset: usize) -> Position;
    fn line_text(&self, line: usize) -> Option<&str>;
    fn uri(&self) -> &str;
    fn line_count(&self) -> usize;
}

/// A minimal in-memory `DocumentRef`, good enough for tests and for hosts
/// that don't already own a rope-like structure.
pub struct PlainTextDocument {
    uri: String,
    lines: Vec<String>,
}

impl PlainTextDocument {
    pub fn new(uri: impl Into<String>, text: &str) -> Self {
        let lines = split_keep_trailing(text);
        PlainTextDocument { uri: uri.into(), lines }
    }

    pub fn text(&self) -> String {
        self.lines.join("")
    }

    /// Applies a single `(range, replacement)` edit to the in-memory text,
    /// for use by tests that need to check the document alongside the
    /// annotation store after a transform.
    pub fn apply(&mut self, range_start: Position, range_end: Position, replacement: &str) {
        let start = self.offset_at(range_start);
        let end = self.offset_at(range_end);
        let mut text = self.text();
        text.replace_range(start..end, replacement);
        self.lines = split_keep_trailing(&text);
    }
}

/// Splits `text` into lines, keeping the trailing `\n` on every line except
/// possibly the last, so offsets computed by concatenation round-trip
/// exactly.
fn split_keep_trailing(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices('\n') {
        lines.push(text[start..=idx].to_string());
        start = idx + 1;
    }
    if start < text.len() || lines.is_empty() {
        lines.push(text[start..].to_string());
    }
    lines
}

impl DocumentRef for PlainTextDocument {
    fn offset_at(&self, pos: Position) -> usize {
        let mut offset = 0;
        for line in self.lines.iter().take(pos.line) {
            offset += line.len();
        }
        if let Some(line) = self.lines.get(pos.line) {
            let col_byte = line
                .char_indices()
                .nth(pos.column)
                .map(|(b, _)| b)
                .unwrap_or(line.len());
            offset += col_byte;
        }
        offset
    }

    fn position_at(&self, offset: usize) -> Position {
        let mut remaining = offset;
        let last_idx = self.lines.len().saturating_sub(1);
        for (line_idx, line) in self.lines.iter().enumerate() {
            // A non-last line's length includes its trailing `\n`: an offset
            // that lands exactly on it belongs to the next line's column 0,
            // not to this line's column count (which would otherwise count
            // the newline itself as a character of column).
            if line_idx != last_idx && remaining == line.len() {
                remaining = 0;
                continue;
            }
            if remaining <= line.len() {
                let column = line[..remaining].chars().count();
                return Position::new(line_idx, column);
            }
            remaining -= line.len();
        }
        let last_len = self.lines.last().map(|l| l.chars().count()).unwrap_or(0);
        Position::new(last_idx, last_len)
    }

    fn line_text(&self, line: usize) -> Option<&str> {
        self.lines.get(line).map(|s| s.as_str())
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn line_count(&self) -> usize {
        self.lines.len()
    }
}
