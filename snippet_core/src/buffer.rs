//! Text buffer implementation using ropey.

use crate::position::{Position, Range, TextEdit};
use ropey::Rope;

/// A text buffer backed by a rope data structure.
/// Addresses text by character index or by (line, column) position.
///
/// Lines break at `\n` only, the same model [`Position::advance`] uses.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    rope: Rope,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBuffer {
    /// Creates a new empty text buffer.
    pub fn new() -> Self {
        Self { rope: Rope::new() }
    }

    /// Creates a text buffer from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
        }
    }

    /// Returns the total number of characters in the buffer.
    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    fn len_lines(&self) -> usize {
        self.rope.len_lines()
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    /// Inserts a string at the given character index.
    pub fn insert(&mut self, char_idx: usize, text: &str) {
        let idx = char_idx.min(self.len_chars());
        self.rope.insert(idx, text);
    }

    /// Removes text in the given character range.
    pub fn remove(&mut self, start: usize, end: usize) {
        let start = start.min(self.len_chars());
        let end = end.min(self.len_chars());
        if start < end {
            self.rope.remove(start..end);
        }
    }

    /// Converts a character index to a position.
    pub fn char_to_position(&self, char_idx: usize) -> Position {
        let char_idx = char_idx.min(self.len_chars());
        let line = self.rope.char_to_line(char_idx);
        let line_start = self.rope.line_to_char(line);
        Position::new(line, char_idx - line_start)
    }

    /// Converts a position to a character index.
    /// Columns past the end of a line are clamped to the line end.
    pub fn position_to_char(&self, pos: Position) -> usize {
        if pos.line >= self.len_lines() {
            return self.len_chars();
        }
        let line_start = self.rope.line_to_char(pos.line);
        line_start + pos.col.min(self.line_len_chars(pos.line))
    }

    /// Returns the length of a line in characters (excluding newline).
    pub fn line_len_chars(&self, line: usize) -> usize {
        if line >= self.len_lines() {
            return 0;
        }
        let line_slice = self.rope.line(line);
        let len = line_slice.len_chars();
        // Subtract newline character if present
        if len > 0 && line_slice.char(len - 1) == '\n' {
            return len - 1;
        }
        len
    }

    /// Returns the text covered by a range.
    pub fn text_in(&self, range: Range) -> String {
        let start = self.position_to_char(range.start);
        let end = self.position_to_char(range.end).max(start);
        self.rope.slice(start..end).to_string()
    }

    /// Applies a single edit.
    pub fn apply_edit(&mut self, edit: &TextEdit) {
        let start = self.position_to_char(edit.range.start);
        let end = self.position_to_char(edit.range.end).max(start);
        self.remove(start, end);
        self.insert(start, &edit.new_text);
    }

    /// Applies edits whose ranges all refer to the text before any of them.
    ///
    /// Edits must not overlap. They are applied back to front so that earlier
    /// ranges stay valid.
    pub fn apply_edits(&mut self, edits: &[TextEdit]) {
        let mut ordered: Vec<&TextEdit> = edits.iter().collect();
        ordered.sort_by(|a, b| {
            (b.range.start, b.range.end).cmp(&(a.range.start, a.range.end))
        });
        for edit in ordered {
            self.apply_edit(edit);
        }
    }
}

impl std::fmt::Display for TextBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for chunk in self.rope.chunks() {
            f.write_str(chunk)?;
        }
        Ok(())
    }
}
