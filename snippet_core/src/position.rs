//! Buffer coordinates shared by snippets, sessions and buffers.

/// Represents a position in the buffer as (line, column).
/// Both are 0-indexed; columns count characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }

    /// Returns this position moved by the given deltas, clamped at zero.
    pub fn shifted(self, d_col: isize, d_line: isize) -> Self {
        Self {
            line: self.line.saturating_add_signed(d_line),
            col: self.col.saturating_add_signed(d_col),
        }
    }

    /// Returns the position reached after writing `text` starting here.
    pub fn advance(self, text: &str) -> Self {
        let mut pos = self;
        for ch in text.chars() {
            if ch == '\n' {
                pos.line += 1;
                pos.col = 0;
            } else {
                pos.col += 1;
            }
        }
        pos
    }
}

/// A half-open span between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Shorthand for a range given as raw line/column pairs.
    pub fn from_coords(
        start_line: usize,
        start_col: usize,
        end_line: usize,
        end_col: usize,
    ) -> Self {
        Self {
            start: Position::new(start_line, start_col),
            end: Position::new(end_line, end_col),
        }
    }

    /// Creates a zero-width range at the given position.
    pub fn empty(pos: Position) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    /// Returns true if the position lies within the range, ends included.
    pub fn contains(&self, pos: Position) -> bool {
        self.start <= pos && pos <= self.end
    }

    /// Returns true if `other` lies entirely within this range.
    pub fn contains_range(&self, other: &Range) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// A replacement of `range` with `new_text`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextEdit {
    pub range: Range,
    pub new_text: String,
}

impl TextEdit {
    pub fn new(range: Range, new_text: impl Into<String>) -> Self {
        Self {
            range,
            new_text: new_text.into(),
        }
    }

    /// Creates an edit inserting text at a position.
    pub fn insert(pos: Position, text: impl Into<String>) -> Self {
        Self::new(Range::empty(pos), text)
    }

    /// Creates an edit removing a range.
    pub fn delete(range: Range) -> Self {
        Self::new(range, String::new())
    }

    /// Returns where `pos` ends up once this edit is applied.
    ///
    /// Only positions at or after the end of the edited range move; positions
    /// before the range are returned unchanged.
    pub fn transform_position(&self, pos: Position) -> Position {
        let Range { start, end } = self.range;
        if pos < end {
            return pos;
        }
        let inserted_end = start.advance(&self.new_text);
        if pos.line == end.line {
            Position::new(inserted_end.line, inserted_end.col + (pos.col - end.col))
        } else {
            Position::new(pos.line - end.line + inserted_end.line, pos.col)
        }
    }
}

/// Returns the character offset of `pos` inside `text`, where `text` is
/// written starting at `origin`. Returns `None` if `pos` is not inside it.
pub fn offset_in_text(text: &str, origin: Position, pos: Position) -> Option<usize> {
    let mut cursor = origin;
    for (offset, ch) in text.chars().enumerate() {
        if cursor == pos {
            return Some(offset);
        }
        if ch == '\n' {
            cursor.line += 1;
            cursor.col = 0;
        } else {
            cursor.col += 1;
        }
    }
    (cursor == pos).then(|| text.chars().count())
}

/// Returns the byte index of the `char_idx`-th character of `text`,
/// or the length of `text` if it has fewer characters.
pub fn byte_index(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map_or(text.len(), |(idx, _)| idx)
}
