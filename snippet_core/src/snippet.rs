//! Expanded snippets anchored in a buffer.
//!
//! A [`Snippet`] owns a parsed [`Template`] and the buffer position of its
//! first character. After every change it rebuilds the full list of
//! [`SnippetPlaceholder`] views, each carrying an absolute buffer range.

use crate::error::{Result, SnippetError};
use crate::position::{byte_index, offset_in_text, Position, Range, TextEdit};
use crate::resolver::VariableResolver;
use crate::template::Template;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SNIPPET_ID: AtomicU64 = AtomicU64::new(0);

/// Identifies the snippet a placeholder view was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnippetId(u64);

impl SnippetId {
    fn next() -> Self {
        Self(NEXT_SNIPPET_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A placeholder of a snippet at its current buffer location.
///
/// Views are rebuilt after every change to the snippet; `id` is only
/// meaningful until the next mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetPlaceholder {
    /// Tabstop number assigned by the template author.
    pub index: u32,
    /// Position in document order.
    pub id: usize,
    pub range: Range,
    pub value: String,
    pub is_final_tabstop: bool,
    pub is_transform: bool,
    pub choice: Option<Vec<String>>,
    /// The snippet this view belongs to.
    pub snippet: SnippetId,
}

/// Where an edit falls relative to a snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditLocation {
    /// Ends at or before the snippet start.
    Before,
    /// Starts at or after the snippet end.
    After,
    /// Contained in the placeholder with this id.
    Inside(usize),
    /// Touches snippet text outside any single placeholder.
    Overlapping,
}

#[derive(Debug, Clone)]
pub struct Snippet {
    id: SnippetId,
    start: Position,
    template: Template,
    placeholders: Vec<SnippetPlaceholder>,
}

impl Snippet {
    /// Parses `text` and anchors it at `start`. Variables are resolved
    /// before the first placeholder list is built.
    pub fn new(
        start: Position,
        text: &str,
        resolver: Option<&dyn VariableResolver>,
    ) -> Result<Self> {
        let mut template = Template::parse(text)?;
        if let Some(resolver) = resolver {
            template.resolve_variables(resolver);
        }
        let mut snippet = Self {
            id: SnippetId::next(),
            start,
            template,
            placeholders: Vec::new(),
        };
        snippet.update();
        Ok(snippet)
    }

    pub fn id(&self) -> SnippetId {
        self.id
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// The buffer range covered by the rendered snippet.
    pub fn range(&self) -> Range {
        let text = self.template.to_string();
        Range::new(self.start, self.start.advance(&text))
    }

    /// All placeholders in document order.
    pub fn placeholders(&self) -> &[SnippetPlaceholder] {
        &self.placeholders
    }

    /// Rebuilds every placeholder view from the template.
    fn update(&mut self) {
        let rendered = self.template.to_string();
        let start = self.start;
        let to_absolute =
            |offset: usize| start.advance(&rendered[..byte_index(&rendered, offset)]);
        self.placeholders = self
            .template
            .tabstops()
            .into_iter()
            .map(|ts| {
                let len = ts.value.chars().count();
                SnippetPlaceholder {
                    index: ts.index,
                    id: ts.id,
                    range: Range::new(to_absolute(ts.offset), to_absolute(ts.offset + len)),
                    value: ts.value,
                    is_final_tabstop: ts.is_final,
                    is_transform: ts.is_transform,
                    choice: ts.choice,
                    snippet: self.id,
                }
            })
            .collect();
        log::trace!(
            "snippet {:?} at {:?}: {} placeholders",
            self.id,
            self.start,
            self.placeholders.len()
        );
    }

    // -- Lookup --------------------------------------------------------------

    /// The placeholder at the lowest numbered index, or the final tabstop
    /// when there is none.
    pub fn first_placeholder(&self) -> Option<&SnippetPlaceholder> {
        match self.template.min_index() {
            Some(index) => self.get_placeholder(index),
            None => self.final_placeholder(),
        }
    }

    /// The last stop in navigation order: the final tabstop.
    pub fn last_placeholder(&self) -> Option<&SnippetPlaceholder> {
        self.final_placeholder()
            .or_else(|| self.template.max_index().and_then(|index| self.get_placeholder(index)))
    }

    pub fn final_placeholder(&self) -> Option<&SnippetPlaceholder> {
        self.placeholders.iter().find(|p| p.is_final_tabstop)
    }

    /// Returns an occurrence of `index`, preferring one that is not a
    /// transform.
    pub fn get_placeholder(&self, index: u32) -> Option<&SnippetPlaceholder> {
        let mut occurrences = self.placeholders.iter().filter(|p| p.index == index);
        let first = occurrences.next()?;
        if !first.is_transform {
            return Some(first);
        }
        occurrences.find(|p| !p.is_transform).or(Some(first))
    }

    pub fn get_placeholder_by_id(&self, id: usize) -> Option<&SnippetPlaceholder> {
        self.placeholders.get(id)
    }

    /// Steps back to the nearest lower index that has a placeholder.
    /// From index 0 (or the final tabstop's index) this is the final tabstop.
    pub fn get_prev_placeholder(&self, index: u32) -> Option<&SnippetPlaceholder> {
        let final_stop = self.final_placeholder();
        if index == 0 || final_stop.is_some_and(|p| p.index == index) {
            return final_stop;
        }
        self.numbered_indices()
            .into_iter()
            .rev()
            .filter(|&i| i < index)
            .find_map(|i| self.numbered_placeholder(i))
    }

    /// Steps forward to the nearest higher index that has a placeholder;
    /// past the highest index this is the final tabstop. There is nothing
    /// after the final tabstop itself.
    pub fn get_next_placeholder(&self, index: u32) -> Option<&SnippetPlaceholder> {
        let final_stop = self.final_placeholder();
        if final_stop.is_some_and(|p| p.index == index) {
            return None;
        }
        self.numbered_indices()
            .into_iter()
            .filter(|&i| i > index)
            .find_map(|i| self.numbered_placeholder(i))
            .or(final_stop)
    }

    /// Distinct indices of the non-final placeholders, ascending.
    fn numbered_indices(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = self
            .placeholders
            .iter()
            .filter(|p| !p.is_final_tabstop)
            .map(|p| p.index)
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    fn numbered_placeholder(&self, index: u32) -> Option<&SnippetPlaceholder> {
        self.get_placeholder(index).filter(|p| !p.is_final_tabstop)
    }

    /// The first placeholder, in document order, that contains `range`.
    pub fn get_placeholder_by_range(&self, range: &Range) -> Option<&SnippetPlaceholder> {
        self.placeholders.iter().find(|p| p.range.contains_range(range))
    }

    /// True when nothing but the final tabstop is left to visit.
    pub fn is_plain_text(&self) -> bool {
        self.placeholders.iter().all(|p| p.is_final_tabstop)
    }

    /// Decides how an edit relates to this snippet.
    pub fn classify_edit(&self, edit: &TextEdit) -> EditLocation {
        let range = self.range();
        if let Some(p) = self.get_placeholder_by_range(&edit.range) {
            return EditLocation::Inside(p.id);
        }
        if edit.range.end <= range.start {
            EditLocation::Before
        } else if edit.range.start >= range.end {
            EditLocation::After
        } else {
            EditLocation::Overlapping
        }
    }

    // -- Mutation ------------------------------------------------------------

    /// Checks that a view was taken from this snippet since its last change.
    fn current_view(&self, placeholder: &SnippetPlaceholder) -> Result<&SnippetPlaceholder> {
        if placeholder.snippet != self.id {
            return Err(SnippetError::ForeignPlaceholder);
        }
        match self.placeholders.get(placeholder.id) {
            Some(current) if current == placeholder => Ok(current),
            _ => Err(SnippetError::StalePlaceholder { id: placeholder.id }),
        }
    }

    /// Applies an edit made inside `placeholder` to the template.
    ///
    /// Returns edits, in buffer coordinates from before the change, that bring
    /// the mirrors and transforms of the placeholder up to date. They must be
    /// applied to the buffer together with `edit`.
    pub fn apply_targeted_edit(
        &mut self,
        placeholder: &SnippetPlaceholder,
        edit: &TextEdit,
    ) -> Result<Vec<TextEdit>> {
        let current = self.current_view(placeholder)?;
        if current.is_transform {
            return Err(SnippetError::ReadOnlyPlaceholder { id: current.id });
        }
        let out_of_range = || SnippetError::EditOutOfRange {
            edit: edit.range,
            placeholder: current.range,
        };
        if !current.range.contains_range(&edit.range) {
            return Err(out_of_range());
        }
        let value = &current.value;
        let start = offset_in_text(value, current.range.start, edit.range.start)
            .ok_or_else(out_of_range)?;
        let end = offset_in_text(value, current.range.start, edit.range.end)
            .ok_or_else(out_of_range)?;

        let mut new_value = String::with_capacity(value.len() + edit.new_text.len());
        new_value.push_str(&value[..byte_index(value, start)]);
        new_value.push_str(&edit.new_text);
        new_value.push_str(&value[byte_index(value, end)..]);

        let id = current.id;
        log::debug!("placeholder {} ({:?}) -> {:?}", id, current.value, new_value);
        let changes = self
            .template
            .set_placeholder_value(id, &new_value)
            .ok_or(SnippetError::StalePlaceholder { id })?;

        let previous = std::mem::take(&mut self.placeholders);
        self.update();

        let edits: Vec<TextEdit> = changes
            .into_iter()
            .filter_map(|(old_id, text)| {
                let old = previous.get(old_id)?;
                (old.value != text).then(|| TextEdit::new(old.range, text))
            })
            .collect();
        if !edits.is_empty() {
            log::debug!("placeholder {} updated {} mirrors", id, edits.len());
        }
        Ok(edits)
    }

    /// Expands `text` as a nested snippet inside `placeholder` at `position`.
    ///
    /// When the next placeholder starts exactly at `position`, the nested
    /// snippet's final tabstop is not kept as a stop. Returns the id of the
    /// first inserted placeholder, if the nested snippet has any.
    pub fn insert_snippet(
        &mut self,
        placeholder: &SnippetPlaceholder,
        text: &str,
        position: Position,
        resolver: Option<&dyn VariableResolver>,
    ) -> Result<Option<usize>> {
        let current = self.current_view(placeholder)?;
        if current.is_transform {
            return Err(SnippetError::ReadOnlyPlaceholder { id: current.id });
        }
        let offset = offset_in_text(&current.value, current.range.start, position).ok_or(
            SnippetError::EditOutOfRange {
                edit: Range::empty(position),
                placeholder: current.range,
            },
        )?;
        let adjacent_next = self
            .placeholders
            .get(current.id + 1)
            .is_some_and(|next| next.range.start == position);
        let id = current.id;

        let mut child = Template::parse(text)?;
        if let Some(resolver) = resolver {
            child.resolve_variables(resolver);
        }
        log::debug!(
            "nesting {:?} in placeholder {} at offset {} (keep final: {})",
            text,
            id,
            offset,
            !adjacent_next
        );
        let first_index = self
            .template
            .insert_template(id, offset, child, !adjacent_next);
        self.update();
        Ok(first_index.and_then(|index| self.get_placeholder(index)).map(|p| p.id))
    }

    /// Moves the snippet by the given deltas.
    pub fn adjust_position(&mut self, d_col: isize, d_line: isize) {
        self.start = self.start.shifted(d_col, d_line);
        self.update();
    }

    /// Moves the snippet to account for an edit made before it.
    ///
    /// Returns `Ok(false)` if the snippet did not move, and fails with
    /// [`SnippetError::EditOverlapsSnippet`] if the edit touches snippet
    /// text; such edits must go through [`Snippet::apply_targeted_edit`].
    pub fn adjust_text_edit(&mut self, edit: &TextEdit) -> Result<bool> {
        match self.classify_edit(edit) {
            EditLocation::Before => {
                let moved = edit.transform_position(self.start);
                let d_line = moved.line as isize - self.start.line as isize;
                let d_col = moved.col as isize - self.start.col as isize;
                if d_line == 0 && d_col == 0 {
                    return Ok(false);
                }
                self.adjust_position(d_col, d_line);
                Ok(true)
            }
            EditLocation::After => Ok(false),
            EditLocation::Inside(_) | EditLocation::Overlapping => {
                Err(SnippetError::EditOverlapsSnippet { edit: edit.clone() })
            }
        }
    }
}

impl fmt::Display for Snippet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.template, f)
    }
}
