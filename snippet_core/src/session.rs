//! Snippet sessions: a buffer with at most one active snippet.
//!
//! The session routes every buffer edit through the snippet so that
//! placeholder ranges and mirrors stay in sync with the buffer text.

use crate::buffer::TextBuffer;
use crate::error::{Result, SnippetError};
use crate::position::{Position, TextEdit};
use crate::resolver::VariableResolver;
use crate::snippet::{EditLocation, Snippet, SnippetPlaceholder};

/// Session behavior switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Expanding a snippet inside the current placeholder nests it in the
    /// active snippet instead of replacing the session.
    pub allow_nested: bool,
    /// Reaching the final tabstop ends the session.
    pub finish_on_final: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            allow_nested: true,
            finish_on_final: true,
        }
    }
}

#[derive(Debug)]
pub struct SnippetSession {
    buffer: TextBuffer,
    snippet: Option<Snippet>,
    /// Id of the selected placeholder.
    current: Option<usize>,
    config: SessionConfig,
}

impl SnippetSession {
    /// Creates a session over a buffer with the default configuration.
    pub fn new(buffer: TextBuffer) -> Self {
        Self::with_config(buffer, SessionConfig::default())
    }

    pub fn with_config(buffer: TextBuffer, config: SessionConfig) -> Self {
        Self {
            buffer,
            snippet: None,
            current: None,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Enables or disables nested expansion.
    pub fn set_allow_nested(&mut self, allow: bool) {
        self.config.allow_nested = allow;
    }

    /// Sets whether reaching the final tabstop ends the session.
    pub fn set_finish_on_final(&mut self, finish: bool) {
        self.config.finish_on_final = finish;
    }

    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    pub fn snippet(&self) -> Option<&Snippet> {
        self.snippet.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.snippet.is_some()
    }

    /// The selected placeholder, if a snippet is active.
    pub fn current_placeholder(&self) -> Option<&SnippetPlaceholder> {
        self.snippet.as_ref()?.get_placeholder_by_id(self.current?)
    }

    /// Expands `text` at `position` and selects its first placeholder.
    ///
    /// Inside the current placeholder of an active snippet the new snippet is
    /// nested; anywhere else it replaces the active one. Returns whether a
    /// snippet is active afterwards.
    pub fn start(
        &mut self,
        position: Position,
        text: &str,
        resolver: Option<&dyn VariableResolver>,
    ) -> Result<bool> {
        if self.config.allow_nested {
            let host = self
                .current_placeholder()
                .filter(|p| !p.is_transform && p.range.contains(position))
                .cloned();
            if let Some(host) = host {
                return self.start_nested(&host, position, text, resolver);
            }
        }

        let snippet = Snippet::new(position, text, resolver)?;
        self.finish();
        self.buffer
            .apply_edit(&TextEdit::insert(position, snippet.to_string()));
        log::debug!("expanded snippet at {:?}: {:?}", position, snippet.range());

        if snippet.is_plain_text() {
            return Ok(false);
        }
        self.current = snippet.first_placeholder().map(|p| p.id);
        self.snippet = Some(snippet);
        Ok(true)
    }

    fn start_nested(
        &mut self,
        host: &SnippetPlaceholder,
        position: Position,
        text: &str,
        resolver: Option<&dyn VariableResolver>,
    ) -> Result<bool> {
        let snippet = self.snippet.as_mut().ok_or(SnippetError::NoActivePlaceholder)?;
        let old_range = snippet.range();
        let inserted = snippet.insert_snippet(host, text, position, resolver)?;
        self.buffer
            .apply_edit(&TextEdit::new(old_range, snippet.to_string()));
        self.current = inserted.or_else(|| snippet.get_placeholder(host.index).map(|p| p.id));
        Ok(true)
    }

    /// Applies a buffer edit, keeping the active snippet consistent.
    ///
    /// Edits before the snippet move it, edits inside a placeholder update
    /// the placeholder and its mirrors, and edits that cut across snippet
    /// text end the session.
    pub fn apply_edit(&mut self, edit: &TextEdit) -> Result<()> {
        let preferred = self
            .current_placeholder()
            .filter(|p| !p.is_transform && p.range.contains_range(&edit.range))
            .map(|p| p.id);
        let Some(snippet) = self.snippet.as_mut() else {
            self.buffer.apply_edit(edit);
            return Ok(());
        };
        let location = match preferred {
            Some(id) => EditLocation::Inside(id),
            None => snippet.classify_edit(edit),
        };

        match location {
            EditLocation::Before => {
                snippet.adjust_text_edit(edit)?;
                self.buffer.apply_edit(edit);
            }
            EditLocation::After => self.buffer.apply_edit(edit),
            EditLocation::Inside(id) => {
                let placeholder = snippet
                    .get_placeholder_by_id(id)
                    .cloned()
                    .ok_or(SnippetError::StalePlaceholder { id })?;
                if placeholder.is_transform {
                    log::debug!("edit in transform {}, finishing snippet", id);
                    self.finish();
                    self.buffer.apply_edit(edit);
                    return Ok(());
                }
                let mut edits = snippet.apply_targeted_edit(&placeholder, edit)?;
                edits.push(edit.clone());
                self.buffer.apply_edits(&edits);
                self.current = snippet.get_placeholder(placeholder.index).map(|p| p.id);
            }
            EditLocation::Overlapping => {
                log::debug!("edit {:?} overlaps snippet text, finishing snippet", edit.range);
                self.finish();
                self.buffer.apply_edit(edit);
            }
        }
        Ok(())
    }

    /// Selects the next tabstop.
    pub fn next_placeholder(&mut self) -> Option<SnippetPlaceholder> {
        let index = self.current_placeholder()?.index;
        let next = self.snippet.as_ref()?.get_next_placeholder(index)?.clone();
        Some(self.select(next))
    }

    /// Selects the previous tabstop. From the final tabstop this is the
    /// highest numbered one.
    pub fn prev_placeholder(&mut self) -> Option<SnippetPlaceholder> {
        let current = self.current_placeholder()?;
        let snippet = self.snippet.as_ref()?;
        let prev = if current.is_final_tabstop {
            snippet
                .template()
                .max_index()
                .and_then(|index| snippet.get_placeholder(index))
        } else {
            snippet.get_prev_placeholder(current.index)
        };
        let prev = prev?.clone();
        Some(self.select(prev))
    }

    fn select(&mut self, placeholder: SnippetPlaceholder) -> SnippetPlaceholder {
        if placeholder.is_final_tabstop && self.config.finish_on_final {
            self.finish();
        } else {
            self.current = Some(placeholder.id);
        }
        placeholder
    }

    /// Replaces the current placeholder's text with one of its choices.
    pub fn select_choice(&mut self, option: &str) -> Result<()> {
        let current = self
            .current_placeholder()
            .cloned()
            .ok_or(SnippetError::NoActivePlaceholder)?;
        let offered = current
            .choice
            .as_ref()
            .is_some_and(|options| options.iter().any(|o| o == option));
        if !offered {
            return Err(SnippetError::UnknownChoice {
                option: option.to_string(),
            });
        }
        self.apply_edit(&TextEdit::new(current.range, option))
    }

    /// Ends the active snippet, leaving the buffer untouched.
    pub fn finish(&mut self) {
        if self.snippet.take().is_some() {
            log::debug!("snippet session finished");
        }
        self.current = None;
    }
}
