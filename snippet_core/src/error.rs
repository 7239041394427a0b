//! Error types for snippet parsing and editing.

use crate::position::{Range, TextEdit};
use thiserror::Error;

/// A malformed template string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid snippet at offset {offset}: {message}")]
pub struct ParseError {
    /// Character offset in the template where parsing failed.
    pub offset: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnippetError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The edit range is not contained in the target placeholder.
    #[error("edit {edit:?} lies outside placeholder range {placeholder:?}")]
    EditOutOfRange { edit: Range, placeholder: Range },

    #[error("placeholder belongs to a different snippet")]
    ForeignPlaceholder,

    /// The view was taken before the last mutation and must be re-fetched.
    #[error("placeholder {id} is stale")]
    StalePlaceholder { id: usize },

    #[error("placeholder {id} is a transform and cannot be edited")]
    ReadOnlyPlaceholder { id: usize },

    #[error("edit {:?} overlaps snippet content", edit.range)]
    EditOverlapsSnippet { edit: TextEdit },

    #[error("'{option}' is not a choice of the current placeholder")]
    UnknownChoice { option: String },

    #[error("no active placeholder")]
    NoActivePlaceholder,
}

pub type Result<T> = std::result::Result<T, SnippetError>;
