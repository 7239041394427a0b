//! Snippet Core - TextMate-style snippets for a text buffer.
//!
//! This crate parses snippet templates, expands them into a buffer and keeps
//! their tabstops, mirrors and transforms in sync as the buffer is edited.
//! It has no dependencies on windowing, rendering or editor protocols.

pub mod buffer;
pub mod error;
pub mod position;
pub mod resolver;
pub mod session;
pub mod snippet;
pub mod template;

pub use buffer::TextBuffer;
pub use error::{ParseError, Result, SnippetError};
pub use position::{Position, Range, TextEdit};
pub use resolver::{FnResolver, VariableResolver};
pub use session::{SessionConfig, SnippetSession};
pub use snippet::{EditLocation, Snippet, SnippetId, SnippetPlaceholder};
pub use template::Template;
