//! End-to-end snippet sessions over a text buffer.

use pretty_assertions::assert_eq;
use snippet_core::{Position, Range, SessionConfig, SnippetSession, TextBuffer, TextEdit};
use std::collections::HashMap;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// The buffer text under the snippet must match what the snippet renders.
fn assert_in_sync(session: &SnippetSession) {
    let snippet = session.snippet().expect("snippet should be active");
    assert_eq!(
        session.buffer().text_in(snippet.range()),
        snippet.to_string()
    );
}

fn current_index(session: &SnippetSession) -> u32 {
    session.current_placeholder().unwrap().index
}

#[test]
fn test_mirror_follows_typing_across_lines() {
    init();
    let mut session = SnippetSession::new(TextBuffer::from_str("fn main() {\n\n}"));
    session
        .start(Position::new(1, 0), "let ${1:x} = 1;\nprint($1);", None)
        .unwrap();
    assert_eq!(
        session.buffer().to_string(),
        "fn main() {\nlet x = 1;\nprint(x);\n}"
    );

    session
        .apply_edit(&TextEdit::new(Range::from_coords(1, 4, 1, 5), "value"))
        .unwrap();
    assert_eq!(
        session.buffer().to_string(),
        "fn main() {\nlet value = 1;\nprint(value);\n}"
    );
    assert_in_sync(&session);
}

#[test]
fn test_typing_into_empty_tabstop() {
    init();
    let mut session = SnippetSession::new(TextBuffer::new());
    session.start(Position::new(0, 0), "$1-$1", None).unwrap();
    assert_eq!(session.buffer().to_string(), "-");

    session
        .apply_edit(&TextEdit::insert(Position::new(0, 0), "a"))
        .unwrap();
    session
        .apply_edit(&TextEdit::insert(Position::new(0, 1), "b"))
        .unwrap();
    assert_eq!(session.buffer().to_string(), "ab-ab");
    assert_in_sync(&session);
}

#[test]
fn test_transform_updates_with_primary() {
    init();
    let mut session = SnippetSession::new(TextBuffer::new());
    session
        .start(Position::new(0, 0), "${1:name} ${1/(.*)/${1:/upcase}/}", None)
        .unwrap();
    assert_eq!(session.buffer().to_string(), "name NAME");

    session
        .apply_edit(&TextEdit::new(Range::from_coords(0, 0, 0, 4), "id"))
        .unwrap();
    assert_eq!(session.buffer().to_string(), "id ID");
    assert_in_sync(&session);
}

#[test]
fn test_edit_before_snippet_moves_it() {
    init();
    let mut session = SnippetSession::new(TextBuffer::from_str("abc"));
    session.start(Position::new(0, 3), "${1:x}", None).unwrap();

    session
        .apply_edit(&TextEdit::insert(Position::new(0, 0), "\n"))
        .unwrap();
    assert_eq!(session.buffer().to_string(), "\nabcx");
    assert_eq!(
        session.current_placeholder().unwrap().range,
        Range::from_coords(1, 3, 1, 4)
    );
    assert_in_sync(&session);
}

#[test]
fn test_edit_after_snippet_leaves_it() {
    init();
    let mut session = SnippetSession::new(TextBuffer::from_str("abc\n"));
    session.start(Position::new(0, 0), "${1:x}", None).unwrap();

    session
        .apply_edit(&TextEdit::insert(Position::new(1, 0), "z"))
        .unwrap();
    assert_eq!(session.buffer().to_string(), "xabc\nz");
    assert!(session.is_active());
    assert_in_sync(&session);
}

#[test]
fn test_overlapping_edit_finishes_session() {
    init();
    let mut session = SnippetSession::new(TextBuffer::new());
    session.start(Position::new(0, 0), "x${1:a}y", None).unwrap();

    session
        .apply_edit(&TextEdit::delete(Range::from_coords(0, 0, 0, 2)))
        .unwrap();
    assert!(!session.is_active());
    assert_eq!(session.buffer().to_string(), "y");
}

#[test]
fn test_nested_snippet_navigation() {
    init();
    let mut session = SnippetSession::new(TextBuffer::new());
    session
        .start(Position::new(0, 0), "call(${1:arg})$0", None)
        .unwrap();
    assert_eq!(current_index(&session), 1);

    assert!(session
        .start(Position::new(0, 8), "${1:x}, ${2:y}", None)
        .unwrap());
    assert_eq!(session.buffer().to_string(), "call(argx, y)");
    assert_in_sync(&session);

    let current = session.current_placeholder().unwrap();
    assert_eq!(current.index, 2);
    assert_eq!(current.value, "x");

    let visited: Vec<u32> = std::iter::from_fn(|| session.next_placeholder())
        .map(|p| p.index)
        .collect();
    assert_eq!(visited, vec![3, 4, 0]);
    assert!(!session.is_active());
}

#[test]
fn test_navigation_back_from_final() {
    init();
    let config = SessionConfig {
        finish_on_final: false,
        ..SessionConfig::default()
    };
    let mut session = SnippetSession::with_config(TextBuffer::new(), config);
    session
        .start(Position::new(0, 0), "${1:a} ${2:b}", None)
        .unwrap();

    assert_eq!(session.next_placeholder().unwrap().index, 2);
    assert!(session.next_placeholder().unwrap().is_final_tabstop);
    assert!(session.is_active());

    assert_eq!(session.prev_placeholder().unwrap().index, 2);
    assert_eq!(session.prev_placeholder().unwrap().index, 1);
    assert!(session.prev_placeholder().is_none());
    assert_eq!(current_index(&session), 1);
}

#[test]
fn test_expanding_elsewhere_replaces_session() {
    init();
    let config = SessionConfig {
        allow_nested: false,
        ..SessionConfig::default()
    };
    let mut session = SnippetSession::with_config(TextBuffer::new(), config);
    session.start(Position::new(0, 0), "${1:a}", None).unwrap();
    let first = session.snippet().unwrap().id();

    session.start(Position::new(0, 0), "${1:b}", None).unwrap();
    assert_eq!(session.buffer().to_string(), "ba");
    assert_ne!(session.snippet().unwrap().id(), first);
    assert_eq!(session.current_placeholder().unwrap().value, "b");
}

#[test]
fn test_variables_resolve_on_start() {
    init();
    let mut vars = HashMap::new();
    vars.insert("TM_FILENAME".to_string(), "main.rs".to_string());

    let mut session = SnippetSession::new(TextBuffer::new());
    session
        .start(Position::new(0, 0), "// ${TM_FILENAME} ${UNKNOWN}", Some(&vars))
        .unwrap();
    assert_eq!(session.buffer().to_string(), "// main.rs UNKNOWN");

    let current = session.current_placeholder().unwrap();
    assert_eq!(current.index, 1);
    assert_eq!(current.range, Range::from_coords(0, 11, 0, 18));
}

#[test]
fn test_final_inside_edited_placeholder_still_ends_session() {
    init();
    let mut session = SnippetSession::new(TextBuffer::new());
    session.start(Position::new(0, 0), "${1:a $0}", None).unwrap();

    session
        .apply_edit(&TextEdit::new(Range::from_coords(0, 0, 0, 1), "b"))
        .unwrap();
    assert_eq!(session.buffer().to_string(), "b ");
    assert_in_sync(&session);

    let last = session.next_placeholder().unwrap();
    assert!(last.is_final_tabstop);
    assert_eq!(last.range, Range::from_coords(0, 2, 0, 2));
    assert!(!session.is_active());
}
