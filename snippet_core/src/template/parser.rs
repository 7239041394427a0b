//! Recursive-descent parser for the TextMate snippet dialect.

use super::transform::Transform;
use super::{Node, TabStop, Variable};
use crate::error::ParseError;

/// Parses a template string into its top-level nodes.
pub fn parse(text: &str) -> Result<Vec<Node>, ParseError> {
    let mut parser = Parser {
        chars: text.chars().collect(),
        pos: 0,
    };
    parser.parse_nodes(None)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn expect(&mut self, expected: char, open: usize) -> Result<(), ParseError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(ParseError::new(
                open,
                format!("expected '{}' at offset {}", expected, self.pos),
            ))
        }
    }

    /// Parses nodes until the end of input, or until the `}` closing the
    /// group opened at `open`. The closing brace is left for the caller.
    fn parse_nodes(&mut self, open: Option<usize>) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();
        let mut text = String::new();

        while let Some(ch) = self.peek() {
            match ch {
                '\\' => match self.peek_at(1) {
                    Some(next @ ('$' | '}' | '\\')) => {
                        text.push(next);
                        self.pos += 2;
                    }
                    _ => {
                        text.push('\\');
                        self.pos += 1;
                    }
                },
                '}' if open.is_some() => {
                    flush_text(&mut text, &mut nodes);
                    return Ok(nodes);
                }
                '$' => match self.parse_dollar()? {
                    Some(node) => {
                        flush_text(&mut text, &mut nodes);
                        nodes.push(node);
                    }
                    None => {
                        text.push('$');
                        self.pos += 1;
                    }
                },
                _ => {
                    text.push(ch);
                    self.pos += 1;
                }
            }
        }

        if let Some(open) = open {
            return Err(ParseError::new(open, "unterminated '${'"));
        }
        flush_text(&mut text, &mut nodes);
        Ok(nodes)
    }

    /// Parses a construct starting at `$`. Returns `None` when the dollar
    /// sign is literal text.
    fn parse_dollar(&mut self) -> Result<Option<Node>, ParseError> {
        let open = self.pos;
        match self.peek_at(1) {
            Some(c) if c.is_ascii_digit() => {
                self.pos += 1;
                let index = self.read_index(open)?;
                Ok(Some(Node::TabStop(TabStop::new(index))))
            }
            Some(c) if is_name_start(c) => {
                self.pos += 1;
                let name = self.read_name();
                Ok(Some(Node::Variable(Variable::new(name))))
            }
            Some('{') => {
                self.pos += 2;
                match self.peek() {
                    Some(c) if c.is_ascii_digit() => {
                        let index = self.read_index(open)?;
                        self.parse_tabstop_body(index, open).map(Some)
                    }
                    Some(c) if is_name_start(c) => {
                        let name = self.read_name();
                        self.parse_variable_body(name, open).map(Some)
                    }
                    _ => Err(ParseError::new(
                        open,
                        "expected tabstop index or variable name after '${'",
                    )),
                }
            }
            _ => Ok(None),
        }
    }

    fn parse_tabstop_body(&mut self, index: u32, open: usize) -> Result<Node, ParseError> {
        let mut tabstop = TabStop::new(index);
        match self.peek() {
            Some('}') => {
                self.pos += 1;
            }
            Some(':') => {
                self.pos += 1;
                tabstop.children = self.parse_nodes(Some(open))?;
                self.expect('}', open)?;
            }
            Some('|') => {
                self.pos += 1;
                let options = self.parse_choice(open)?;
                tabstop.children = options
                    .first()
                    .filter(|first| !first.is_empty())
                    .map(|first| vec![Node::Text(first.clone())])
                    .unwrap_or_default();
                tabstop.choice = Some(options);
            }
            Some('/') => {
                self.pos += 1;
                tabstop.transform = Some(self.parse_transform(open)?);
            }
            _ => {
                return Err(ParseError::new(
                    open,
                    "expected '}', ':', '|' or '/' after tabstop index",
                ))
            }
        }
        Ok(Node::TabStop(tabstop))
    }

    fn parse_variable_body(&mut self, name: String, open: usize) -> Result<Node, ParseError> {
        let mut variable = Variable::new(name);
        match self.peek() {
            Some('}') => {
                self.pos += 1;
            }
            Some(':') => {
                self.pos += 1;
                variable.children = self.parse_nodes(Some(open))?;
                self.expect('}', open)?;
            }
            Some('/') => {
                self.pos += 1;
                variable.transform = Some(self.parse_transform(open)?);
            }
            _ => {
                return Err(ParseError::new(
                    open,
                    "expected '}', ':' or '/' after variable name",
                ))
            }
        }
        Ok(Node::Variable(variable))
    }

    /// Parses `a,b,c|}` after the opening `|`.
    fn parse_choice(&mut self, open: usize) -> Result<Vec<String>, ParseError> {
        let mut options = Vec::new();
        let mut current = String::new();
        loop {
            match self.peek() {
                Some('\\') => match self.peek_at(1) {
                    Some(next @ (',' | '|' | '\\' | '$' | '}')) => {
                        current.push(next);
                        self.pos += 2;
                    }
                    _ => {
                        current.push('\\');
                        self.pos += 1;
                    }
                },
                Some(',') => {
                    options.push(std::mem::take(&mut current));
                    self.pos += 1;
                }
                Some('|') => {
                    options.push(current);
                    self.pos += 1;
                    self.expect('}', open)?;
                    return Ok(options);
                }
                Some(ch) => {
                    current.push(ch);
                    self.pos += 1;
                }
                None => return Err(ParseError::new(open, "unterminated choice")),
            }
        }
    }

    /// Parses `regex/format/flags}` after the first `/`.
    fn parse_transform(&mut self, open: usize) -> Result<Transform, ParseError> {
        let pattern = self.read_transform_part(open, true)?;
        let format = self.read_transform_part(open, false)?;
        let mut flags = String::new();
        loop {
            match self.peek() {
                Some('}') => {
                    self.pos += 1;
                    break;
                }
                Some(ch) => {
                    flags.push(ch);
                    self.pos += 1;
                }
                None => return Err(ParseError::new(open, "unterminated transform")),
            }
        }
        Transform::new(&pattern, &format, &flags).map_err(|message| ParseError::new(open, message))
    }

    /// Reads up to the next unescaped `/` and consumes it. In the regex part
    /// `\/` becomes `/` and other escapes are kept for the regex engine; the
    /// format part keeps every escape for the format parser.
    fn read_transform_part(&mut self, open: usize, is_regex: bool) -> Result<String, ParseError> {
        let mut part = String::new();
        // Format groups like `${1:/upcase}` may contain a bare `/`.
        let mut depth = 0usize;
        loop {
            match self.peek() {
                Some('$') if !is_regex && self.peek_at(1) == Some('{') => {
                    part.push_str("${");
                    depth += 1;
                    self.pos += 2;
                }
                Some('}') if depth > 0 => {
                    part.push('}');
                    depth -= 1;
                    self.pos += 1;
                }
                Some('\\') => {
                    match self.peek_at(1) {
                        Some('/') if is_regex => part.push('/'),
                        Some(next) => {
                            part.push('\\');
                            part.push(next);
                        }
                        None => return Err(ParseError::new(open, "unterminated transform")),
                    }
                    self.pos += 2;
                }
                Some('/') if depth == 0 => {
                    self.pos += 1;
                    return Ok(part);
                }
                Some(ch) => {
                    part.push(ch);
                    self.pos += 1;
                }
                None => return Err(ParseError::new(open, "unterminated transform")),
            }
        }
    }

    fn read_index(&mut self, open: usize) -> Result<u32, ParseError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        digits
            .parse()
            .map_err(|_| ParseError::new(open, format!("tabstop index '{}' is too large", digits)))
    }

    fn read_name(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|c| c == '_' || c.is_ascii_alphanumeric()) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }
}

fn is_name_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

fn flush_text(text: &mut String, nodes: &mut Vec<Node>) {
    if !text.is_empty() {
        nodes.push(Node::Text(std::mem::take(text)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tabstop(node: &Node) -> &TabStop {
        match node {
            Node::TabStop(ts) => ts,
            other => panic!("expected tabstop, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_text() {
        let nodes = parse("hello world").unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(matches!(&nodes[0], Node::Text(t) if t == "hello world"));
    }

    #[test]
    fn test_tabstop_forms() {
        let nodes = parse("$1 ${2} ${3:foo}").unwrap();
        assert_eq!(nodes.len(), 5);
        assert_eq!(tabstop(&nodes[0]).index, 1);
        assert_eq!(tabstop(&nodes[2]).index, 2);
        let third = tabstop(&nodes[4]);
        assert_eq!(third.index, 3);
        assert!(matches!(&third.children[0], Node::Text(t) if t == "foo"));
    }

    #[test]
    fn test_nested_placeholders() {
        let nodes = parse("${1:outer ${2:inner}}").unwrap();
        let outer = tabstop(&nodes[0]);
        assert_eq!(outer.children.len(), 2);
        assert_eq!(tabstop(&outer.children[1]).index, 2);
    }

    #[test]
    fn test_choice() {
        let nodes = parse("${1|one,two\\,three,four|}").unwrap();
        let choice = tabstop(&nodes[0]);
        assert_eq!(
            choice.choice.as_deref(),
            Some(&["one".to_string(), "two,three".to_string(), "four".to_string()][..])
        );
        assert!(matches!(&choice.children[0], Node::Text(t) if t == "one"));
    }

    #[test]
    fn test_transform() {
        let nodes = parse("${1/(.*)/${1:/upcase}!/g}").unwrap();
        let ts = tabstop(&nodes[0]);
        let transform = ts.transform.as_ref().unwrap();
        assert!(transform.is_global());
        assert_eq!(transform.format().len(), 2);

        let nodes = parse("${1/.*/x\\/y/i}").unwrap();
        let transform = tabstop(&nodes[0]).transform.as_ref().unwrap();
        assert!(!transform.is_global());
        assert_eq!(transform.apply("Q"), "x/y");
    }

    #[test]
    fn test_transform_escaped_slash_in_regex() {
        let nodes = parse("${1/a\\/b/x/}").unwrap();
        let transform = tabstop(&nodes[0]).transform.as_ref().unwrap();
        assert_eq!(transform.apply("a/b"), "x");
    }

    #[test]
    fn test_variables() {
        let nodes = parse("$TM_FILENAME ${USER} ${HOME:~} ${NAME/(.*)/${1:/upcase}/}").unwrap();
        let names: Vec<&str> = nodes
            .iter()
            .filter_map(|n| match n {
                Node::Variable(v) => Some(v.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["TM_FILENAME", "USER", "HOME", "NAME"]);
    }

    #[test]
    fn test_escapes_and_literal_dollar() {
        let nodes = parse("\\$1 costs $ 5 \\} \\x").unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(matches!(&nodes[0], Node::Text(t) if t == "$1 costs $ 5 } \\x"));
    }

    #[test]
    fn test_unbalanced_brace_outside_group_is_text() {
        let nodes = parse("fn() {}").unwrap();
        assert!(matches!(&nodes[0], Node::Text(t) if t == "fn() {}"));
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse("ab${1:foo").unwrap_err().offset, 2);
        assert!(parse("${").is_err());
        assert!(parse("${1|a,b").is_err());
        assert!(parse("${1/(/x/}").is_err());
        assert!(parse("${1/a/b/z}").is_err());
        assert!(parse("${1#}").is_err());
        assert!(parse("${99999999999}").is_err());
    }
}
