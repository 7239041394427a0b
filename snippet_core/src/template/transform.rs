//! Regex transforms: `${1/regex/format/flags}`.

use regex::{Captures, Regex, RegexBuilder};

/// Case conversion applied to a capture group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseChange {
    Upcase,
    Downcase,
    Capitalize,
    CamelCase,
    PascalCase,
}

impl CaseChange {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "upcase" => Some(Self::Upcase),
            "downcase" => Some(Self::Downcase),
            "capitalize" => Some(Self::Capitalize),
            "camelcase" => Some(Self::CamelCase),
            "pascalcase" => Some(Self::PascalCase),
            _ => None,
        }
    }

    fn apply(self, text: &str) -> String {
        match self {
            Self::Upcase => text.to_uppercase(),
            Self::Downcase => text.to_lowercase(),
            Self::Capitalize => capitalize(text),
            Self::CamelCase => words(text)
                .enumerate()
                .map(|(i, word)| if i == 0 { decapitalize(word) } else { capitalize(word) })
                .collect(),
            Self::PascalCase => words(text).map(capitalize).collect(),
        }
    }
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty())
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn decapitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// One piece of a format string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatItem {
    Text(String),
    /// `$n`, `${n}`, `${n:/upcase}`, `&` (group 0).
    Group { index: usize, case: Option<CaseChange> },
    /// `${n:+if}`, `${n:-else}`, `${n:else}`, `${n:?if:else}`.
    Conditional {
        index: usize,
        if_set: String,
        if_unset: String,
    },
}

/// A compiled regex substitution.
#[derive(Debug, Clone)]
pub struct Transform {
    regex: Regex,
    format: Vec<FormatItem>,
    global: bool,
}

impl Transform {
    /// Compiles a transform from its three parts. The error message does not
    /// carry an offset; the template parser adds it.
    pub fn new(pattern: &str, format: &str, flags: &str) -> Result<Self, String> {
        let mut builder = RegexBuilder::new(pattern);
        let mut global = false;
        for flag in flags.chars() {
            match flag {
                'g' => global = true,
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'u' => {}
                other => return Err(format!("unknown transform flag '{}'", other)),
            }
        }
        let regex = builder
            .build()
            .map_err(|e| format!("invalid transform regex: {}", e))?;
        Ok(Self {
            regex,
            format: parse_format(format)?,
            global,
        })
    }

    pub fn format(&self) -> &[FormatItem] {
        &self.format
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    /// Rewrites `value`. Unmatched text is kept; without the `g` flag only
    /// the first match is replaced.
    pub fn apply(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        let mut last = 0;
        for caps in self.regex.captures_iter(value) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&value[last..whole.start()]);
            self.expand(&caps, &mut out);
            last = whole.end();
            if !self.global {
                break;
            }
        }
        out.push_str(&value[last..]);
        out
    }

    fn expand(&self, caps: &Captures<'_>, out: &mut String) {
        let group = |index: usize| caps.get(index).map_or("", |m| m.as_str());
        for item in &self.format {
            match item {
                FormatItem::Text(text) => out.push_str(text),
                FormatItem::Group { index, case } => {
                    let text = group(*index);
                    match case {
                        Some(case) => out.push_str(&case.apply(text)),
                        None => out.push_str(text),
                    }
                }
                FormatItem::Conditional {
                    index,
                    if_set,
                    if_unset,
                } => {
                    if group(*index).is_empty() {
                        out.push_str(if_unset);
                    } else {
                        out.push_str(if_set);
                    }
                }
            }
        }
    }
}

/// Parses the format part of a transform.
fn parse_format(format: &str) -> Result<Vec<FormatItem>, String> {
    let chars: Vec<char> = format.chars().collect();
    let mut items = Vec::new();
    let mut text = String::new();
    let mut pos = 0;

    while pos < chars.len() {
        match chars[pos] {
            '\\' if pos + 1 < chars.len() => {
                text.push(chars[pos + 1]);
                pos += 2;
            }
            '&' => {
                flush_text(&mut text, &mut items);
                items.push(FormatItem::Group { index: 0, case: None });
                pos += 1;
            }
            '$' if chars.get(pos + 1).is_some_and(char::is_ascii_digit) => {
                flush_text(&mut text, &mut items);
                let (index, next) = read_number(&chars, pos + 1);
                items.push(FormatItem::Group { index, case: None });
                pos = next;
            }
            '$' if chars.get(pos + 1) == Some(&'{')
                && chars.get(pos + 2).is_some_and(char::is_ascii_digit) =>
            {
                flush_text(&mut text, &mut items);
                let (item, next) = parse_format_group(&chars, pos + 2)?;
                items.push(item);
                pos = next;
            }
            ch => {
                text.push(ch);
                pos += 1;
            }
        }
    }
    flush_text(&mut text, &mut items);
    Ok(items)
}

fn flush_text(text: &mut String, items: &mut Vec<FormatItem>) {
    if !text.is_empty() {
        items.push(FormatItem::Text(std::mem::take(text)));
    }
}

fn read_number(chars: &[char], mut pos: usize) -> (usize, usize) {
    let mut value = 0usize;
    while let Some(digit) = chars.get(pos).and_then(|c| c.to_digit(10)) {
        value = value.saturating_mul(10).saturating_add(digit as usize);
        pos += 1;
    }
    (value, pos)
}

/// Reads escaped text up to one of `stops`, returning it and the stop position.
fn read_until(chars: &[char], mut pos: usize, stops: &[char]) -> Result<(String, usize), String> {
    let mut text = String::new();
    while let Some(&ch) = chars.get(pos) {
        if ch == '\\' && pos + 1 < chars.len() {
            text.push(chars[pos + 1]);
            pos += 2;
        } else if stops.contains(&ch) {
            return Ok((text, pos));
        } else {
            text.push(ch);
            pos += 1;
        }
    }
    Err("unterminated format group".to_string())
}

/// Parses `${n...}` starting at the first digit.
fn parse_format_group(chars: &[char], pos: usize) -> Result<(FormatItem, usize), String> {
    let (index, pos) = read_number(chars, pos);
    match chars.get(pos) {
        Some('}') => Ok((FormatItem::Group { index, case: None }, pos + 1)),
        Some(':') => match chars.get(pos + 1) {
            Some('/') => {
                let (name, end) = read_until(chars, pos + 2, &['}'])?;
                let case = CaseChange::from_name(&name)
                    .ok_or_else(|| format!("unknown case change '{}'", name))?;
                Ok((FormatItem::Group { index, case: Some(case) }, end + 1))
            }
            Some('+') => {
                let (if_set, end) = read_until(chars, pos + 2, &['}'])?;
                let item = FormatItem::Conditional {
                    index,
                    if_set,
                    if_unset: String::new(),
                };
                Ok((item, end + 1))
            }
            Some('?') => {
                let (if_set, mid) = read_until(chars, pos + 2, &[':'])?;
                let (if_unset, end) = read_until(chars, mid + 1, &['}'])?;
                Ok((FormatItem::Conditional { index, if_set, if_unset }, end + 1))
            }
            Some('-') => {
                let (if_unset, end) = read_until(chars, pos + 2, &['}'])?;
                let item = FormatItem::Conditional {
                    index,
                    if_set: String::new(),
                    if_unset,
                };
                Ok((item, end + 1))
            }
            _ => {
                let (if_unset, end) = read_until(chars, pos + 1, &['}'])?;
                let item = FormatItem::Conditional {
                    index,
                    if_set: String::new(),
                    if_unset,
                };
                Ok((item, end + 1))
            }
        },
        _ => Err("malformed format group".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform(pattern: &str, format: &str, flags: &str) -> Transform {
        Transform::new(pattern, format, flags).unwrap()
    }

    #[test]
    fn test_whole_match_ampersand() {
        let t = transform(".*", "[&]", "");
        assert_eq!(t.apply("X"), "[X]");
        assert_eq!(t.apply(""), "[]");
    }

    #[test]
    fn test_escaped_ampersand_is_literal() {
        let t = transform("a", "\\&", "");
        assert_eq!(t.apply("cat"), "c&t");
    }

    #[test]
    fn test_capture_groups() {
        let t = transform("(\\w+)-(\\w+)", "$2_${1}", "");
        assert_eq!(t.apply("foo-bar baz"), "bar_foo baz");
    }

    #[test]
    fn test_global_flag() {
        assert_eq!(transform("o", "0", "").apply("foo"), "f0o");
        assert_eq!(transform("o", "0", "g").apply("foo"), "f00");
    }

    #[test]
    fn test_case_insensitive_flag() {
        assert_eq!(transform("abc", "x", "i").apply("ABC"), "x");
    }

    #[test]
    fn test_case_changes() {
        assert_eq!(transform("(.*)", "${1:/upcase}", "").apply("name"), "NAME");
        assert_eq!(transform("(.*)", "${1:/downcase}", "").apply("NaMe"), "name");
        assert_eq!(transform("(.*)", "${1:/capitalize}", "").apply("name"), "Name");
        assert_eq!(transform("(.*)", "${1:/camelcase}", "").apply("foo_bar-baz"), "fooBarBaz");
        assert_eq!(transform("(.*)", "${1:/pascalcase}", "").apply("foo_bar baz"), "FooBarBaz");
    }

    #[test]
    fn test_conditionals() {
        let t = transform("(a)?b", "${1:+has a}${1:-no a}", "");
        assert_eq!(t.apply("ab"), "has a");
        assert_eq!(t.apply("b"), "no a");

        let t = transform("(x)?y", "${1:?yes:no}", "");
        assert_eq!(t.apply("xy"), "yes");
        assert_eq!(t.apply("y"), "no");

        let t = transform("(x)?y", "${1:fallback}", "");
        assert_eq!(t.apply("y"), "fallback");
        assert_eq!(t.apply("xy"), "");
    }

    #[test]
    fn test_no_match_keeps_value() {
        assert_eq!(transform("z", "Q", "").apply("abc"), "abc");
    }

    #[test]
    fn test_invalid_parts() {
        assert!(Transform::new("(", "", "").is_err());
        assert!(Transform::new("a", "", "q").is_err());
        assert!(Transform::new("a", "${1:/shout}", "").is_err());
        assert!(Transform::new("a", "${1:+oops", "").is_err());
    }
}
