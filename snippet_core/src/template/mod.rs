//! Parsed snippet templates.
//!
//! A [`Template`] is a tree of text, tabstop and variable nodes. Tabstops are
//! addressed by their id: the position of the tabstop in a pre-order walk of
//! the tree. Ids are dense and change whenever the tree changes shape.

mod parser;
pub mod transform;

use crate::error::ParseError;
use crate::position::byte_index;
use crate::resolver::VariableResolver;
use std::collections::HashMap;
use std::fmt;
use transform::Transform;

#[derive(Debug, Clone)]
pub enum Node {
    Text(String),
    TabStop(TabStop),
    Variable(Variable),
}

/// `$n`, `${n:default}`, `${n|a,b|}` or `${n/regex/format/}`.
#[derive(Debug, Clone)]
pub struct TabStop {
    pub index: u32,
    pub children: Vec<Node>,
    pub choice: Option<Vec<String>>,
    pub transform: Option<Transform>,
    pub is_final: bool,
}

impl TabStop {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            children: Vec::new(),
            choice: None,
            transform: None,
            is_final: false,
        }
    }

    fn final_stop() -> Self {
        Self {
            is_final: true,
            ..Self::new(0)
        }
    }
}

/// `$NAME`, `${NAME:default}` or `${NAME/regex/format/}`.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub children: Vec<Node>,
    pub transform: Option<Transform>,
}

impl Variable {
    pub fn new(name: String) -> Self {
        Self {
            name,
            children: Vec::new(),
            transform: None,
        }
    }
}

/// A tabstop as seen from outside the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabStopInfo {
    pub id: usize,
    pub index: u32,
    /// Character offset of the tabstop in the rendered template.
    pub offset: usize,
    pub value: String,
    pub is_final: bool,
    pub is_transform: bool,
    pub choice: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct Template {
    children: Vec<Node>,
}

impl Template {
    /// Parses a template. The first `$0` becomes the final tabstop; without
    /// one, an empty final tabstop is appended.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut template = Self {
            children: parser::parse(text)?,
        };
        template.mark_final();
        template.fill_mirrors();
        Ok(template)
    }

    /// Replaces every variable node with its resolved value.
    ///
    /// Unknown variables fall back to their default; unknown variables
    /// without a default become a new tabstop holding the variable name.
    pub fn resolve_variables(&mut self, resolver: &dyn VariableResolver) {
        let mut next_index = self.max_index().map_or(1, |max| max + 1);
        let children = std::mem::take(&mut self.children);
        self.children = resolve_nodes(children, resolver, &mut next_index);
        self.fill_mirrors();
    }

    /// Lists every tabstop in document order.
    pub fn tabstops(&self) -> Vec<TabStopInfo> {
        let mut out = Vec::new();
        let mut offset = 0;
        collect_tabstops(&self.children, &mut offset, &mut out);
        out
    }

    /// Smallest index among the numbered (non-final) tabstops.
    pub fn min_index(&self) -> Option<u32> {
        let mut min = None;
        walk_tabstops(&self.children, &mut |ts| {
            if !ts.is_final {
                min = Some(min.map_or(ts.index, |m: u32| m.min(ts.index)));
            }
        });
        min
    }

    /// Largest index among the numbered (non-final) tabstops.
    pub fn max_index(&self) -> Option<u32> {
        let mut max = None;
        walk_tabstops(&self.children, &mut |ts| {
            if !ts.is_final {
                max = Some(max.map_or(ts.index, |m: u32| m.max(ts.index)));
            }
        });
        max
    }

    /// Overwrites the text of tabstop `id` and of every other tabstop sharing
    /// its index. Transforms receive the transformed text.
    ///
    /// Returns the pre-edit id and new text of each other occurrence, or
    /// `None` if no tabstop has that id.
    pub fn set_placeholder_value(
        &mut self,
        id: usize,
        value: &str,
    ) -> Option<Vec<(usize, String)>> {
        let index = self.tabstops().get(id)?.index;
        let mut update = ValueUpdate {
            target: id,
            index,
            value,
            counter: 0,
            changes: Vec::new(),
        };
        update.apply(&mut self.children);
        self.ensure_final();
        Some(update.changes)
    }

    /// Inserts `child` into tabstop `id`, `offset` characters into its text.
    ///
    /// The child's tabstops are renumbered to follow the target's index and
    /// every later index of this template moves up to make room. The child's
    /// final tabstop turns into an ordinary tabstop after the child's own
    /// stops when `keep_final` is set, and into plain text otherwise.
    ///
    /// Returns the lowest index given to an inserted tabstop.
    pub fn insert_template(
        &mut self,
        id: usize,
        offset: usize,
        child: Template,
        keep_final: bool,
    ) -> Option<u32> {
        let target_index = self.tabstops().get(id)?.index;
        let shift = child.max_index().unwrap_or(0) + 1;

        let mut nodes = child.children;
        if !keep_final {
            nodes = unwrap_final(nodes);
        }
        walk_tabstops_mut(&mut nodes, &mut |ts| {
            if ts.is_final || ts.index == 0 {
                ts.is_final = false;
                ts.index = target_index + shift;
            } else {
                ts.index += target_index;
            }
        });
        let mut first_index = None;
        walk_tabstops(&nodes, &mut |ts| {
            first_index = Some(first_index.map_or(ts.index, |m: u32| m.min(ts.index)));
        });

        walk_tabstops_mut(&mut self.children, &mut |ts| {
            if ts.index > target_index {
                ts.index += shift;
            }
        });

        let target = find_tabstop_mut(&mut self.children, id, &mut 0)?;
        let value = render(&target.children);
        let split = byte_index(&value, offset);
        let mut children = text_nodes(&value[..split]);
        children.extend(nodes);
        children.extend(text_nodes(&value[split..]));
        target.children = children;
        target.choice = None;
        self.ensure_final();

        first_index
    }

    fn mark_final(&mut self) {
        let mut found = false;
        walk_tabstops_mut(&mut self.children, &mut |ts| {
            if ts.index == 0 && !found {
                ts.is_final = true;
                found = true;
            }
        });
        if !found {
            self.children.push(Node::TabStop(TabStop::final_stop()));
        }
    }

    /// Appends an empty final tabstop when a rewrite flattened the old one.
    fn ensure_final(&mut self) {
        let mut found = false;
        walk_tabstops(&self.children, &mut |ts| found |= ts.is_final);
        if !found {
            log::debug!("final tabstop was replaced, appending an empty one");
            self.children.push(Node::TabStop(TabStop::final_stop()));
        }
    }

    /// Copies each index's primary text into its empty mirrors and recomputes
    /// every transform from it.
    fn fill_mirrors(&mut self) {
        let mut primaries: HashMap<u32, Vec<Node>> = HashMap::new();
        walk_tabstops(&self.children, &mut |ts| {
            if ts.transform.is_none() && !ts.children.is_empty() {
                primaries
                    .entry(ts.index)
                    .or_insert_with(|| ts.children.clone());
            }
        });
        fill_nodes(&mut self.children, &primaries, &mut Vec::new());
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(&self.children))
    }
}

/// Renders nodes to their current text.
pub fn render(nodes: &[Node]) -> String {
    let mut out = String::new();
    render_into(nodes, &mut out);
    out
}

fn render_into(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::TabStop(ts) => render_into(&ts.children, out),
            Node::Variable(var) => render_into(&var.children, out),
        }
    }
}

fn text_nodes(text: &str) -> Vec<Node> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![Node::Text(text.to_string())]
    }
}

/// Visits tabstops in pre-order.
fn walk_tabstops<'a>(nodes: &'a [Node], f: &mut impl FnMut(&'a TabStop)) {
    for node in nodes {
        match node {
            Node::TabStop(ts) => {
                f(ts);
                walk_tabstops(&ts.children, f);
            }
            Node::Variable(var) => walk_tabstops(&var.children, f),
            Node::Text(_) => {}
        }
    }
}

fn walk_tabstops_mut(nodes: &mut [Node], f: &mut impl FnMut(&mut TabStop)) {
    for node in nodes {
        match node {
            Node::TabStop(ts) => {
                f(ts);
                walk_tabstops_mut(&mut ts.children, f);
            }
            Node::Variable(var) => walk_tabstops_mut(&mut var.children, f),
            Node::Text(_) => {}
        }
    }
}

fn count_tabstops(nodes: &[Node]) -> usize {
    let mut count = 0;
    walk_tabstops(nodes, &mut |_| count += 1);
    count
}

fn find_tabstop_mut<'a>(
    nodes: &'a mut [Node],
    id: usize,
    counter: &mut usize,
) -> Option<&'a mut TabStop> {
    for node in nodes {
        match node {
            Node::TabStop(ts) => {
                if *counter == id {
                    return Some(ts);
                }
                *counter += 1;
                if let Some(found) = find_tabstop_mut(&mut ts.children, id, counter) {
                    return Some(found);
                }
            }
            Node::Variable(var) => {
                if let Some(found) = find_tabstop_mut(&mut var.children, id, counter) {
                    return Some(found);
                }
            }
            Node::Text(_) => {}
        }
    }
    None
}

fn collect_tabstops(nodes: &[Node], offset: &mut usize, out: &mut Vec<TabStopInfo>) {
    for node in nodes {
        match node {
            Node::Text(text) => *offset += text.chars().count(),
            Node::TabStop(ts) => {
                out.push(TabStopInfo {
                    id: out.len(),
                    index: ts.index,
                    offset: *offset,
                    value: render(&ts.children),
                    is_final: ts.is_final,
                    is_transform: ts.transform.is_some(),
                    choice: ts.choice.clone(),
                });
                collect_tabstops(&ts.children, offset, out);
            }
            Node::Variable(var) => collect_tabstops(&var.children, offset, out),
        }
    }
}

fn resolve_nodes(
    nodes: Vec<Node>,
    resolver: &dyn VariableResolver,
    next_index: &mut u32,
) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Text(_) => out.push(node),
            Node::TabStop(mut ts) => {
                ts.children = resolve_nodes(std::mem::take(&mut ts.children), resolver, next_index);
                out.push(Node::TabStop(ts));
            }
            Node::Variable(var) => match resolver.resolve(&var.name) {
                Some(value) => {
                    let value = match &var.transform {
                        Some(transform) => transform.apply(&value),
                        None => value,
                    };
                    out.extend(text_nodes(&value));
                }
                None if !var.children.is_empty() => {
                    out.extend(resolve_nodes(var.children, resolver, next_index));
                }
                None => {
                    log::debug!(
                        "unresolved variable '{}' becomes tabstop {}",
                        var.name,
                        next_index
                    );
                    let mut ts = TabStop::new(*next_index);
                    ts.children = vec![Node::Text(var.name)];
                    out.push(Node::TabStop(ts));
                    *next_index += 1;
                }
            },
        }
    }
    out
}

fn fill_nodes(nodes: &mut [Node], primaries: &HashMap<u32, Vec<Node>>, ancestors: &mut Vec<u32>) {
    for node in nodes {
        match node {
            Node::TabStop(ts) => {
                let primary = primaries.get(&ts.index);
                if let Some(transform) = &ts.transform {
                    let source = primary.map(|nodes| render(nodes)).unwrap_or_default();
                    ts.children = text_nodes(&transform.apply(&source));
                } else if ts.children.is_empty() && !ancestors.contains(&ts.index) {
                    if let Some(primary) = primary {
                        let mut copy = primary.clone();
                        walk_tabstops_mut(&mut copy, &mut |nested| nested.is_final = false);
                        ts.children = copy;
                    }
                }
                // A mirror nested in its own primary is left empty.
                ancestors.push(ts.index);
                fill_nodes(&mut ts.children, primaries, ancestors);
                ancestors.pop();
            }
            Node::Variable(var) => fill_nodes(&mut var.children, primaries, ancestors),
            Node::Text(_) => {}
        }
    }
}

/// Replaces a final tabstop by its contents.
fn unwrap_final(nodes: Vec<Node>) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::TabStop(ts) if ts.is_final => out.extend(unwrap_final(ts.children)),
            Node::TabStop(mut ts) => {
                ts.children = unwrap_final(std::mem::take(&mut ts.children));
                out.push(Node::TabStop(ts));
            }
            Node::Variable(mut var) => {
                var.children = unwrap_final(std::mem::take(&mut var.children));
                out.push(Node::Variable(var));
            }
            Node::Text(_) => out.push(node),
        }
    }
    out
}

/// Pre-order rewrite of one tabstop and its siblings by index.
struct ValueUpdate<'a> {
    target: usize,
    index: u32,
    value: &'a str,
    /// Id of the next tabstop in the tree as it was before the update.
    counter: usize,
    changes: Vec<(usize, String)>,
}

impl ValueUpdate<'_> {
    fn apply(&mut self, nodes: &mut [Node]) {
        for node in nodes {
            match node {
                Node::TabStop(ts) => {
                    let id = self.counter;
                    self.counter += 1;
                    if id != self.target && ts.index != self.index {
                        self.apply(&mut ts.children);
                        continue;
                    }
                    // Replaced subtrees still count toward the old ids.
                    self.counter += count_tabstops(&ts.children);
                    let text = match &ts.transform {
                        Some(transform) if id != self.target => transform.apply(self.value),
                        _ => self.value.to_string(),
                    };
                    ts.children = text_nodes(&text);
                    if id != self.target {
                        self.changes.push((id, text));
                    }
                }
                Node::Variable(var) => self.apply(&mut var.children),
                Node::Text(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn summary(template: &Template) -> Vec<(u32, usize, String)> {
        template
            .tabstops()
            .into_iter()
            .map(|ts| (ts.index, ts.offset, ts.value))
            .collect()
    }

    #[test]
    fn test_render_and_offsets() {
        let template = Template::parse("foo(${1:bar}, ${2:baz})$0").unwrap();
        assert_eq!(template.to_string(), "foo(bar, baz)");
        assert_eq!(
            summary(&template),
            vec![
                (1, 4, "bar".to_string()),
                (2, 9, "baz".to_string()),
                (0, 13, String::new()),
            ]
        );
        assert!(template.tabstops()[2].is_final);
    }

    #[test]
    fn test_implicit_final_tabstop() {
        let template = Template::parse("a $1 b").unwrap();
        let tabstops = template.tabstops();
        assert_eq!(tabstops.len(), 2);
        assert!(tabstops[1].is_final);
        assert_eq!(tabstops[1].offset, 4);
    }

    #[test]
    fn test_only_first_zero_is_final() {
        let template = Template::parse("$0 and $0").unwrap();
        let finals = template.tabstops().iter().filter(|ts| ts.is_final).count();
        assert_eq!(finals, 1);
    }

    #[test]
    fn test_min_max_index_sparse() {
        let template = Template::parse("$3 ${1:x} $0").unwrap();
        assert_eq!(template.min_index(), Some(1));
        assert_eq!(template.max_index(), Some(3));

        let plain = Template::parse("just text").unwrap();
        assert_eq!(plain.min_index(), None);
        assert_eq!(plain.max_index(), None);
    }

    #[test]
    fn test_mirrors_take_primary_text() {
        let template = Template::parse("$1 ${1:name} ${1/(.*)/${1:/upcase}/}").unwrap();
        assert_eq!(template.to_string(), "name name NAME");
    }

    #[test]
    fn test_mirror_nested_in_primary_terminates() {
        let template = Template::parse("${1:a $1}").unwrap();
        assert_eq!(template.to_string(), "a ");
    }

    #[test]
    fn test_nested_offsets() {
        let template = Template::parse("x${1:ab${2:cd}ef}y").unwrap();
        assert_eq!(
            summary(&template),
            vec![
                (1, 1, "abcdef".to_string()),
                (2, 3, "cd".to_string()),
                (0, 8, String::new()),
            ]
        );
    }

    #[test]
    fn test_set_placeholder_value_cascades() {
        let mut template = Template::parse("$1 and ${1/.*/[&]/}").unwrap();
        assert_eq!(template.to_string(), " and []");
        let changes = template.set_placeholder_value(0, "X").unwrap();
        assert_eq!(changes, vec![(1, "[X]".to_string())]);
        assert_eq!(template.to_string(), "X and [X]");
    }

    #[test]
    fn test_set_placeholder_value_collapses_nested() {
        let mut template = Template::parse("${1:a${2:b}} $1 $2").unwrap();
        assert_eq!(template.to_string(), "ab ab b");
        // ids: 0 = $1, 1 = $2 inside, 2 = mirror $1, 3 = $2 inside the mirror, 4 = $2, 5 = final
        let changes = template.set_placeholder_value(0, "z").unwrap();
        assert_eq!(changes, vec![(2, "z".to_string())]);
        assert_eq!(template.to_string(), "z z b");
        assert_eq!(template.tabstops().len(), 4);
    }

    #[test]
    fn test_set_placeholder_value_unknown_id() {
        let mut template = Template::parse("$1").unwrap();
        assert!(template.set_placeholder_value(7, "x").is_none());
    }

    #[test]
    fn test_resolve_variables() {
        let mut vars = HashMap::new();
        vars.insert("NAME".to_string(), "world".to_string());
        let text = "hello $NAME ${NAME/(.*)/${1:/upcase}/} ${MISSING:dflt} $UNKNOWN $1";
        let mut template = Template::parse(text).unwrap();
        template.resolve_variables(&vars);
        assert_eq!(template.to_string(), "hello world WORLD dflt UNKNOWN ");
        let unknown = template
            .tabstops()
            .into_iter()
            .find(|ts| ts.value == "UNKNOWN")
            .unwrap();
        assert_eq!(unknown.index, 2);
    }

    #[test]
    fn test_variables_without_resolver_render_default() {
        let template = Template::parse("${A:x}$B").unwrap();
        assert_eq!(template.to_string(), "x");
    }

    #[test]
    fn test_insert_template_renumbers() {
        let mut template = Template::parse("${1:foo}${2:bar}").unwrap();
        let child = Template::parse("<$1>").unwrap();
        let first = template.insert_template(0, 1, child, true);
        assert_eq!(first, Some(2));
        assert_eq!(template.to_string(), "f<>oobar");
        let indexes: Vec<u32> = template.tabstops().iter().map(|ts| ts.index).collect();
        // $1, inserted $1 -> 2, inserted final -> 3, old $2 -> 4, final
        assert_eq!(indexes, vec![1, 2, 3, 4, 0]);
        assert_eq!(template.tabstops().iter().filter(|ts| ts.is_final).count(), 1);
    }

    #[test]
    fn test_insert_template_without_final() {
        let mut template = Template::parse("${1:foo}${2:bar}").unwrap();
        let child = Template::parse("[$1]${0:end}").unwrap();
        let first = template.insert_template(0, 3, child, false);
        assert_eq!(first, Some(2));
        assert_eq!(template.to_string(), "foo[]endbar");
        let indexes: Vec<u32> = template.tabstops().iter().map(|ts| ts.index).collect();
        assert_eq!(indexes, vec![1, 2, 4, 0]);
    }
}
