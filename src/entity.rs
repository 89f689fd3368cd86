//! Filtered entity tree construction.
//!
//! Converts a raw concrete syntax tree into a hierarchy of named entities
//! (functions, classes, methods, plus any other node that carries a usable
//! kind and name). The tree is stored as a flat arena with integer indices;
//! parent links are indices too, so there are no reference cycles and no
//! shared ownership.
//!
//! Nodes with no usable kind or name are *transparent*: no entity is created
//! for them, but their children are still visited and attached to the nearest
//! retained ancestor. This keeps punctuation and operator nodes from
//! fragmenting the hierarchy while still reaching constructs nested inside
//! them.

use tree_sitter::{Node, Tree};

/// Index of an entity inside its [`EntityTree`] arena.
pub type EntityId = usize;

/// One structural code element.
///
/// Line ranges are 0-indexed and half-open: `[start_line, end_line)` covers
/// the whole construct, `[header_start, header_end)` just the declaration
/// line(s) carrying the identifier.
#[derive(Debug, Clone)]
pub struct Entity {
    pub kind: String,
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub header_start: usize,
    pub header_end: usize,
    pub depth: usize,
    pub parent: Option<EntityId>,
    pub children: Vec<EntityId>,
}

/// Arena-backed tree of entities for one file-content snapshot.
#[derive(Debug)]
pub struct EntityTree {
    nodes: Vec<Entity>,
    root: EntityId,
    total_lines: usize,
}

/// Classification of a raw CST node during tree construction.
enum NodeClass {
    /// Create an entity for the node and recurse into it.
    Retain {
        kind: String,
        name: String,
        header_end: usize,
    },
    /// Skip the node but still visit its children.
    Passthrough,
}

impl EntityTree {
    /// Build the entity tree from a parsed CST.
    ///
    /// `max_depth`, when set, stops descent once an entity at that depth has
    /// been created; the partially built subtree is returned unchanged.
    pub fn build(tree: &Tree, source: &str, max_depth: Option<usize>) -> Self {
        let root_node = tree.root_node();
        let root = Entity {
            kind: root_node.kind().to_string(),
            name: String::new(),
            start_line: root_node.start_position().row,
            end_line: root_node.end_position().row + 1,
            header_start: root_node.start_position().row,
            header_end: root_node.start_position().row + 1,
            depth: 0,
            parent: None,
            children: Vec::new(),
        };

        let mut out = Self {
            nodes: vec![root],
            root: 0,
            total_lines: source.lines().count(),
        };
        out.visit(root_node, source, 0, max_depth);
        out
    }

    /// Build the synthetic fallback tree for content with no grammar: a
    /// `content` root with one `line` child per source line.
    pub fn from_lines(content: &str) -> Self {
        let raw_lines: Vec<&str> = content.split('\n').collect();
        let root = Entity {
            kind: "content".to_string(),
            name: "content".to_string(),
            start_line: 0,
            end_line: raw_lines.len(),
            header_start: 0,
            header_end: 1,
            depth: 0,
            parent: None,
            children: Vec::new(),
        };

        let mut nodes = vec![root];
        for line_no in 0..raw_lines.len() {
            nodes.push(Entity {
                kind: "line".to_string(),
                name: "line".to_string(),
                start_line: line_no,
                end_line: line_no + 1,
                header_start: line_no,
                header_end: line_no + 1,
                depth: 1,
                parent: Some(0),
                children: Vec::new(),
            });
            nodes[0].children.push(line_no + 1);
        }

        Self {
            nodes,
            root: 0,
            total_lines: content.lines().count(),
        }
    }

    pub fn root(&self) -> EntityId {
        self.root
    }

    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of lines in the source snapshot this tree was built from
    pub fn total_lines(&self) -> usize {
        self.total_lines
    }

    /// Find the first entity (in insertion order) with the given name.
    /// Intended for tests and debugging.
    pub fn find_by_name(&self, name: &str) -> Option<EntityId> {
        self.nodes.iter().position(|e| e.name == name)
    }

    /// Render the tree as indented text, one entity per line
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_node(self.root, 0, &mut out);
        out
    }

    fn render_node(&self, id: EntityId, indent: usize, out: &mut String) {
        let e = &self.nodes[id];
        out.push_str(&" ".repeat(indent * 2));
        if e.name.is_empty() {
            out.push_str(&format!("{} [{}..{})\n", e.kind, e.start_line, e.end_line));
        } else {
            out.push_str(&format!(
                "{}:{} [{}..{})\n",
                e.kind, e.name, e.start_line, e.end_line
            ));
        }
        for &child in &e.children {
            self.render_node(child, indent + 1, out);
        }
    }

    fn visit(
        &mut self,
        node: Node<'_>,
        source: &str,
        entity: EntityId,
        max_depth: Option<usize>,
    ) {
        if let Some(limit) = max_depth {
            if self.nodes[entity].depth >= limit {
                return;
            }
        }

        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();

        for child in children {
            match classify(&child, source) {
                NodeClass::Passthrough => self.visit(child, source, entity, max_depth),
                NodeClass::Retain {
                    kind,
                    name,
                    header_end,
                } => {
                    let start_line = child.start_position().row;
                    let end_line = child.end_position().row + 1;
                    let id = self.insert(entity, kind, name, start_line, end_line, header_end);
                    self.visit(child, source, id, max_depth);
                }
            }
        }
    }

    /// Insert a new entity under `parent`, absorbing any existing siblings
    /// whose range is fully contained in the new range. Siblings stay sorted
    /// by start line.
    fn insert(
        &mut self,
        parent: EntityId,
        kind: String,
        name: String,
        start_line: usize,
        end_line: usize,
        header_end: usize,
    ) -> EntityId {
        let id = self.nodes.len();
        let depth = self.nodes[parent].depth + 1;
        self.nodes.push(Entity {
            kind,
            name,
            start_line,
            end_line,
            header_start: start_line,
            header_end,
            depth,
            parent: Some(parent),
            children: Vec::new(),
        });

        let siblings = std::mem::take(&mut self.nodes[parent].children);
        let (absorbed, mut kept): (Vec<EntityId>, Vec<EntityId>) =
            siblings.into_iter().partition(|&c| {
                self.nodes[c].start_line >= start_line && self.nodes[c].end_line <= end_line
            });

        for &child in &absorbed {
            self.nodes[child].parent = Some(id);
        }
        self.nodes[id].children = absorbed;

        kept.push(id);
        kept.sort_by_key(|&c| self.nodes[c].start_line);
        self.nodes[parent].children = kept;

        id
    }
}

/// Strip characters that are not alphanumeric, `_`, `-`, or whitespace
fn sanitize_kind(kind: &str) -> String {
    kind.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect()
}

/// Check whether a node kind carries a name usable for entity labeling.
/// Covers plain identifiers, property/type identifiers, and the
/// heading/title kinds of non-code grammars.
fn is_name_bearing(kind: &str) -> bool {
    let lower = kind.to_lowercase();
    lower.contains("identifier") || lower.contains("title") || lower.contains("heading")
}

/// Derive a name and header end line for a CST node.
///
/// The name concatenates the text of all name-bearing children with `;`.
/// When no such child exists, the left-hand side of the node's first source
/// line is used instead (the best available handle for declarations without
/// a dedicated identifier node, e.g. bare assignments). Returns `None` when
/// neither yields anything.
fn node_name(node: &Node<'_>, source: &str) -> Option<(String, usize)> {
    let src = source.as_bytes();
    let mut names: Vec<String> = Vec::new();
    let mut header_end = node.start_position().row + 1;

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if is_name_bearing(child.kind()) {
            header_end = header_end.max(child.end_position().row + 1);
            names.push(child.utf8_text(src).unwrap_or_default().to_string());
        }
    }

    let name = if names.is_empty() {
        let text = node.utf8_text(src).unwrap_or_default();
        let first_line = text.split('\n').next().unwrap_or_default();
        first_line
            .split('=')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string()
    } else {
        names.join(";")
    };

    if name.is_empty() {
        None
    } else {
        Some((name, header_end))
    }
}

fn classify(node: &Node<'_>, source: &str) -> NodeClass {
    let kind = sanitize_kind(node.kind());
    if kind.trim().is_empty() || !kind.chars().any(|c| c.is_alphabetic()) {
        return NodeClass::Passthrough;
    }
    match node_name(node, source) {
        Some((name, header_end)) => NodeClass::Retain {
            kind,
            name,
            header_end,
        },
        None => NodeClass::Passthrough,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::Lang;
    use crate::parsing::parse_with_lang;
    use std::path::Path;

    fn python_tree(source: &str) -> EntityTree {
        let tree = parse_with_lang(source, Path::new("test.py"), Lang::Python).unwrap();
        EntityTree::build(&tree, source, None)
    }

    #[test]
    fn test_simple_function() {
        let source = "def hello():\n    print('Hello, World!')\n\nprint('End of file')\n";
        let tree = python_tree(source);

        assert_eq!(tree.entity(tree.root()).kind, "module");
        let func = tree.find_by_name("hello").expect("hello entity");
        let func = tree.entity(func);
        assert_eq!(func.kind, "function_definition");
        assert_eq!(func.start_line, 0);
        assert_eq!(func.end_line, 2);
        assert_eq!(func.header_start, 0);
        assert_eq!(func.header_end, 1);
    }

    #[test]
    fn test_nested_functions_are_nested_entities() {
        let source = "def outer():\n    def inner():\n        pass\n";
        let tree = python_tree(source);

        let outer = tree.find_by_name("outer").unwrap();
        let inner = tree.find_by_name("inner").unwrap();

        // inner must be a descendant of outer
        let mut current = tree.entity(inner).parent;
        let mut found = false;
        while let Some(id) = current {
            if id == outer {
                found = true;
                break;
            }
            current = tree.entity(id).parent;
        }
        assert!(found, "inner should nest under outer");
    }

    #[test]
    fn test_nesting_invariants() {
        let source = "\
class Widget:
    factor = 3

    def scale(self, x):
        y = x * self.factor
        return y

def main():
    w = Widget()
    print(w.scale(2))
";
        let tree = python_tree(source);

        for id in 0..tree.len() {
            let e = tree.entity(id);
            if let Some(p) = e.parent {
                let parent = tree.entity(p);
                assert!(parent.start_line <= e.start_line);
                assert!(e.end_line <= parent.end_line);
            }
            // Siblings either disjoint or fully nested -- never partial overlap
            for (i, &a) in e.children.iter().enumerate() {
                for &b in &e.children[i + 1..] {
                    let (a, b) = (tree.entity(a), tree.entity(b));
                    let disjoint = a.end_line <= b.start_line || b.end_line <= a.start_line;
                    let nested = (a.start_line <= b.start_line && b.end_line <= a.end_line)
                        || (b.start_line <= a.start_line && a.end_line <= b.end_line);
                    assert!(disjoint || nested);
                }
            }
        }
    }

    #[test]
    fn test_assignment_name_falls_back_to_lhs() {
        let source = "result = compute(1, 2)\n";
        let tree = python_tree(source);
        assert!(tree.find_by_name("result").is_some());
    }

    #[test]
    fn test_fallback_tree_from_lines() {
        let content = "alpha\nbeta\ngamma";
        let tree = EntityTree::from_lines(content);

        let root = tree.entity(tree.root());
        assert_eq!(root.kind, "content");
        assert_eq!(root.children.len(), 3);
        for (i, &child) in root.children.iter().enumerate() {
            let line = tree.entity(child);
            assert_eq!(line.kind, "line");
            assert_eq!(line.start_line, i);
            assert_eq!(line.end_line, i + 1);
        }
    }

    #[test]
    fn test_max_depth_cutoff() {
        let source = "def outer():\n    def inner():\n        def innermost():\n            pass\n";
        let tree = parse_with_lang(source, Path::new("test.py"), Lang::Python).unwrap();
        let shallow = EntityTree::build(&tree, source, Some(2));

        assert!(shallow.find_by_name("outer").is_some());
        assert!(shallow.find_by_name("innermost").is_none());
    }

    #[test]
    fn test_absorb_keeps_children_sorted() {
        let source = "\
def first():
    pass

def second():
    pass
";
        let tree = python_tree(source);
        let root = tree.entity(tree.root());
        let starts: Vec<usize> = root
            .children
            .iter()
            .map(|&c| tree.entity(c).start_line)
            .collect();
        let mut sorted = starts.clone();
        sorted.sort_unstable();
        assert_eq!(starts, sorted);
    }

    #[test]
    fn test_javascript_object_pair() {
        let source = "const handlers = {\n  onClick: function () {\n    return 1;\n  },\n};\n";
        let tree = parse_with_lang(source, Path::new("test.js"), Lang::JavaScript).unwrap();
        let tree = EntityTree::build(&tree, source, None);

        let pair = tree.find_by_name("onClick").expect("pair entity");
        assert_eq!(tree.entity(pair).kind, "pair");
    }
}
