//! Innermost-entity lookup by source line.
//!
//! Finds the innermost function/class entity containing a 1-indexed line
//! number, falling back to the module root when no such entity matches.

use crate::entity::{EntityId, EntityTree};
use crate::error::{PatchScopeError, Result};
use crate::lang::NodeCaps;

/// Node kinds that host an anonymous function value inside a `pair`
const PAIR_FUNCTION_KINDS: &[&str] = &["function", "function_expression"];

/// Find the entity containing `line` (1-indexed).
///
/// Returns the innermost function/class entity covering the line, the module
/// root when no function/class matches, or `None` when the line lies beyond
/// the end of the file. Line numbers below 1 are an error.
///
/// A `pair` entity (key-value constructs hosting anonymous functions in
/// object literals) only counts as a match through a nested function child,
/// which is returned in its place; otherwise the pair itself never matches
/// but its descendants are still searched.
pub fn locate(tree: &EntityTree, caps: &NodeCaps, line: i64) -> Result<Option<EntityId>> {
    if line <= 0 {
        return Err(PatchScopeError::InvalidLineNumber { line });
    }
    let line = line as usize;
    if line > tree.total_lines() {
        return Ok(None);
    }

    Ok(Some(
        traverse(tree, caps, tree.root(), line).unwrap_or_else(|| tree.root()),
    ))
}

fn traverse(tree: &EntityTree, caps: &NodeCaps, id: EntityId, line: usize) -> Option<EntityId> {
    let entity = tree.entity(id);
    if !(entity.start_line + 1 <= line && line <= entity.end_line) {
        return None;
    }

    let mut matching = None;
    if caps.is_function_class(&entity.kind) {
        if entity.kind == "pair" {
            matching = entity
                .children
                .iter()
                .copied()
                .find(|&c| PAIR_FUNCTION_KINDS.contains(&tree.entity(c).kind.as_str()));
        } else {
            matching = Some(id);
        }
    }

    // Deeper matches win; among siblings the first in document order wins
    for &child in entity.children.iter().rev() {
        if let Some(found) = traverse(tree, caps, child, line) {
            matching = Some(found);
        }
    }

    matching
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityTree;
    use crate::lang::Lang;
    use crate::parsing::parse_with_lang;
    use std::path::Path;

    const SOURCE: &str = "\
top = \"top\"


def func_1():
    line_1 = \"f1_line_1\"

    def func_2():
        line_1 = \"f2_line_1\"
        line_2 = \"f2_line_2\"


class class_1:
    line_1 = \"c1_line_1\"

    def func_3(self):
        line_1 = \"c1_f3_line_1\"
";

    fn tree() -> EntityTree {
        let parsed = parse_with_lang(SOURCE, Path::new("test.py"), Lang::Python).unwrap();
        EntityTree::build(&parsed, SOURCE, None)
    }

    #[test]
    fn test_module_level_line_returns_root() {
        let tree = tree();
        let caps = Lang::Python.caps();
        let id = locate(&tree, caps, 1).unwrap().unwrap();
        assert_eq!(id, tree.root());
        assert_eq!(tree.entity(id).kind, "module");
    }

    #[test]
    fn test_line_inside_function() {
        let tree = tree();
        let caps = Lang::Python.caps();
        let id = locate(&tree, caps, 5).unwrap().unwrap();
        let entity = tree.entity(id);
        assert_eq!(entity.kind, "function_definition");
        assert_eq!(entity.name, "func_1");
    }

    #[test]
    fn test_line_inside_nested_function_prefers_deepest() {
        let tree = tree();
        let caps = Lang::Python.caps();
        let id = locate(&tree, caps, 8).unwrap().unwrap();
        assert_eq!(tree.entity(id).name, "func_2");
    }

    #[test]
    fn test_line_inside_method() {
        let tree = tree();
        let caps = Lang::Python.caps();
        let id = locate(&tree, caps, 16).unwrap().unwrap();
        assert_eq!(tree.entity(id).name, "func_3");
    }

    #[test]
    fn test_class_body_line_matches_class() {
        let tree = tree();
        let caps = Lang::Python.caps();
        let id = locate(&tree, caps, 13).unwrap().unwrap();
        let entity = tree.entity(id);
        assert_eq!(entity.kind, "class_definition");
        assert_eq!(entity.name, "class_1");
    }

    #[test]
    fn test_line_past_end_of_file_is_not_found() {
        let tree = tree();
        let caps = Lang::Python.caps();
        let total = tree.total_lines() as i64;
        assert!(locate(&tree, caps, total + 1).unwrap().is_none());
    }

    #[test]
    fn test_nonpositive_line_is_an_error() {
        let tree = tree();
        let caps = Lang::Python.caps();
        assert!(matches!(
            locate(&tree, caps, 0),
            Err(PatchScopeError::InvalidLineNumber { line: 0 })
        ));
        assert!(locate(&tree, caps, -3).is_err());
    }

    #[test]
    fn test_pair_with_function_value_returns_function_child() {
        let source = "const handlers = {\n  onClick: function () {\n    return 1;\n  },\n};\n";
        let parsed = parse_with_lang(source, Path::new("test.js"), Lang::JavaScript).unwrap();
        let tree = EntityTree::build(&parsed, source, None);
        let caps = Lang::JavaScript.caps();

        let id = locate(&tree, caps, 3).unwrap().unwrap();
        assert!(PAIR_FUNCTION_KINDS.contains(&tree.entity(id).kind.as_str()));
    }

    #[test]
    fn test_pair_without_function_value_is_transparent_to_matching() {
        let source = "const config = {\n  retries: 3,\n  delay: 5,\n};\n";
        let parsed = parse_with_lang(source, Path::new("test.js"), Lang::JavaScript).unwrap();
        let tree = EntityTree::build(&parsed, source, None);
        let caps = Lang::JavaScript.caps();

        // The pair holds no function, so the lookup falls through to the root
        let id = locate(&tree, caps, 2).unwrap().unwrap();
        assert_eq!(id, tree.root());
    }
}
