//! Concrete-syntax-tree construction.
//!
//! Thin wrapper around tree-sitter: resolve the grammar from the file
//! extension and parse the raw source. Unknown extensions yield `None` so
//! callers can skip those files silently. A fresh parser instance is created
//! per call; parser state is never shared across invocations.

use std::path::Path;

use tree_sitter::Tree;

use crate::error::{PatchScopeError, Result};
use crate::lang::Lang;

/// Parse source code into a concrete syntax tree.
///
/// Returns `Ok(None)` when no grammar is registered for the file's
/// extension. Malformed source still produces a best-effort tree; tree-sitter
/// marks unparseable regions with error nodes rather than failing.
pub fn parse_source(source: &str, file_path: &Path) -> Result<Option<Tree>> {
    let Ok(lang) = Lang::from_path(file_path) else {
        return Ok(None);
    };
    parse_with_lang(source, file_path, lang).map(Some)
}

/// Parse source code with an explicit language.
pub fn parse_with_lang(source: &str, file_path: &Path, lang: Lang) -> Result<Tree> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&lang.tree_sitter_language())
        .map_err(|e| PatchScopeError::ParseFailure {
            message: format!(
                "Failed to set language for {}: {:?}",
                file_path.display(),
                e
            ),
        })?;

    parser
        .parse(source, None)
        .ok_or_else(|| PatchScopeError::ParseFailure {
            message: format!("Failed to parse file: {}", file_path.display()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_python() {
        let source = "def say_hello():\n    return 'hello'\n";
        let tree = parse_source(source, Path::new("test.py")).unwrap();
        let tree = tree.expect("python grammar should be registered");
        assert_eq!(tree.root_node().kind(), "module");
    }

    #[test]
    fn test_parse_javascript() {
        let source = "function hello() { return 'world'; }\n";
        let tree = parse_source(source, Path::new("test.js")).unwrap();
        assert_eq!(tree.unwrap().root_node().kind(), "program");
    }

    #[test]
    fn test_unknown_extension_is_not_an_error() {
        let result = parse_source("whatever", Path::new("data.bin")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_malformed_source_still_parses() {
        // Tree-sitter is lenient; it produces error nodes instead of failing
        let source = "def broken(:\n    pass\n";
        let tree = parse_source(source, Path::new("broken.py")).unwrap();
        assert!(tree.is_some());
    }
}
