//! Language detection, tree-sitter grammar loading, and node capability sets

use std::path::Path;
use tree_sitter::Language;

use crate::error::{PatchScopeError, Result};

/// Supported languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lang {
    Python,
    JavaScript,
    TypeScript,
    Java,
    Bash,
    Html,
    Css,
    Json,
    Yaml,
    Toml,
    Markdown,
}

impl Lang {
    /// Detect language from file path extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| PatchScopeError::UnsupportedLanguage {
                extension: "none".to_string(),
            })?;

        Self::from_extension(ext)
    }

    /// Detect language from file extension string
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.to_lowercase().as_str() {
            "py" | "pyi" | "py-tpl" => Ok(Self::Python),
            "js" | "jsx" | "cjs" => Ok(Self::JavaScript),
            "ts" => Ok(Self::TypeScript),
            "java" => Ok(Self::Java),
            "sh" => Ok(Self::Bash),
            "html" | "htm" => Ok(Self::Html),
            "css" => Ok(Self::Css),
            "json" | "jsonl" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            "md" | "markdown" => Ok(Self::Markdown),
            _ => Err(PatchScopeError::UnsupportedLanguage {
                extension: ext.to_string(),
            }),
        }
    }

    /// Get the canonical name of the language
    pub fn name(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Java => "java",
            Self::Bash => "bash",
            Self::Html => "html",
            Self::Css => "css",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Toml => "toml",
            Self::Markdown => "markdown",
        }
    }

    /// Get the tree-sitter Language for parsing
    pub fn tree_sitter_language(&self) -> Language {
        match self {
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Java => tree_sitter_java::LANGUAGE.into(),
            Self::Bash => tree_sitter_bash::LANGUAGE.into(),
            Self::Html => tree_sitter_html::LANGUAGE.into(),
            Self::Css => tree_sitter_css::language().into(),
            Self::Json => tree_sitter_json::LANGUAGE.into(),
            Self::Yaml => tree_sitter_yaml::language().into(),
            Self::Toml => tree_sitter_toml_ng::language().into(),
            Self::Markdown => tree_sitter_md::LANGUAGE.into(),
        }
    }

    /// Get the node capability set for this language
    pub fn caps(&self) -> &'static NodeCaps {
        match self {
            Self::Python => &NodeCaps {
                function_class_kinds: &["function_definition", "class_definition"],
                top_level_kinds: &["module"],
                name_kinds: &["identifier"],
            },
            Self::JavaScript | Self::TypeScript => &NodeCaps {
                function_class_kinds: &[
                    "function_declaration",
                    "class_declaration",
                    "method_definition",
                    "pair",
                ],
                top_level_kinds: &["program"],
                name_kinds: &["identifier", "property_identifier", "type_identifier"],
            },
            Self::Java => &NodeCaps {
                function_class_kinds: &[
                    "class_declaration",
                    "method_declaration",
                    "constructor_declaration",
                ],
                top_level_kinds: &["program"],
                name_kinds: &["identifier"],
            },
            Self::Bash => &NodeCaps {
                function_class_kinds: &["function_definition"],
                top_level_kinds: &["program"],
                name_kinds: &["word"],
            },
            Self::Html => &NodeCaps {
                function_class_kinds: &[],
                top_level_kinds: &["document"],
                name_kinds: &[],
            },
            Self::Css => &NodeCaps {
                function_class_kinds: &[],
                top_level_kinds: &["stylesheet"],
                name_kinds: &[],
            },
            Self::Json => &NodeCaps {
                function_class_kinds: &[],
                top_level_kinds: &["document"],
                name_kinds: &[],
            },
            Self::Yaml => &NodeCaps {
                function_class_kinds: &[],
                top_level_kinds: &["stream"],
                name_kinds: &[],
            },
            Self::Toml => &NodeCaps {
                function_class_kinds: &[],
                top_level_kinds: &["document"],
                name_kinds: &[],
            },
            Self::Markdown => &NodeCaps {
                function_class_kinds: &[],
                top_level_kinds: &["document"],
                name_kinds: &[],
            },
        }
    }

    /// Get common file extensions for this language
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Python => &["py", "pyi", "py-tpl"],
            Self::JavaScript => &["js", "jsx", "cjs"],
            Self::TypeScript => &["ts"],
            Self::Java => &["java"],
            Self::Bash => &["sh"],
            Self::Html => &["html", "htm"],
            Self::Css => &["css"],
            Self::Json => &["json", "jsonl"],
            Self::Yaml => &["yaml", "yml"],
            Self::Toml => &["toml"],
            Self::Markdown => &["md", "markdown"],
        }
    }
}

/// Node capability set for one language: which grammar node kinds denote
/// retrievable functions/classes, which are the module root, and which carry
/// an identifying name usable in entity paths.
#[derive(Debug)]
pub struct NodeCaps {
    pub function_class_kinds: &'static [&'static str],
    pub top_level_kinds: &'static [&'static str],
    pub name_kinds: &'static [&'static str],
}

impl NodeCaps {
    /// Check if a node kind denotes a function or class construct
    pub fn is_function_class(&self, kind: &str) -> bool {
        self.function_class_kinds.contains(&kind)
    }

    /// Check if a node kind is the module/program root
    pub fn is_top_level(&self, kind: &str) -> bool {
        self.top_level_kinds.contains(&kind)
    }

    /// Check if a node kind carries an identifying name
    pub fn is_name(&self, kind: &str) -> bool {
        self.name_kinds.contains(&kind)
    }
}
