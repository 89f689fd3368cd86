//! patchscope: patch-to-entity retrieval scoring
//!
//! This library maps line-level source changes from unified diffs onto the
//! named code entities (functions, classes, methods) they touch, across
//! multiple programming languages, and scores how well a predicted
//! change-set matches a reference change-set.
//!
//! Parsing uses tree-sitter; each language declares a capability set naming
//! the grammar node kinds that denote functions/classes, the module root,
//! and identifier carriers. The raw syntax tree is filtered into a compact
//! entity tree, modified lines are resolved to their innermost enclosing
//! entity, and the resulting fully-qualified entity paths are compared as
//! sets with precision/recall/F1.
//!
//! # Example
//!
//! ```ignore
//! use patchscope::{score_instance, Checkout, Instance};
//!
//! let instance = Instance {
//!     instance_id: "demo".into(),
//!     repo: "owner/repo".into(),
//!     base_commit: "abc123".into(),
//!     patch: reference_diff,
//!     model_patch: predicted_diff,
//! };
//!
//! let checkout = Checkout::open("/tmp/work/repo");
//! let report = score_instance(&instance, Some(&checkout));
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! ```

pub mod checkout;
pub mod cli;
pub mod entity;
pub mod error;
pub mod extract;
pub mod lang;
pub mod locate;
pub mod parsing;
pub mod patch;
pub mod qualify;
pub mod score;

// Re-export commonly used types
pub use checkout::{repo_lock, Checkout, RetryPolicy};
pub use cli::{Cli, OutputFormat};
pub use entity::{Entity, EntityId, EntityTree};
pub use error::{PatchScopeError, Result};
pub use extract::{collect_nodes, flatten_nodes, modified_nodes, NodesByFile};
pub use lang::{Lang, NodeCaps};
pub use locate::locate;
pub use parsing::{parse_source, parse_with_lang};
pub use patch::{FileDiff, Hunk, HunkLine, LineKind, LineMap, Patch};
pub use qualify::{node_identifier, parent_id, qualify};
pub use score::{
    file_retrieval_metrics, retrieval_scores, score_instance, Instance, RetrievalMetrics,
    RetrievalReport,
};
