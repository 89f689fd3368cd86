//! Modified-entity extraction.
//!
//! Reconciles a patch's modified lines into the set of named entities they
//! touch. Each file is resolved with a greedy line-coverage pass: lines are
//! visited in ascending order and a line already covered by a previously
//! resolved entity's range is skipped, so one entity is resolved at most
//! once per file. Module-level results are discarded; only function/class
//! entities are retrievable.
//!
//! The full reconciliation runs the pass twice: against the pre-patch
//! content with old-side line numbers, then (after asking the checkout to
//! apply the patch) against the post-patch content with new-side numbers.
//! A changed entity may only be identifiable on one side -- deleted code
//! exists only before, new code only after -- and unioning the two per-file
//! path sets collapses entities that survive the change.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::checkout::Checkout;
use crate::entity::EntityTree;
use crate::error::Result;
use crate::lang::Lang;
use crate::locate::locate;
use crate::parsing::parse_with_lang;
use crate::patch::{LineMap, Patch};
use crate::qualify::qualify;

/// Per-file sets of entity paths
pub type NodesByFile = BTreeMap<String, BTreeSet<String>>;

/// Modified-line counts above this threshold are worth flagging; resolution
/// cost grows with the number of uncovered lines
const MANY_LINES_THRESHOLD: usize = 100;

/// Resolve modified lines to entity paths against the working tree at
/// `root`. Files with no registered grammar are skipped.
pub fn collect_nodes(modified_lines: &LineMap, root: &Path) -> Result<NodesByFile> {
    let mut nodes = NodesByFile::new();

    for (file, lines) in modified_lines {
        let Ok(lang) = Lang::from_path(Path::new(file)) else {
            debug!("no grammar for {file}, skipping");
            continue;
        };
        let caps = lang.caps();

        if lines.len() > MANY_LINES_THRESHOLD {
            warn!(
                "{file} has {} modified lines, resolution may take a while",
                lines.len()
            );
        }

        let path = root.join(file);
        let source = fs::read_to_string(&path)?;
        let tree = match parse_with_lang(&source, &path, lang) {
            Ok(parsed) => EntityTree::build(&parsed, &source, None),
            Err(_) => EntityTree::from_lines(&source),
        };

        let mut covered: Vec<(usize, usize)> = Vec::new();
        let mut resolved = Vec::new();
        for &line in lines {
            let line = line as i64;
            if covered
                .iter()
                .any(|&(start, end)| start + 1 <= line as usize && line as usize <= end)
            {
                continue;
            }
            let Some(id) = locate(&tree, caps, line)? else {
                continue;
            };
            let entity = tree.entity(id);
            if caps.is_top_level(&entity.kind) {
                continue;
            }
            covered.push((entity.start_line, entity.end_line));
            resolved.push(id);
        }

        for id in resolved {
            let entity = tree.entity(id);
            if caps.is_function_class(&entity.kind) {
                let path = qualify(&tree, caps, id)?;
                nodes.entry(file.clone()).or_default().insert(path);
            }
        }
    }

    Ok(nodes)
}

/// Full pre/post reconciliation of a patch into per-file entity path sets.
///
/// Mutates the working tree (patch application); the caller must hold the
/// repository's lock for the whole call.
pub fn modified_nodes(patch: &Patch, checkout: &Checkout) -> Result<NodesByFile> {
    let (old_lines, new_lines, _) = patch.modified_lines_by_status()?;

    info!("resolving entities before applying patch");
    let pre_change = collect_nodes(&old_lines, checkout.root())?;

    info!("applying patch");
    checkout.apply_patch(patch.text())?;

    info!("resolving entities after applying patch");
    let post_change = collect_nodes(&new_lines, checkout.root())?;

    let mut merged = pre_change;
    for (file, paths) in post_change {
        merged.entry(file).or_default().extend(paths);
    }
    Ok(merged)
}

/// Flatten per-file path sets into file-scoped keys: `"<file>-><path>"`
pub fn flatten_nodes(nodes: &NodesByFile) -> BTreeSet<String> {
    nodes
        .iter()
        .flat_map(|(file, paths)| paths.iter().map(move |p| format!("{}->{}", file, p)))
        .collect()
}
