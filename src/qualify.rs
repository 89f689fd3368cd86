//! Fully-qualified entity paths.
//!
//! Resolves an entity's identifier from its name-bearing children, walks
//! upward to the nearest identifiable ancestor (function/class or module
//! root), and chains those identifiers into an `"kind:name"->...` path.

use std::collections::HashSet;

use crate::entity::{EntityId, EntityTree};
use crate::error::{PatchScopeError, Result};
use crate::lang::NodeCaps;

/// Resolve an entity's own identifier: the names of its immediate
/// identifier-kind children joined with `_`.
///
/// A `pair` with no identifier child yields the empty-name sentinel instead
/// of an error; every other kind without identifiers fails resolution.
pub fn node_identifier(tree: &EntityTree, caps: &NodeCaps, id: EntityId) -> Result<String> {
    let entity = tree.entity(id);
    let parts: Vec<&str> = entity
        .children
        .iter()
        .map(|&c| tree.entity(c))
        .filter(|e| caps.is_name(&e.kind))
        .map(|e| e.name.as_str())
        .collect();

    if !parts.is_empty() {
        Ok(parts.join("_"))
    } else if entity.kind == "pair" {
        // Anonymous object-literal pairs commonly carry no identity
        Ok(String::new())
    } else {
        Err(PatchScopeError::NoIdentifierFound {
            kind: entity.kind.clone(),
        })
    }
}

/// Walk strictly upward to the nearest ancestor whose kind is a module root
/// or a function/class construct. Entities with no parent return themselves.
pub fn identifiable_parent(tree: &EntityTree, caps: &NodeCaps, id: EntityId) -> EntityId {
    match tree.entity(id).parent {
        Some(parent) => {
            let kind = tree.entity(parent).kind.as_str();
            if caps.is_top_level(kind) || caps.is_function_class(kind) {
                parent
            } else {
                identifiable_parent(tree, caps, parent)
            }
        }
        None => id,
    }
}

/// Identifier of the nearest identifiable ancestor, or `None` at the root.
///
/// A module-root ancestor renders as its bare kind; anything else as
/// `"kind:name"`.
pub fn parent_id(tree: &EntityTree, caps: &NodeCaps, id: EntityId) -> Result<Option<String>> {
    if tree.entity(id).parent.is_none() {
        return Ok(None);
    }
    let parent = identifiable_parent(tree, caps, id);
    let kind = tree.entity(parent).kind.as_str();
    if caps.is_top_level(kind) {
        Ok(Some(kind.to_string()))
    } else {
        let ident = node_identifier(tree, caps, parent)?;
        Ok(Some(format!("{}:{}", kind, ident)))
    }
}

/// Build the fully-qualified path for an entity: ancestor identifiers from
/// the identifiable root down, then the entity's own `"kind:name"`, joined
/// with `->`. Empty-name `pair` sentinels contribute no segment.
pub fn qualify(tree: &EntityTree, caps: &NodeCaps, id: EntityId) -> Result<String> {
    let own = format!(
        "{}:{}",
        tree.entity(id).kind,
        node_identifier(tree, caps, id)?
    );

    let mut ancestors: Vec<String> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut current = id;
    while let Some(identifier) = parent_id(tree, caps, current)? {
        if !visited.insert(identifier.clone()) {
            break;
        }
        ancestors.push(identifier);
        current = identifiable_parent(tree, caps, current);
    }

    ancestors.reverse();
    ancestors.retain(|segment| segment != "pair:");
    ancestors.push(own);
    Ok(ancestors.join("->"))
}
