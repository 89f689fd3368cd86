//! Retrieval scoring.
//!
//! Precision/recall/F1 over sets of comparable keys: file paths for
//! file-level retrieval, file-scoped entity paths for entity-level
//! retrieval. Entity-level scoring needs a working checkout (patches are
//! physically applied between the pre and post extraction passes); its
//! failure modes are folded into sentinel metric values so one instance can
//! never abort a batch:
//!
//! - `null`  -- no reference entities existed (no signal)
//! - `-1`    -- reference extraction failed
//! - `0`     -- prediction extraction failed

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::checkout::{repo_lock, Checkout};
use crate::extract::{flatten_nodes, modified_nodes};
use crate::patch::Patch;

/// Set-based retrieval metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalMetrics {
    pub recall: f64,
    pub precision: f64,
    pub f1: f64,
}

impl RetrievalMetrics {
    pub const ZERO: Self = Self {
        recall: 0.0,
        precision: 0.0,
        f1: 0.0,
    };

    /// Sentinel for "reference extraction failed"
    pub const FAILED_REFERENCE: Self = Self {
        recall: -1.0,
        precision: -1.0,
        f1: -1.0,
    };
}

/// Score a predicted set against a reference set.
///
/// Precision is 0 for an empty predicted set, recall is 0 for an empty
/// reference set, and f1 is 0 when both components are 0.
pub fn retrieval_scores(
    reference: &BTreeSet<String>,
    predicted: &BTreeSet<String>,
) -> RetrievalMetrics {
    let hits = reference.intersection(predicted).count() as f64;
    let precision = if predicted.is_empty() {
        0.0
    } else {
        hits / predicted.len() as f64
    };
    let recall = if reference.is_empty() {
        0.0
    } else {
        hits / reference.len() as f64
    };
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    RetrievalMetrics {
        recall,
        precision,
        f1,
    }
}

/// File-level retrieval metrics between two patches.
///
/// With `to_basename` the comparison uses file basenames only, which can
/// never score below the path-exact mode on the same inputs.
pub fn file_retrieval_metrics(
    reference: &Patch,
    predicted: &Patch,
    to_basename: bool,
) -> RetrievalMetrics {
    retrieval_scores(
        &reference.modified_files(to_basename),
        &predicted.modified_files(to_basename),
    )
}

/// One evaluation instance: a reference patch and a predicted patch against
/// a known repository state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub base_commit: String,
    pub patch: String,
    pub model_patch: String,
}

/// Per-instance output record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalReport {
    pub instance_id: String,
    pub file_retrieval_metrics: RetrievalMetrics,
    pub node_retrieval_metrics: Option<RetrievalMetrics>,
    pub reference_nodes: Vec<String>,
    pub predicted_nodes: Vec<String>,
}

/// Score one instance.
///
/// File-level metrics are always computed. Entity-level metrics are computed
/// only when a checkout is provided; every failure mode there maps to a
/// sentinel rather than an error, so the caller can batch instances freely.
pub fn score_instance(instance: &Instance, checkout: Option<&Checkout>) -> RetrievalReport {
    let reference_patch = Patch::new(&instance.patch);
    let predicted_patch = Patch::new(&instance.model_patch);

    let file_metrics = file_retrieval_metrics(&reference_patch, &predicted_patch, false);

    let Some(checkout) = checkout else {
        return RetrievalReport {
            instance_id: instance.instance_id.clone(),
            file_retrieval_metrics: file_metrics,
            node_retrieval_metrics: None,
            reference_nodes: Vec::new(),
            predicted_nodes: Vec::new(),
        };
    };

    // A diff that did not survive the strict hunk parse cannot drive
    // line-level analysis; file metrics still stand.
    if !reference_patch.is_fully_parsed() || !predicted_patch.is_fully_parsed() {
        warn!(
            "{}: patch hunks not parseable, entity retrieval skipped",
            instance.instance_id
        );
        return RetrievalReport {
            instance_id: instance.instance_id.clone(),
            file_retrieval_metrics: file_metrics,
            node_retrieval_metrics: None,
            reference_nodes: Vec::new(),
            predicted_nodes: Vec::new(),
        };
    }

    // Extraction mutates the working tree; serialize per repository
    let lock = repo_lock(&instance.repo);
    let _guard = lock.lock();

    let (node_metrics, reference_nodes, predicted_nodes) =
        node_retrieval_metrics(&reference_patch, &predicted_patch, checkout);

    RetrievalReport {
        instance_id: instance.instance_id.clone(),
        file_retrieval_metrics: file_metrics,
        node_retrieval_metrics: node_metrics,
        reference_nodes: reference_nodes.into_iter().collect(),
        predicted_nodes: predicted_nodes.into_iter().collect(),
    }
}

/// Entity-level scoring: extract reference entities, reset the tree,
/// extract predicted entities, then score. Failures map to sentinels;
/// `None` means the reference changes touched no retrievable entity, so the
/// metric carries no signal.
fn node_retrieval_metrics(
    reference_patch: &Patch,
    predicted_patch: &Patch,
    checkout: &Checkout,
) -> (Option<RetrievalMetrics>, BTreeSet<String>, BTreeSet<String>) {
    let reference_nodes = match modified_nodes(reference_patch, checkout) {
        Ok(nodes) => flatten_nodes(&nodes),
        Err(e) => {
            warn!("reference entity extraction failed: {e}");
            return (
                Some(RetrievalMetrics::FAILED_REFERENCE),
                BTreeSet::new(),
                BTreeSet::new(),
            );
        }
    };

    // The reference patch is applied now; restore the base state before
    // extracting predicted entities
    if let Err(e) = checkout.reset() {
        warn!("checkout reset failed: {e}");
        return (
            Some(RetrievalMetrics::ZERO),
            reference_nodes,
            BTreeSet::new(),
        );
    }

    if reference_nodes.is_empty() {
        // Changes touched no retrievable entity (module level only)
        info!("no reference entities, entity metrics carry no signal");
        return (None, reference_nodes, BTreeSet::new());
    }

    let predicted_nodes = match modified_nodes(predicted_patch, checkout) {
        Ok(nodes) => flatten_nodes(&nodes),
        Err(e) => {
            warn!("predicted entity extraction failed: {e}");
            return (
                Some(RetrievalMetrics::ZERO),
                reference_nodes,
                BTreeSet::new(),
            );
        }
    };

    let metrics = retrieval_scores(&reference_nodes, &predicted_nodes);
    (Some(metrics), reference_nodes, predicted_nodes)
}
