//! Ancestor-set and root precomputation for [`super::Ontology::build`].
//!
//! Grounded on `TaxaGO`'s `analysis::count_propagation::GOAncestorCache`,
//! which walks a topological order once to memoize per-term aggregates
//! instead of re-walking the DAG on every query. Here the aggregate is the
//! full ancestor set plus the root ID rather than a propagated count, so the
//! walk direction is forward topological order (parents before children)
//! instead of TaxaGO's reverse pass.

use daggy::{Dag, NodeIndex};
use petgraph::algo::toposort;
use rustc_hash::{FxHashMap, FxHashSet};

use super::{EdgeKind, RawRelationship, TermId, TermRecord};
use crate::error::{RevigoError, Result};

/// Per-term cached ancestor sets, as produced by [`compute_ancestors_and_roots`].
pub type AncestorIndex = FxHashMap<TermId, FxHashSet<TermId>>;

/// Collect each canonical term's direct parent and child ID lists from its
/// declared relationships (`is_a`/`part_of` as parent edges, `has_part` as a
/// child-origin edge), independent of the graph's own edge storage.
pub fn direct_relations(
    _graph: &Dag<TermId, EdgeKind, u32>,
    _nodes: &FxHashMap<TermId, NodeIndex>,
    canonical: &[TermRecord],
) -> (FxHashMap<TermId, Vec<TermId>>, FxHashMap<TermId, Vec<TermId>>) {
    let known: FxHashSet<TermId> = canonical.iter().map(|r| r.id).collect();
    let mut parent_ids: FxHashMap<TermId, Vec<TermId>> = FxHashMap::default();
    let mut child_ids: FxHashMap<TermId, Vec<TermId>> = FxHashMap::default();

    for record in canonical {
        parent_ids.entry(record.id).or_default();
        child_ids.entry(record.id).or_default();
    }

    for record in canonical {
        for &(parent_id, kind) in &record.relationships {
            if !matches!(kind, RawRelationship::IsA | RawRelationship::PartOf) {
                continue;
            }
            if !known.contains(&parent_id) {
                continue;
            }
            parent_ids.entry(record.id).or_default().push(parent_id);
            child_ids.entry(parent_id).or_default().push(record.id);
        }
        for &child_id in &record.has_part {
            if !known.contains(&child_id) {
                continue;
            }
            child_ids.entry(record.id).or_default().push(child_id);
            parent_ids.entry(child_id).or_default().push(record.id);
        }
    }

    (parent_ids, child_ids)
}

/// Walk the DAG in topological order (parents before children) once,
/// accumulating each term's ancestor set as the union of its parents' own
/// cached sets, and its root as its first parent's cached root (or itself,
/// if it has no parents). Spec §3: "RootID(T) is the unique ID reachable by
/// repeatedly walking the first parent until none remains."
pub fn compute_ancestors_and_roots(
    graph: &Dag<TermId, EdgeKind, u32>,
    nodes: &FxHashMap<TermId, NodeIndex>,
    parent_ids: &FxHashMap<TermId, Vec<TermId>>,
) -> Result<(AncestorIndex, FxHashMap<TermId, TermId>)> {
    let order = toposort(graph, None)
        .map_err(|cycle| RevigoError::OntologyMalformed(graph[cycle.node_id()]))?;

    let id_by_index: FxHashMap<NodeIndex, TermId> =
        nodes.iter().map(|(&id, &idx)| (idx, id)).collect();

    let mut ancestors: AncestorIndex = FxHashMap::default();
    let mut roots: FxHashMap<TermId, TermId> = FxHashMap::default();

    for node_idx in order {
        let Some(&id) = id_by_index.get(&node_idx) else {
            continue;
        };
        let parents = parent_ids.get(&id).cloned().unwrap_or_default();

        let mut ancestor_set: FxHashSet<TermId> = FxHashSet::default();
        for &parent_id in &parents {
            ancestor_set.insert(parent_id);
            if let Some(parent_ancestors) = ancestors.get(&parent_id) {
                ancestor_set.extend(parent_ancestors.iter().copied());
            }
        }
        ancestors.insert(id, ancestor_set);

        let root_id = match parents.first() {
            Some(&first_parent) => *roots.get(&first_parent).unwrap_or(&first_parent),
            None => id,
        };
        roots.insert(id, root_id);
    }

    Ok((ancestors, roots))
}
