//! The GO term DAG: polyhierarchical `is_a`/`part_of` parentage, obsolete-term
//! redirection, cached ancestor sets and roots (spec §4.1, §3 "Ontology").
//!
//! Grounded on `TaxaGO`'s `parsers::obo_parser` (`OboTerm`, `Relationship`,
//! `build_ontology_graph`) and `analysis::handle_lineage::GOAncestorCache`,
//! generalized from "build a graph while parsing an `.obo` file" to "build a
//! graph from already-parsed [`TermRecord`]s", since OBO parsing itself is an
//! out-of-scope collaborator here (see SPEC_FULL.md §0).

mod ancestors;

pub use ancestors::AncestorIndex;

use std::collections::HashSet;

use daggy::{Dag, NodeIndex, Walker};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{RevigoError, Result};

pub type TermId = u32;

/// A term's primary GO namespace, plus the job-level `Mixed` bucket used
/// when results from more than one namespace are combined (spec §3, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::EnumString)]
pub enum Namespace {
    #[strum(serialize = "biological_process")]
    BiologicalProcess,
    #[strum(serialize = "molecular_function")]
    MolecularFunction,
    #[strum(serialize = "cellular_component")]
    CellularComponent,
    #[strum(serialize = "mixed")]
    Mixed,
}

impl Namespace {
    pub const PRIMARY: [Namespace; 3] = [
        Namespace::BiologicalProcess,
        Namespace::MolecularFunction,
        Namespace::CellularComponent,
    ];
}

/// Relationship kinds recognized while reading a term's declared edges.
///
/// Only [`RawRelationship::IsA`], [`RawRelationship::PartOf`] (as parent
/// edges) and [`RawRelationship::HasPart`] (as a child-origin edge) affect
/// the graph. The regulatory/occurs-in/temporal kinds are recognized so a
/// caller can pass them through without an error, but the builder discards
/// them — matching spec §4.1's "recognized and ignored" list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawRelationship {
    IsA,
    PartOf,
    HasPart,
    Regulates,
    PositivelyRegulates,
    NegativelyRegulates,
    OccursIn,
    EndsDuring,
    HappensDuring,
}

impl RawRelationship {
    fn is_honored_parent_edge(self) -> bool {
        matches!(self, RawRelationship::IsA | RawRelationship::PartOf)
    }
}

/// Edge kind retained in the built graph (only the honored subset of
/// [`RawRelationship`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    IsA,
    PartOf,
    HasPart,
}

/// Pre-parsed term data handed to [`Ontology::build`]. The textual OBO/OBO-XML
/// parsing that produces these records is out of scope for this crate.
#[derive(Debug, Clone, Default)]
pub struct TermRecord {
    pub id: TermId,
    pub namespace: Option<Namespace>,
    pub name: String,
    pub description: String,
    pub comment: String,
    pub alt_ids: Vec<TermId>,
    pub alt_names: Vec<String>,
    pub is_obsolete: bool,
    pub replaced_by: Vec<TermId>,
    pub consider: Vec<TermId>,
    /// All relationships declared *on this record* pointing to a parent
    /// (`is_a`, `relationship: part_of X`, plus the ignored kinds for
    /// round-trip fidelity with an upstream parser).
    pub relationships: Vec<(TermId, RawRelationship)>,
    /// `relationship: has_part X` declared on this record: X becomes a
    /// child of this term.
    pub has_part: Vec<TermId>,
    pub keywords: Vec<compact_str::CompactString>,
}

/// A single GO term as retained inside an [`Ontology`] (spec §3).
#[derive(Debug, Clone)]
pub struct Term {
    pub id: TermId,
    pub namespace: Namespace,
    pub name: String,
    pub description: String,
    pub comment: String,
    pub alt_ids: Vec<TermId>,
    pub alt_names: Vec<String>,
    pub is_obsolete: bool,
    pub replacement_ids: Vec<TermId>,
    pub consider_ids: Vec<TermId>,
    pub parent_ids: Vec<TermId>,
    pub child_ids: Vec<TermId>,
    pub ancestors: FxHashSet<TermId>,
    pub root_id: TermId,
    pub keywords: FxHashSet<compact_str::CompactString>,
}

impl Term {
    pub fn formatted_id(&self) -> String {
        format!("GO:{:07}", self.id)
    }
}

/// The process-wide, read-only-after-load GO term DAG.
///
/// `id_index` maps *every* known ID — primary, alternate, and (redirected)
/// obsolete — to the node index of its canonical [`Term`], matching the
/// "Invariant" in spec §3: obsolete terms with a replacement alias to that
/// replacement; everything else keeps its own identity.
#[derive(Debug, Clone)]
pub struct Ontology {
    graph: Dag<TermId, EdgeKind, u32>,
    nodes: FxHashMap<TermId, NodeIndex>,
    terms: FxHashMap<TermId, Term>,
    id_index: FxHashMap<TermId, TermId>,
    /// IDs (primary obsolete ID or one of its `alt_id`s) that resolved to a
    /// canonical replacement, keyed to that replacement — used to surface
    /// the "obsolete term (with suggested replacement)" warning in §4.7.
    obsolete_replacement: FxHashMap<TermId, TermId>,
    /// Obsolete IDs declared with no `replaced_by` at all, so they resolve
    /// to nothing (§4.7's "obsolete terms" warning, no-replacement case).
    obsolete_without_replacement: FxHashSet<TermId>,
    /// Alternate IDs of a *non-obsolete* canonical term (not its own primary
    /// ID) — the "alternate-ID rewrite" warning case in §4.7.
    alt_ids: FxHashSet<TermId>,
}

impl Ontology {
    /// Build the DAG, resolve obsolete-term aliasing, and precompute every
    /// term's ancestor set and root in a single reverse/forward topological
    /// pass (spec §9 "Ancestor caching").
    pub fn build(records: Vec<TermRecord>) -> Result<Self> {
        let mut canonical: Vec<TermRecord> = Vec::with_capacity(records.len());
        let mut obsolete: Vec<TermRecord> = Vec::new();

        for record in records {
            if record.id == 0 {
                return Err(RevigoError::OntologyMalformed(record.id));
            }
            if record.namespace.is_none() && !record.is_obsolete {
                return Err(RevigoError::OntologyMalformed(record.id));
            }
            if record.is_obsolete {
                obsolete.push(record);
            } else {
                canonical.push(record);
            }
        }

        let mut graph: Dag<TermId, EdgeKind, u32> = Dag::new();
        let mut nodes: FxHashMap<TermId, NodeIndex> = FxHashMap::default();

        for record in &canonical {
            let idx = graph.add_node(record.id);
            nodes.insert(record.id, idx);
        }

        for record in &canonical {
            let child_idx = nodes[&record.id];
            for &(parent_id, kind) in &record.relationships {
                if !kind.is_honored_parent_edge() {
                    continue;
                }
                let Some(&parent_idx) = nodes.get(&parent_id) else {
                    continue;
                };
                let edge_kind = match kind {
                    RawRelationship::IsA => EdgeKind::IsA,
                    RawRelationship::PartOf => EdgeKind::PartOf,
                    _ => unreachable!("filtered by is_honored_parent_edge"),
                };
                let _ = graph.add_edge(parent_idx, child_idx, edge_kind);
            }
            for &child_id in &record.has_part {
                let Some(&other_child_idx) = nodes.get(&child_id) else {
                    continue;
                };
                let _ = graph.add_edge(child_idx, other_child_idx, EdgeKind::HasPart);
            }
        }

        let mut id_index: FxHashMap<TermId, TermId> = FxHashMap::default();
        let mut alt_ids: FxHashSet<TermId> = FxHashSet::default();
        for record in &canonical {
            id_index.insert(record.id, record.id);
            for &alt in &record.alt_ids {
                id_index.insert(alt, record.id);
                alt_ids.insert(alt);
            }
        }

        let mut obsolete_replacement: FxHashMap<TermId, TermId> = FxHashMap::default();
        let mut obsolete_without_replacement: FxHashSet<TermId> = FxHashSet::default();
        for record in &obsolete {
            let Some(&first_replacement) = record.replaced_by.first() else {
                // No replacement declared: the term simply has no canonical
                // target and is left out of the alias map.
                obsolete_without_replacement.insert(record.id);
                continue;
            };
            let canonical_id = *id_index.get(&first_replacement).ok_or(
                RevigoError::OntologyDanglingReplacement(record.id, first_replacement),
            )?;
            id_index.insert(record.id, canonical_id);
            obsolete_replacement.insert(record.id, canonical_id);
            for &alt in &record.alt_ids {
                id_index.insert(alt, canonical_id);
                obsolete_replacement.insert(alt, canonical_id);
            }
        }

        let (parent_ids, child_ids) = ancestors::direct_relations(&graph, &nodes, &canonical);
        let (ancestor_sets, root_ids) =
            ancestors::compute_ancestors_and_roots(&graph, &nodes, &parent_ids)?;

        let mut terms: FxHashMap<TermId, Term> = FxHashMap::default();
        for record in canonical {
            let id = record.id;
            terms.insert(
                id,
                Term {
                    id,
                    namespace: record.namespace.unwrap_or(Namespace::Mixed),
                    name: record.name,
                    description: record.description,
                    comment: record.comment,
                    alt_ids: record.alt_ids,
                    alt_names: record.alt_names,
                    is_obsolete: false,
                    replacement_ids: Vec::new(),
                    consider_ids: record.consider,
                    parent_ids: parent_ids.get(&id).cloned().unwrap_or_default(),
                    child_ids: child_ids.get(&id).cloned().unwrap_or_default(),
                    ancestors: ancestor_sets.get(&id).cloned().unwrap_or_default(),
                    root_id: *root_ids.get(&id).unwrap_or(&id),
                    keywords: record.keywords.into_iter().collect(),
                },
            );
        }

        Ok(Self {
            graph,
            nodes,
            terms,
            id_index,
            obsolete_replacement,
            obsolete_without_replacement,
            alt_ids,
        })
    }

    /// `true` if `id` was declared as an obsolete term (with or without a
    /// replacement) — used by a caller deciding whether to honor
    /// `remove_obsolete` (spec §4.7).
    pub fn is_obsolete_id(&self, id: TermId) -> bool {
        self.obsolete_replacement.contains_key(&id) || self.obsolete_without_replacement.contains(&id)
    }

    /// The canonical replacement `id` was redirected to, if `id` was an
    /// obsolete term with a declared replacement.
    pub fn obsolete_replacement_for(&self, id: TermId) -> Option<TermId> {
        self.obsolete_replacement.get(&id).copied()
    }

    /// `true` if `id` is an alternate ID of a non-obsolete canonical term
    /// (i.e. not that term's own primary ID, and not an obsolete alias).
    pub fn is_alt_id(&self, id: TermId) -> bool {
        self.alt_ids.contains(&id)
    }

    /// Resolve any known ID (primary, alternate, or obsolete-with-replacement)
    /// to its canonical [`Term`].
    pub fn term(&self, id: TermId) -> Option<&Term> {
        let canonical_id = self.id_index.get(&id)?;
        self.terms.get(canonical_id)
    }

    pub fn contains(&self, id: TermId) -> bool {
        self.id_index.contains_key(&id)
    }

    pub fn canonical_id(&self, id: TermId) -> Option<TermId> {
        self.id_index.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn node_index(&self, id: TermId) -> Option<NodeIndex> {
        self.nodes.get(&id).copied()
    }

    pub fn graph(&self) -> &Dag<TermId, EdgeKind, u32> {
        &self.graph
    }

    /// `true` iff `b` is in `a`'s cached ancestor set (spec §4.1).
    pub fn is_child_of(&self, a: TermId, b: TermId) -> bool {
        match self.term(a) {
            Some(term) => match self.canonical_id(b) {
                Some(canon_b) => term.ancestors.contains(&canon_b),
                None => false,
            },
            None => false,
        }
    }

    /// Intersection of `a` and `b`'s ancestor sets.
    pub fn common_ancestors(&self, a: TermId, b: TermId) -> HashSet<TermId> {
        match (self.term(a), self.term(b)) {
            (Some(ta), Some(tb)) => ta.ancestors.intersection(&tb.ancestors).copied().collect(),
            _ => HashSet::new(),
        }
    }

    /// Children of any parent of `t`, minus `t` itself (spec §4.1).
    pub fn siblings(&self, t: TermId) -> HashSet<TermId> {
        let Some(term) = self.term(t) else {
            return HashSet::new();
        };
        let canon_t = term.id;
        let mut result = HashSet::new();
        for &parent_id in &term.parent_ids {
            if let Some(parent) = self.term(parent_id) {
                for &child in &parent.child_ids {
                    if child != canon_t {
                        result.insert(child);
                    }
                }
            }
        }
        result
    }

    pub fn root(&self, t: TermId) -> Option<TermId> {
        self.term(t).map(|term| term.root_id)
    }

    /// Children of `t` via `is_a`/`part_of` inversion plus `has_part`.
    pub fn children_of(&self, t: TermId) -> impl Iterator<Item = TermId> + '_ {
        self.term(t)
            .into_iter()
            .flat_map(|term| term.child_ids.iter().copied())
    }

    /// Direct parents walker, exposed for callers that want to traverse the
    /// DAG manually instead of using the cached ancestor set.
    pub fn parents_walker(&self, idx: NodeIndex) -> daggy::Parents<TermId, EdgeKind, u32> {
        self.graph.parents(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: TermId, ns: Namespace, is_a: &[TermId]) -> TermRecord {
        TermRecord {
            id,
            namespace: Some(ns),
            name: format!("term {}", id),
            relationships: is_a.iter().map(|&p| (p, RawRelationship::IsA)).collect(),
            ..Default::default()
        }
    }

    fn three_level_chain() -> Vec<TermRecord> {
        vec![
            record(8150, Namespace::BiologicalProcess, &[]),
            record(9987, Namespace::BiologicalProcess, &[8150]),
            record(6807, Namespace::BiologicalProcess, &[9987]),
        ]
    }

    #[test]
    fn ancestors_and_root_are_transitive() {
        let ontology = Ontology::build(three_level_chain()).unwrap();
        let leaf = ontology.term(6807).unwrap();
        assert!(leaf.ancestors.contains(&9987));
        assert!(leaf.ancestors.contains(&8150));
        assert_eq!(leaf.root_id, 8150);
        assert!(ontology.is_child_of(6807, 8150));
    }

    #[test]
    fn siblings_excludes_self() {
        let mut records = three_level_chain();
        records.push(record(6810, Namespace::BiologicalProcess, &[9987]));
        let ontology = Ontology::build(records).unwrap();
        let siblings = ontology.siblings(6807);
        assert!(siblings.contains(&6810));
        assert!(!siblings.contains(&6807));
    }

    #[test]
    fn obsolete_term_aliases_to_first_replacement() {
        let mut records = three_level_chain();
        records.push(TermRecord {
            id: 1111,
            is_obsolete: true,
            replaced_by: vec![9987, 6807],
            ..Default::default()
        });
        let ontology = Ontology::build(records).unwrap();
        assert_eq!(ontology.canonical_id(1111), Some(9987));
        assert_eq!(ontology.term(1111).unwrap().id, ontology.term(9987).unwrap().id);
    }

    #[test]
    fn dangling_replacement_is_an_error() {
        let mut records = three_level_chain();
        records.push(TermRecord {
            id: 1111,
            is_obsolete: true,
            replaced_by: vec![424242],
            ..Default::default()
        });
        let err = Ontology::build(records).unwrap_err();
        assert_eq!(err, RevigoError::OntologyDanglingReplacement(1111, 424242));
    }

    #[test]
    fn missing_namespace_on_non_obsolete_term_is_malformed() {
        let records = vec![TermRecord {
            id: 42,
            namespace: None,
            ..Default::default()
        }];
        let err = Ontology::build(records).unwrap_err();
        assert_eq!(err, RevigoError::OntologyMalformed(42));
    }

    #[test]
    fn alt_id_resolves_to_primary_term() {
        let mut records = three_level_chain();
        records[1].alt_ids.push(90000);
        let ontology = Ontology::build(records).unwrap();
        assert_eq!(ontology.term(90000).unwrap().id, 9987);
    }

    #[test]
    fn part_of_and_has_part_both_produce_parentage() {
        let records = vec![
            record(5575, Namespace::CellularComponent, &[]),
            TermRecord {
                id: 5622,
                namespace: Some(Namespace::CellularComponent),
                relationships: vec![(5575, RawRelationship::PartOf)],
                ..Default::default()
            },
            TermRecord {
                id: 5623,
                namespace: Some(Namespace::CellularComponent),
                has_part: vec![5622],
                ..Default::default()
            },
        ];
        let ontology = Ontology::build(records).unwrap();
        assert!(ontology.term(5622).unwrap().parent_ids.contains(&5575));
        assert!(ontology.term(5623).unwrap().child_ids.contains(&5622));
    }

    #[test]
    fn ignored_relationship_kinds_do_not_create_edges() {
        let records = vec![
            record(8150, Namespace::BiologicalProcess, &[]),
            TermRecord {
                id: 9000,
                namespace: Some(Namespace::BiologicalProcess),
                relationships: vec![(8150, RawRelationship::Regulates)],
                ..Default::default()
            },
        ];
        let ontology = Ontology::build(records).unwrap();
        assert!(ontology.term(9000).unwrap().parent_ids.is_empty());
    }
}
