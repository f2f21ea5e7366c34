//! Threshold-graph export: kept terms as nodes, edges between pairs above a
//! similarity percentile, carrying the exact attribute names downstream
//! renderers expect (spec §4.6, "Threshold Graph").
//!
//! Grounded on `TaxaGO`'s `utils::common_ancestor` mermaid-chart generator
//! (the only file in the teacher that turns graph-shaped data into a
//! node/edge export) and its general pattern of building a small attribute
//! bag per node/edge rather than serializing straight to text — the actual
//! text encoding (XGMML/JS/JSON) stays a caller's job here, same as the
//! teacher leaves `.mmd` formatting inside the chart generator but the graph
//! construction itself stays separate.

use rustc_hash::FxHashMap;

use crate::clustering::RevigoTerm;
use crate::ontology::{Ontology, TermId};
use crate::similarity::SimilarityMatrix;

/// A node/edge attribute value. Not `serde_json::Value`: JSON encoding is an
/// out-of-scope collaborator concern, this is just the typed bag it would
/// read from.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    F64(f64),
    Str(String),
    Usize(usize),
}

pub struct GraphNode {
    pub id: TermId,
    pub attributes: FxHashMap<&'static str, AttrValue>,
}

pub struct GraphEdge {
    pub source: TermId,
    pub target: TermId,
    pub attributes: FxHashMap<&'static str, AttrValue>,
}

#[derive(Default)]
pub struct OntoloGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Similarity cut `τ` at the given percentile of `values` (spec §4.6 step 2:
/// `τ = sorted[max(⌊|pairs| · p⌋ − 1, 0)]`). `None` if `values` is empty (no
/// edges are emitted in that case).
fn similarity_cutoff(mut values: Vec<f64>, percentile: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let idx = ((values.len() as f64 * percentile.clamp(0.0, 1.0)).floor() as isize - 1).max(0) as usize;
    Some(values[idx.min(values.len() - 1)])
}

/// Map `value` onto an 8-bit ramp over the observed `[min, max]` range of
/// kept terms' values (spec §4.6 step 5): negative values ramp toward red
/// (`#ff____`), positive values toward green (`#__ff__`), scaled by how far
/// `value` sits from zero relative to whichever bound (`min` or `max`) it's
/// on the same side of.
fn color_ramp(value: f64, min: f64, max: f64) -> String {
    if value.is_nan() {
        return "#000000".to_string();
    }
    if value < 0.0 {
        let span = min.abs().max(f64::EPSILON);
        let t = (value.abs() / span).clamp(0.0, 1.0);
        format!("#ff{:02x}{:02x}", (255.0 * (1.0 - t)).round() as u8, (255.0 * (1.0 - t)).round() as u8)
    } else {
        let span = max.abs().max(f64::EPSILON);
        let t = (value / span).clamp(0.0, 1.0);
        format!("#{:02x}ff{:02x}", (255.0 * (1.0 - t)).round() as u8, (255.0 * (1.0 - t)).round() as u8)
    }
}

/// Build the exported graph from the kept subset of `terms`: nodes for every
/// kept term with its scores and 2D layout coordinates, edges for every pair
/// whose similarity is at or above the `percentile`-th percentile of the
/// full pairwise distribution.
pub fn build_threshold_graph(
    ontology: &Ontology,
    terms: &FxHashMap<TermId, RevigoTerm>,
    matrix: &SimilarityMatrix,
    coordinates: &FxHashMap<TermId, [f64; 2]>,
    percentile: f64,
    cut_off: f64,
) -> OntoloGraph {
    let kept: Vec<&RevigoTerm> = terms.values().filter(|t| t.is_retained(cut_off)).collect();

    // Step 1 of spec §4.6: the percentile is computed over the kept (or
    // pinned) terms' own pairwise similarities, not the full input matrix.
    let mut pair_sims = Vec::with_capacity(kept.len() * kept.len().saturating_sub(1) / 2);
    for i in 0..kept.len() {
        for j in (i + 1)..kept.len() {
            if let Some(sim) = matrix.similarity(kept[i].id, kept[j].id) {
                pair_sims.push(sim);
            }
        }
    }
    let cutoff = similarity_cutoff(pair_sims, percentile);

    let (min_value, max_value) = kept
        .iter()
        .map(|t| t.value)
        .filter(|v| !v.is_nan())
        .fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));

    let mut nodes = Vec::with_capacity(kept.len());
    for term in &kept {
        let mut attributes = FxHashMap::default();
        let description = ontology
            .term(term.id)
            .map(|t| t.description.clone())
            .unwrap_or_default();
        let pc = coordinates.get(&term.id).copied().unwrap_or([0.0, 0.0]);
        let value = if term.value.is_nan() { 0.0 } else { term.value };
        let log_size = if term.log_annotation_size.is_nan() {
            0.0
        } else {
            term.log_annotation_size
        };

        attributes.insert("description", AttrValue::Str(description));
        attributes.insert("value", AttrValue::F64(value));
        attributes.insert(
            "color",
            AttrValue::Str(color_ramp(term.value, min_value, max_value)),
        );
        attributes.insert("log_size", AttrValue::F64(log_size));
        attributes.insert(
            "LogSize",
            AttrValue::F64(if log_size.is_nan() { 0.0 } else { log_size }),
        );
        attributes.insert("PC_1", AttrValue::F64(pc[0]));
        attributes.insert("PC_2", AttrValue::F64(pc[1]));
        attributes.insert("dispensability", AttrValue::F64(term.dispensability));
        attributes.insert("uniqueness", AttrValue::F64(term.uniqueness));

        nodes.push(GraphNode {
            id: term.id,
            attributes,
        });
    }

    let mut edges = Vec::new();
    if let Some(cutoff) = cutoff {
        let mut raw_edges = Vec::new();
        for i in 0..kept.len() {
            for j in (i + 1)..kept.len() {
                let a = kept[i];
                let b = kept[j];
                let Some(sim) = matrix.similarity(a.id, b.id) else {
                    continue;
                };
                if sim < cutoff {
                    continue;
                }
                raw_edges.push((a.id, b.id, sim));
            }
        }
        let (min_sim, max_sim) = raw_edges
            .iter()
            .fold((1.0_f64, 0.0_f64), |(lo, hi), &(_, _, s)| (lo.min(s), hi.max(s)));
        let sim_span = (max_sim - min_sim).max(f64::EPSILON);

        for (source, target, sim) in raw_edges {
            let thickness = 1.0 + 4.0 * (sim - min_sim) / sim_span;
            let mut attributes = FxHashMap::default();
            attributes.insert("similarity", AttrValue::F64(sim));
            attributes.insert("thickness", AttrValue::F64(thickness));
            attributes.insert("weight", AttrValue::F64(sim));
            edges.push(GraphEdge {
                source,
                target,
                attributes,
            });
        }
    }

    OntoloGraph { nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::SpeciesAnnotations;
    use crate::ontology::{Namespace, TermRecord};
    use crate::similarity::SimilarityVariant;

    #[test]
    fn graph_has_one_node_per_kept_term_and_no_nodes_for_dispensed_ones() {
        let ontology = Ontology::build(vec![
            TermRecord {
                id: 1,
                namespace: Some(Namespace::BiologicalProcess),
                ..Default::default()
            },
            TermRecord {
                id: 2,
                namespace: Some(Namespace::BiologicalProcess),
                ..Default::default()
            },
        ])
        .unwrap();
        let annotations = SpeciesAnnotations::new(Default::default(), Default::default());
        let matrix =
            SimilarityMatrix::build(&ontology, &annotations, &[1, 2], SimilarityVariant::SimRel);

        let mut terms = FxHashMap::default();
        let mut kept = RevigoTerm::new(1, 0.01, 2.0, 10, 0.1);
        let mut dispensed = RevigoTerm::new(2, 0.01, 1.0, 10, 0.1);
        dispensed.dispensed_by_id = Some(1);
        dispensed.dispensability = 0.95;
        kept.uniqueness = 0.9;
        terms.insert(1, kept);
        terms.insert(2, dispensed);

        let coords = FxHashMap::default();
        let graph = build_threshold_graph(&ontology, &terms, &matrix, &coords, 0.5, 0.7);
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].id, 1);
    }
}
