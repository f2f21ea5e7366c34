//! Greedy dispensability assignment: the heart of redundancy reduction.
//! Walks term pairs from most to least semantically similar and, within each
//! similarity bucket, decides a winner/loser via a fixed tiebreak ladder
//! (spec §4.4, "Clustering Engine").
//!
//! Grounded on `TaxaGO`'s `analysis::elim_algorithm` (level-by-level greedy
//! elimination over a shared pool, tracking what's already been resolved so
//! later levels don't reconsider it) and `utils::common_ancestor` (the
//! parent/child size-ratio comparisons reused here for rule R4). The bucketed
//! RNG-ordered pair selection is new — TaxaGO's elimination has no tie-break
//! RNG because its levels are already totally ordered by GO graph depth.

use rustc_hash::{FxHashMap, FxHashSet};
use strum_macros::{Display, EnumString};

use crate::error::{RevigoError, Result};
use crate::ontology::{Ontology, TermId};
use crate::rng::{clustering_rng, uniform_index};
use crate::similarity::SimilarityMatrix;

/// How a term's raw input score is interpreted before clustering (spec §4.4
/// "Value transform", ambient `JobConfig` tagged union per SPEC_FULL.md §1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
pub enum ValueType {
    #[default]
    PValue,
    Higher,
    Lower,
    HigherAbsolute,
    HigherAbsLog2,
}

impl ValueType {
    /// Transform a raw input score into the `transformed_value` used for
    /// winner selection, where larger always means "more important to keep"
    /// (spec §4.7 "Transforms (value-type)"). The PValue variant's
    /// "silently drop values > 0.5" rule is a per-term filtering decision
    /// made by the caller (see `Job::run_namespace`), not part of this
    /// per-value transform.
    pub fn transform(self, value: f64) -> Result<f64> {
        match self {
            ValueType::PValue => {
                if !(0.0..=1.0).contains(&value) {
                    return Err(RevigoError::InputPValueOutOfRange(value));
                }
                Ok(-value.max(f64::MIN_POSITIVE).log10())
            }
            ValueType::Higher => Ok(value),
            ValueType::Lower => Ok(-value),
            ValueType::HigherAbsolute => Ok(value.abs()),
            ValueType::HigherAbsLog2 => {
                if value <= 0.0 {
                    return Err(RevigoError::InputNonPositiveForLog2(value));
                }
                Ok(value.log2().abs())
            }
        }
    }
}

/// A term as carried through clustering and layout: its scores, the
/// structural stats used for tiebreaking, and the outcome of dispensability
/// assignment (spec §3 "RevigoTerm").
#[derive(Debug, Clone)]
pub struct RevigoTerm {
    pub id: TermId,
    pub value: f64,
    pub transformed_value: f64,
    pub uniqueness: f64,
    pub dispensability: f64,
    pub annotation_size: u64,
    pub log_annotation_size: f64,
    pub annotation_frequency: f64,
    pub pinned: bool,
    pub representative_id: TermId,
    pub dispensed_by_id: Option<TermId>,
    pub pc: [f64; 2],
    pub pc3: [f64; 3],
    pub user_values: Vec<f64>,
}

impl RevigoTerm {
    pub fn new(
        id: TermId,
        value: f64,
        transformed_value: f64,
        annotation_size: u64,
        annotation_frequency: f64,
    ) -> Self {
        Self {
            id,
            value,
            transformed_value,
            uniqueness: 1.0,
            dispensability: 0.0,
            annotation_size,
            log_annotation_size: (annotation_size.max(1) as f64).ln(),
            annotation_frequency,
            pinned: false,
            representative_id: id,
            dispensed_by_id: None,
            pc: [0.0, 0.0],
            pc3: [0.0, 0.0, 0.0],
            user_values: Vec::new(),
        }
    }

    pub fn is_kept(&self) -> bool {
        self.dispensed_by_id.is_none()
    }

    /// Whether this term survives display at the given `cut_off` (spec
    /// §4.5/§4.6's "layout set"): a representative term always has
    /// `dispensability == 0.0` and is always retained; a dispensed term is
    /// retained only while its dispensability (the similarity to whatever
    /// dispensed it) stays at or below `cut_off`. A pinned term never
    /// accumulates a dispensability above `NaN`'s absence, since R1 always
    /// lets it win, so it is unconditionally retained too.
    pub fn is_retained(&self, cut_off: f64) -> bool {
        self.dispensability.is_nan() || self.dispensability <= cut_off
    }
}

/// Terms past this annotation frequency are "too general" and lose a tie
/// against any competitor below it (rule R2, spec §4.4's literal 0.05).
const GENERALITY_THRESHOLD: f64 = 0.05;

/// Transformed-value (or uniqueness-substitute) gaps within this fraction of
/// the pair's average are treated as statistically indistinguishable (rule
/// R3's "10%-of-average confidence interval").
const VALUE_CONFIDENCE_INTERVAL: f64 = 0.10;

/// A child whose annotation size is within this fraction of its parent's
/// ("(parent - child) / parent < 0.25") means the parent is basically "just
/// the child" and loses; otherwise the child is the negligible one and
/// loses (rule R4).
const PARENT_CHILD_SIZE_RATIO: f64 = 0.25;

/// Tuning knobs for the R3/R5 winner-selection ladder (spec §4.4: "larger
/// wins is parameterizable by a `keep_greater` flag; default true" and "an
/// optional `|log10(max(x,1e-300))|` transform ... default false").
#[derive(Debug, Clone, Copy)]
pub struct ClusteringOptions {
    pub keep_greater: bool,
    pub log_transform_value: bool,
}

impl Default for ClusteringOptions {
    fn default() -> Self {
        Self {
            keep_greater: true,
            log_transform_value: false,
        }
    }
}

/// Admit a pair into the bucketed elimination only when its rounded
/// similarity exceeds -1 (always true for a well-formed `sim ∈ [0,1]`, but
/// checked explicitly for symmetry with spec §4.4) and the two terms'
/// transformed values either agree in sign or at least one is `NaN` (spec
/// §4.4 "Grouping"): a term that *hurts* the user's ranking should never be
/// collapsed into one that helps it.
fn pair_admitted(sim: f64, a: &RevigoTerm, b: &RevigoTerm) -> bool {
    if sim <= -1.0 {
        return false;
    }
    let a_nan = a.transformed_value.is_nan();
    let b_nan = b.transformed_value.is_nan();
    a_nan || b_nan || a.transformed_value.signum() == b.transformed_value.signum()
}

/// Assign `dispensability`/`dispensed_by_id`/`representative_id` in place by
/// walking similarity buckets from most to least similar over *every* pair
/// in `matrix` (clustering itself has no similarity floor — `cut_off` only
/// governs what the layout/graph stages later retain). Within a bucket, pair
/// order is shuffled with the seeded clustering RNG so that terms tied on
/// similarity don't always resolve in ID order.
///
/// Calls `on_progress` with a fraction in `[0, 1]`, half of it marking the
/// end of pair-bucket construction and the other half tracking consumption
/// of the buckets themselves (spec §4.4 "Progress": "Report progress twice:
/// half during pair-bucket construction, half during consumption").
pub fn assign_dispensability(
    terms: &mut FxHashMap<TermId, RevigoTerm>,
    ontology: &Ontology,
    matrix: &SimilarityMatrix,
    options: ClusteringOptions,
    mut on_progress: impl FnMut(f64),
    mut should_cancel: impl FnMut() -> bool,
) {
    let ids = matrix.terms();
    let n = ids.len();
    if n < 2 {
        on_progress(1.0);
        return;
    }

    let mut buckets: FxHashMap<i64, Vec<(usize, usize)>> = FxHashMap::default();
    for i in 0..n {
        for j in (i + 1)..n {
            let sim = matrix.similarity_by_index(i, j);
            if !pair_admitted(sim, &terms[&ids[i]], &terms[&ids[j]]) {
                continue;
            }
            let key = (sim * 1e8).round() as i64;
            buckets.entry(key).or_default().push((i, j));
        }
    }
    on_progress(0.5);

    let total_pairs: usize = buckets.values().map(Vec::len).sum();
    if total_pairs == 0 {
        on_progress(1.0);
        return;
    }

    let mut bucket_keys: Vec<i64> = buckets.keys().copied().collect();
    bucket_keys.sort_unstable_by(|a, b| b.cmp(a));

    let mut rng = clustering_rng();
    let mut dispensed: FxHashSet<TermId> = FxHashSet::default();
    let mut consumed = 0usize;

    for key in bucket_keys {
        if should_cancel() {
            return;
        }
        let mut pairs = buckets.remove(&key).unwrap();
        shuffle(&mut pairs, &mut rng);
        let sim = key as f64 / 1e8;

        for (i, j) in pairs {
            if should_cancel() {
                return;
            }
            let a_id = ids[i];
            let b_id = ids[j];
            consumed += 1;
            on_progress(0.5 + 0.5 * consumed as f64 / total_pairs as f64);
            if dispensed.contains(&a_id) || dispensed.contains(&b_id) {
                continue;
            }
            let (winner, loser) = {
                let a = &terms[&a_id];
                let b = &terms[&b_id];
                pick_winner(ontology, a, b, options)
            };
            let loser_entry = terms.get_mut(&loser).unwrap();
            loser_entry.dispensability = loser_entry.dispensability.max(sim);
            loser_entry.dispensed_by_id = Some(winner);
            loser_entry.representative_id = winner;
            dispensed.insert(loser);
        }
    }
}

/// Rules R1–R5, applied in order until one picks a winner. Returns
/// `(winner_id, loser_id)`.
fn pick_winner(
    ontology: &Ontology,
    a: &RevigoTerm,
    b: &RevigoTerm,
    options: ClusteringOptions,
) -> (TermId, TermId) {
    // R1: a pinned term always outranks an unpinned one.
    if a.pinned != b.pinned {
        return if a.pinned { (a.id, b.id) } else { (b.id, a.id) };
    }

    // R2: a term past the generality ceiling loses to a more specific one.
    let a_general = a.annotation_frequency > GENERALITY_THRESHOLD;
    let b_general = b.annotation_frequency > GENERALITY_THRESHOLD;
    if a_general != b_general {
        return if a_general { (b.id, a.id) } else { (a.id, b.id) };
    }

    // R3: larger comparison value wins, substituting `uniqueness` (then 0)
    // for a `NaN` transformed value, optionally log-transformed, unless the
    // two fall within a 10%-of-average confidence interval of each other —
    // in which case fall through to the structural tiebreaks (R4/R5).
    let raw_a = comparison_value(a);
    let raw_b = comparison_value(b);
    let (val_a, val_b) = if options.log_transform_value {
        (
            val_a_log_transform(raw_a),
            val_a_log_transform(raw_b),
        )
    } else {
        (raw_a, raw_b)
    };
    let average = (val_a + val_b) / 2.0;
    let within_ci = average != 0.0 && (val_a - val_b).abs() < VALUE_CONFIDENCE_INTERVAL * average.abs();
    if !within_ci {
        let a_is_greater = val_a > val_b;
        let a_wins = a_is_greater == options.keep_greater;
        return if a_wins { (a.id, b.id) } else { (b.id, a.id) };
    }

    // R4: a parent/child pair resolves by how close in size the parent is
    // to the child: if the parent is "mostly" the child (their sizes are
    // within 25% of each other), the parent is the redundant one and loses;
    // otherwise the child is the negligible sliver and loses.
    if let Some((parent, child)) = ancestor_pair(ontology, a, b) {
        let parent_size = parent.annotation_size as f64;
        let child_size = child.annotation_size as f64;
        if parent_size > 0.0 {
            let ratio = (parent_size - child_size) / parent_size;
            return if ratio < PARENT_CHILD_SIZE_RATIO {
                (child.id, parent.id)
            } else {
                (parent.id, child.id)
            };
        }
    }

    // R5: otherwise prefer whichever term was nominally greater before the
    // confidence-interval equalization above, same "Larger-wins" outcome
    // label as R3 and so gated by the same `keep_greater` flag; ties broken
    // by the smaller ID for a fully deterministic result.
    if val_a != val_b {
        let a_is_greater = val_a > val_b;
        let a_wins = a_is_greater == options.keep_greater;
        return if a_wins { (a.id, b.id) } else { (b.id, a.id) };
    }
    if a.id <= b.id {
        (a.id, b.id)
    } else {
        (b.id, a.id)
    }
}

/// R3's comparison value: `transformed_value`, or `uniqueness` if that's
/// `NaN`, or `0.0` if both are.
fn comparison_value(t: &RevigoTerm) -> f64 {
    if !t.transformed_value.is_nan() {
        t.transformed_value
    } else if !t.uniqueness.is_nan() {
        t.uniqueness
    } else {
        0.0
    }
}

fn val_a_log_transform(x: f64) -> f64 {
    x.abs().max(1e-300).log10().abs()
}

/// If one of `a`/`b` is an ancestor of the other, returns `(parent, child)`
/// in that order; `None` if neither is.
fn ancestor_pair<'a>(
    ontology: &Ontology,
    a: &'a RevigoTerm,
    b: &'a RevigoTerm,
) -> Option<(&'a RevigoTerm, &'a RevigoTerm)> {
    if ontology.is_child_of(b.id, a.id) {
        Some((a, b))
    } else if ontology.is_child_of(a.id, b.id) {
        Some((b, a))
    } else {
        None
    }
}

fn shuffle<T>(items: &mut [T], rng: &mut rand_mt::Mt19937GenRand32) {
    for i in (1..items.len()).rev() {
        let j = uniform_index(rng, i + 1);
        items.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::{Namespace, RawRelationship, TermRecord};
    use crate::similarity::SimilarityVariant;
    use crate::annotation::SpeciesAnnotations;

    fn ontology_with_chain() -> Ontology {
        Ontology::build(vec![
            TermRecord {
                id: 8150,
                namespace: Some(Namespace::BiologicalProcess),
                ..Default::default()
            },
            TermRecord {
                id: 9987,
                namespace: Some(Namespace::BiologicalProcess),
                relationships: vec![(8150, RawRelationship::IsA)],
                ..Default::default()
            },
            TermRecord {
                id: 6807,
                namespace: Some(Namespace::BiologicalProcess),
                relationships: vec![(9987, RawRelationship::IsA)],
                ..Default::default()
            },
        ])
        .unwrap()
    }

    #[test]
    fn pinned_term_always_wins() {
        let ontology = ontology_with_chain();
        let mut a = RevigoTerm::new(8150, 0.01, 2.0, 100, 0.1);
        let mut b = RevigoTerm::new(9987, 0.01, 5.0, 100, 0.1);
        a.pinned = true;
        let (winner, loser) = pick_winner(&ontology, &a, &b, ClusteringOptions::default());
        assert_eq!(winner, 8150);
        assert_eq!(loser, 9987);
        let _ = &mut b;
    }

    #[test]
    fn higher_transformed_value_wins_absent_other_factors() {
        let ontology = ontology_with_chain();
        let a = RevigoTerm::new(8150, 0.01, 2.0, 100, 0.1);
        let b = RevigoTerm::new(9987, 0.001, 5.0, 100, 0.1);
        let (winner, _) = pick_winner(&ontology, &a, &b, ClusteringOptions::default());
        assert_eq!(winner, 9987);
    }

    #[test]
    fn assign_dispensability_retires_the_weaker_of_a_similar_pair() {
        let ontology = ontology_with_chain();
        let mut freq = rustc_hash::FxHashMap::default();
        freq.insert(8150, 0.3);
        freq.insert(9987, 0.1);
        freq.insert(6807, 0.02);
        let annotations = SpeciesAnnotations::new(rustc_hash::FxHashMap::default(), freq);
        let matrix = SimilarityMatrix::build(
            &ontology,
            &annotations,
            &[9987, 6807],
            SimilarityVariant::SimRel,
        );

        let mut terms = rustc_hash::FxHashMap::default();
        // Both above the 0.05 generality threshold so R2 doesn't discriminate
        // between them; the higher transformed_value (R3) should decide it.
        terms.insert(9987, RevigoTerm::new(9987, 0.001, 6.0, 50, 0.1));
        terms.insert(6807, RevigoTerm::new(6807, 0.5, 0.5, 50, 0.08));

        assign_dispensability(
            &mut terms,
            &ontology,
            &matrix,
            ClusteringOptions::default(),
            |_| {},
            || false,
        );

        let kept = terms.values().filter(|t| t.is_kept()).count();
        assert_eq!(kept, 1);
        assert!(terms[&9987].is_kept());
        assert!(!terms[&6807].is_kept());
        assert_eq!(terms[&6807].dispensed_by_id, Some(9987));
    }

    fn ontology_with_siblings() -> Ontology {
        Ontology::build(vec![
            TermRecord {
                id: 8150,
                namespace: Some(Namespace::BiologicalProcess),
                ..Default::default()
            },
            TermRecord {
                id: 9987,
                namespace: Some(Namespace::BiologicalProcess),
                relationships: vec![(8150, RawRelationship::IsA)],
                ..Default::default()
            },
            TermRecord {
                id: 6807,
                namespace: Some(Namespace::BiologicalProcess),
                relationships: vec![(8150, RawRelationship::IsA)],
                ..Default::default()
            },
        ])
        .unwrap()
    }

    #[test]
    fn r5_respects_keep_greater_like_r3_does() {
        // Neither pinned (R1 silent), both below the generality threshold
        // (R2 silent), values close enough to fall inside the 10%-of-average
        // confidence interval (R3 silent), and siblings rather than
        // ancestor/descendant (R4 silent) — so the outcome is decided purely
        // by R5's "Larger-wins" fallback.
        let ontology = ontology_with_siblings();
        let a = RevigoTerm::new(9987, 0.01, 10.0, 100, 0.01);
        let b = RevigoTerm::new(6807, 0.01, 10.5, 100, 0.01);

        let default_options = ClusteringOptions::default();
        let (winner, _) = pick_winner(&ontology, &a, &b, default_options);
        assert_eq!(winner, 6807, "default keep_greater=true should keep the larger value");

        let inverted_options = ClusteringOptions {
            keep_greater: false,
            ..default_options
        };
        let (winner, _) = pick_winner(&ontology, &a, &b, inverted_options);
        assert_eq!(winner, 9987, "keep_greater=false should keep the smaller value");
    }

    #[test]
    fn assign_dispensability_reports_progress_from_zero_to_one() {
        let ontology = ontology_with_chain();
        let mut freq = rustc_hash::FxHashMap::default();
        freq.insert(9987, 0.3);
        freq.insert(6807, 0.1);
        let annotations = SpeciesAnnotations::new(rustc_hash::FxHashMap::default(), freq);
        let matrix = SimilarityMatrix::build(
            &ontology,
            &annotations,
            &[9987, 6807],
            SimilarityVariant::SimRel,
        );

        let mut terms = rustc_hash::FxHashMap::default();
        terms.insert(9987, RevigoTerm::new(9987, 0.001, 6.0, 50, 0.1));
        terms.insert(6807, RevigoTerm::new(6807, 0.5, 0.5, 50, 0.08));

        let mut fractions = Vec::new();
        assign_dispensability(
            &mut terms,
            &ontology,
            &matrix,
            ClusteringOptions::default(),
            |fraction| fractions.push(fraction),
            || false,
        );

        assert!(!fractions.is_empty());
        assert_eq!(*fractions.first().unwrap(), 0.5);
        assert_eq!(*fractions.last().unwrap(), 1.0);
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
    }
}
