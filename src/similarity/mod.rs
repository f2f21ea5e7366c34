//! Pairwise semantic similarity between GO terms and the packed matrix that
//! stores it (spec §4.3, "Similarity Matrix").
//!
//! Grounded on `TaxaGO`'s `utils::semantic_similarity` (information-content
//! style scoring off per-term annotation frequency) and its general
//! preference for flat `Vec`-backed numeric storage over nested maps (e.g.
//! `analysis::enrichment_analysis::ContingencyTable`'s `[usize; 4]`) — here
//! generalized to a packed upper-triangle `Vec<f64>` since the matrix is
//! symmetric with an undefined diagonal.

use rustc_hash::FxHashMap;
use strum_macros::{Display, EnumString};

use crate::annotation::SpeciesAnnotations;
use crate::ontology::{Ontology, TermId};

/// Which semantic similarity formula to score term pairs with (spec §4.3).
/// `SimRel` is REVIGO's historical default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
pub enum SimilarityVariant {
    Resnik,
    Lin,
    #[default]
    SimRel,
    Jiang,
}

/// `log10(freq)`, clamped so a zero frequency (a term annotating nothing in
/// this species) doesn't produce `-infinity`.
fn log10_freq(freq: f64) -> f64 {
    freq.max(f64::MIN_POSITIVE).log10()
}

impl SimilarityVariant {
    /// Score a pair of distinct terms from their own frequencies and the
    /// frequency of their most informative common ancestor (MIA) — the
    /// exact formulas of spec §4.3's table, all in terms of `log10`, not an
    /// abstracted information-content quantity.
    fn score(self, freq_a: f64, freq_b: f64, freq_mia: f64) -> f64 {
        let log_a = log10_freq(freq_a);
        let log_b = log10_freq(freq_b);
        let log_mia = log10_freq(freq_mia);
        match self {
            SimilarityVariant::Resnik => (-log_mia).min(4.0) / 4.0,
            SimilarityVariant::Lin => 2.0 * log_mia / (log_a + log_b),
            SimilarityVariant::SimRel => {
                let lin = 2.0 * log_mia / (log_a + log_b);
                lin * (1.0 - freq_mia)
            }
            SimilarityVariant::Jiang => 1.0 / (-log_a - log_b + 2.0 * log_mia + 1.0),
        }
    }
}

/// Index of a term's position in a [`SimilarityMatrix`], assigned by
/// insertion order at build time.
pub type MatrixIndex = usize;

/// A symmetric, zero-diagonal pairwise similarity table stored as a packed
/// upper triangle: `n*(n-1)/2` entries instead of `n*n`, since the diagonal
/// is never queried (self-similarity is always maximal by definition) and
/// the lower triangle mirrors the upper one.
pub struct SimilarityMatrix {
    variant: SimilarityVariant,
    term_order: Vec<TermId>,
    index_of: FxHashMap<TermId, MatrixIndex>,
    packed: Vec<f64>,
}

fn packed_index(n: usize, i: usize, j: usize) -> usize {
    let (i, j) = if i < j { (i, j) } else { (j, i) };
    i * n - i * (i + 1) / 2 + (j - i - 1)
}

impl SimilarityMatrix {
    /// Compute the full pairwise table for `terms` under `variant`, using
    /// `annotations` (imputed as needed) for each term's information content
    /// and the MIA's information content/frequency.
    pub fn build(
        ontology: &Ontology,
        annotations: &SpeciesAnnotations,
        terms: &[TermId],
        variant: SimilarityVariant,
    ) -> Self {
        let n = terms.len();
        let term_order = terms.to_vec();
        let index_of: FxHashMap<TermId, MatrixIndex> = term_order
            .iter()
            .enumerate()
            .map(|(idx, &id)| (id, idx))
            .collect();

        let freq: Vec<f64> = term_order
            .iter()
            .map(|&t| annotations.get_frequency(ontology, t))
            .collect();

        let mut packed = vec![0.0_f64; n * n.saturating_sub(1) / 2];

        for i in 0..n {
            for j in (i + 1)..n {
                // MIA = most-informative common ancestor = the one with the
                // *lowest* frequency (spec §4.3); 1.0 if there are none.
                let common = ontology.common_ancestors(term_order[i], term_order[j]);
                let freq_mia = common
                    .into_iter()
                    .map(|a| annotations.get_frequency(ontology, a))
                    .fold(1.0_f64, f64::min);
                let sim = variant.score(freq[i], freq[j], freq_mia);
                packed[packed_index(n, i, j)] = sim;
            }
        }

        Self {
            variant,
            term_order,
            index_of,
            packed,
        }
    }

    pub fn variant(&self) -> SimilarityVariant {
        self.variant
    }

    pub fn len(&self) -> usize {
        self.term_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.term_order.is_empty()
    }

    pub fn terms(&self) -> &[TermId] {
        &self.term_order
    }

    pub fn matrix_index(&self, term: TermId) -> Option<MatrixIndex> {
        self.index_of.get(&term).copied()
    }

    /// Similarity between two terms; `1.0` if `a == b` (self-similarity is
    /// always maximal and is never stored).
    pub fn similarity(&self, a: TermId, b: TermId) -> Option<f64> {
        if a == b {
            return Some(1.0);
        }
        let i = self.matrix_index(a)?;
        let j = self.matrix_index(b)?;
        Some(self.packed[packed_index(self.term_order.len(), i, j)])
    }

    pub fn similarity_by_index(&self, i: MatrixIndex, j: MatrixIndex) -> f64 {
        if i == j {
            return 1.0;
        }
        self.packed[packed_index(self.term_order.len(), i, j)]
    }

    /// Per-term uniqueness: the squared mean semantic distance to every other
    /// non-`NaN`-similar term in the matrix (spec §4.3) — `k <= 1` (no usable
    /// neighbor) returns `1.0` outright; otherwise `(1 - S/k)^2`, so isolation
    /// in semantic space is emphasized quadratically rather than linearly.
    pub fn uniqueness(&self, term: TermId) -> Option<f64> {
        let i = self.matrix_index(term)?;
        let n = self.term_order.len();
        let mut sum = 0.0;
        let mut k = 0usize;
        for j in 0..n {
            if j == i {
                continue;
            }
            let sim = self.similarity_by_index(i, j);
            if sim.is_nan() {
                continue;
            }
            sum += sim;
            k += 1;
        }
        if k <= 1 {
            return Some(1.0);
        }
        Some((1.0 - sum / k as f64).powi(2))
    }
}
