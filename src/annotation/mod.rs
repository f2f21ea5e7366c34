//! Per-species annotation sizes/frequencies with ancestor/sibling/global
//! imputation for terms the source corpus never annotated directly (spec
//! §4.2, "Annotation Imputation").
//!
//! Grounded on `TaxaGO`'s `parsers::background_parser::BackgroundPop` (the
//! `FxHashMap<GOTermID, _>` counts keyed by GO id) and
//! `analysis::count_propagation::GOAncestorCache` (propagating counts up a
//! cached ancestor set rather than re-walking the DAG per query). The
//! memoization layer here is new: TaxaGO computes its propagated counts once
//! up front for every term, whereas imputation is on-demand and per-job, so
//! it needs a guard against repeated recomputation within a single run.

use std::sync::RwLock;

use rustc_hash::FxHashMap;

use crate::ontology::{Ontology, TermId};

const MAX_FREQUENCY: f64 = 0.75;

/// Annotation counts for one species/database snapshot, with memoized
/// imputed values for terms lacking a direct count.
///
/// The memo tables use a `RwLock` rather than building every imputed value
/// up front: most terms in a typical input list already have a direct count,
/// so paying the imputation cost only for the minority that need it (and
/// only once, on first lookup) is cheaper than a write-once eager pass. See
/// DESIGN.md for the alternative considered.
pub struct SpeciesAnnotations {
    size: FxHashMap<TermId, u64>,
    freq: FxHashMap<TermId, f64>,
    global_average_size: f64,
    global_average_freq: f64,
    imputed_size: RwLock<FxHashMap<TermId, u64>>,
    imputed_freq: RwLock<FxHashMap<TermId, f64>>,
}

impl SpeciesAnnotations {
    /// Build from direct per-term counts. `size` is the number of proteins
    /// annotated (directly or via propagation upstream of this crate) with
    /// each term; `freq` is that count's fraction of the species proteome.
    pub fn new(size: FxHashMap<TermId, u64>, freq: FxHashMap<TermId, f64>) -> Self {
        let global_average_size = average(size.values().copied().map(|v| v as f64));
        let global_average_freq = average(freq.values().copied());
        Self {
            size,
            freq,
            global_average_size,
            global_average_freq,
            imputed_size: RwLock::new(FxHashMap::default()),
            imputed_freq: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn has_direct(&self, term: TermId) -> bool {
        self.size.contains_key(&term) || self.freq.contains_key(&term)
    }

    /// Annotation size for `term`, imputed via the sibling/child/parent/
    /// global-average fallback chain (spec §4.2) when no direct count
    /// exists. The imputed value is memoized for the lifetime of `self`.
    pub fn get_size(&self, ontology: &Ontology, term: TermId) -> u64 {
        if let Some(&direct) = self.size.get(&term) {
            return direct;
        }
        if let Some(&memoized) = self.imputed_size.read().unwrap().get(&term) {
            return memoized;
        }
        let imputed = self
            .impute_size(ontology, term)
            .unwrap_or(self.global_average_size.round() as u64);
        self.imputed_size.write().unwrap().insert(term, imputed);
        imputed
    }

    /// Annotation frequency for `term` via the same fallback chain as
    /// [`Self::get_size`]. Only a value *inherited from a parent* (step 3 of
    /// the chain) is clamped to `MAX_FREQUENCY`, inside [`Self::impute_freq`]
    /// itself — a direct count is never clamped (spec §4.2: the clamp exists
    /// solely to stop the implicit root frequency of 1.0 from propagating
    /// onto a child, not to cap genuinely large direct frequencies).
    pub fn get_frequency(&self, ontology: &Ontology, term: TermId) -> f64 {
        if let Some(&direct) = self.freq.get(&term) {
            return direct;
        }
        if let Some(&memoized) = self.imputed_freq.read().unwrap().get(&term) {
            return memoized;
        }
        let imputed = self
            .impute_freq(ontology, term)
            .unwrap_or(self.global_average_freq);
        self.imputed_freq.write().unwrap().insert(term, imputed);
        imputed
    }

    /// Four-step fallback chain (spec §4.2): (1) mean of known usable
    /// siblings, (2) largest known child, (3) smallest known non-root
    /// parent, (4) global average. Each step only looks at `term`'s own
    /// immediate siblings/children/parents — there is no further recursion
    /// into a neighbor's own imputation, so a miss at every step falls
    /// straight through to the caller's global-average default.
    fn impute_size(&self, ontology: &Ontology, term: TermId) -> Option<u64> {
        let siblings = ontology.siblings(term);
        let sibling_values: Vec<u64> = siblings
            .iter()
            .filter_map(|&c| self.size.get(&c).copied())
            .filter(|&v| v > 0)
            .collect();
        if !sibling_values.is_empty() {
            return Some(average(sibling_values.into_iter().map(|v| v as f64)).round() as u64);
        }

        let t = ontology.term(term)?;
        let child_values: Vec<u64> = t
            .child_ids
            .iter()
            .filter_map(|c| self.size.get(c).copied())
            .filter(|&v| v > 0)
            .collect();
        if let Some(&largest) = child_values.iter().max() {
            return Some(largest);
        }

        let non_root_parent_values: Vec<u64> = t
            .parent_ids
            .iter()
            .filter(|&&p| ontology.term(p).map(|pt| !pt.parent_ids.is_empty()).unwrap_or(false))
            .filter_map(|p| self.size.get(p).copied())
            .filter(|&v| v > 0)
            .collect();
        non_root_parent_values.into_iter().min()
    }

    /// Same fallback chain as [`Self::impute_size`], additionally clamping a
    /// value inherited from step (3) — "smallest known parent" — to
    /// `MAX_FREQUENCY` before it's returned, so the implicit root frequency
    /// of 1.0 never propagates unclamped onto a child (spec §4.2).
    fn impute_freq(&self, ontology: &Ontology, term: TermId) -> Option<f64> {
        let siblings = ontology.siblings(term);
        let sibling_values: Vec<f64> = siblings
            .iter()
            .filter_map(|&c| self.freq.get(&c).copied())
            .filter(|v| *v > 0.0 && !v.is_nan())
            .collect();
        if !sibling_values.is_empty() {
            return Some(average(sibling_values.into_iter()));
        }

        let t = ontology.term(term)?;
        let child_values: Vec<f64> = t
            .child_ids
            .iter()
            .filter_map(|c| self.freq.get(c).copied())
            .filter(|v| *v > 0.0 && !v.is_nan())
            .collect();
        if let Some(largest) = child_values
            .into_iter()
            .max_by(|a, b| a.partial_cmp(b).unwrap())
        {
            return Some(largest);
        }

        let non_root_parent_values: Vec<f64> = t
            .parent_ids
            .iter()
            .filter(|&&p| ontology.term(p).map(|pt| !pt.parent_ids.is_empty()).unwrap_or(false))
            .filter_map(|p| self.freq.get(p).copied())
            .filter(|v| *v > 0.0 && !v.is_nan())
            .collect();
        non_root_parent_values
            .into_iter()
            .min_by(|a, b| a.partial_cmp(b).unwrap())
            .map(|smallest| smallest.min(MAX_FREQUENCY))
    }
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        sum += v;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
