//! Word-corpus summaries run once at the tail of a job (spec §4.7 "Word
//! summaries (tail, one-shot)"): **enrichment** compares each keyword's
//! frequency among kept terms against its frequency in the species' whole
//! keyword corpus, and **correlation** ranks keyword presence against each
//! term's `transformed_value` via Spearman rank correlation, significance
//! tested with a seeded-shuffle permutation test (spec §9 "word-correlation
//! shuffle"). Both read `by_namespace`'s `Mixed` result only; neither mutates
//! core clustering/layout state.
//!
//! Grounded on `TaxaGO`'s `analysis::enrichment_analysis` two ways: the
//! enrichment half reuses its exact contingency-table/log-odds-ratio/
//! hypergeometric-test shape (`create_contingency_table`,
//! `calculate_log_odds_ratio`, `hypergeometric_test`), generalized from
//! "study vs. background GO-term counts" to "kept-term vs. corpus keyword
//! counts"; the correlation half has no contingency-table precedent (a
//! continuous `transformed_value` has no 2x2 table to build), so it's built
//! directly from spec §4.7/§9's rank-correlation-plus-shuffle description.

use std::collections::HashMap;

use compact_str::CompactString;
use rustc_hash::FxHashMap;
use statrs::distribution::{DiscreteCDF, Hypergeometric};

use crate::ontology::{Namespace, Ontology, TermId};
use crate::rng::{uniform_index, word_correlation_rng};

use super::NamespaceResult;

const PERMUTATIONS: usize = 1000;
const TOP_N: usize = 20;

/// Per-species keyword counts, supplied alongside
/// [`crate::annotation::SpeciesAnnotations`] (an out-of-scope collaborator
/// builds this from a Uniprot keyword file; see SPEC_FULL.md §2 "C1 Ontology
/// Model"): how many annotated proteins/terms in the species background
/// carry each keyword, and how many carry any keyword at all.
#[derive(Debug, Clone, Default)]
pub struct WordCorpus {
    pub counts: FxHashMap<CompactString, u64>,
    pub total: u64,
}

/// A `[study_with_word, study_without, background_with_word,
/// background_without]` contingency table, Laplace-smoothed by one
/// (TaxaGO's `create_contingency_table`) so a keyword absent from either
/// side never produces a zero cell.
type ContingencyTable = [u64; 4];

fn contingency_table(
    study_with_word: usize,
    background_with_word: u64,
    total_study: usize,
    total_background: u64,
) -> ContingencyTable {
    let a = study_with_word as u64;
    let b = (total_study as u64).saturating_sub(a);
    let c = background_with_word.saturating_sub(a);
    let d = total_background
        .saturating_sub(background_with_word)
        .saturating_sub((total_study as u64).saturating_sub(a));
    [a + 1, b + 1, c + 1, d + 1]
}

fn log_odds_ratio(counts: &ContingencyTable) -> f64 {
    let [a, b, c, d] = *counts;
    ((a as f64) * (d as f64) / ((b as f64) * (c as f64))).ln()
}

/// One-sided hypergeometric test: probability of seeing at least as many
/// study hits as observed, given the background composition (TaxaGO's
/// `hypergeometric_test`).
fn hypergeometric_p_value(counts: &ContingencyTable) -> f64 {
    let [a, b, c, d] = *counts;
    let k = a;
    let n = a + b;
    let big_k = a + c;
    let big_n = a + b + c + d;
    match Hypergeometric::new(big_n, big_k, n) {
        Ok(dist) => dist.sf(k.saturating_sub(1)),
        Err(_) => 1.0,
    }
}

#[derive(Debug, Clone)]
pub struct WordEnrichment {
    pub word: CompactString,
    pub log_odds_ratio: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone)]
pub struct WordCorrelation {
    pub word: CompactString,
    pub correlation: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, Default)]
pub struct WordSummary {
    pub enrichment: Vec<WordEnrichment>,
    pub correlations: Vec<WordCorrelation>,
}

/// Rank-transform `values`, averaging ranks across ties (the standard
/// Spearman tie-handling rule).
fn rank(values: &[f64]) -> Vec<f64> {
    let mut indexed: Vec<(usize, f64)> = values.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < indexed.len() {
        let mut j = i;
        while j + 1 < indexed.len() && indexed[j + 1].1 == indexed[i].1 {
            j += 1;
        }
        let average_rank = ((i + 1) + (j + 1)) as f64 / 2.0;
        for item in &indexed[i..=j] {
            ranks[item.0] = average_rank;
        }
        i = j + 1;
    }
    ranks
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..a.len() {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a <= f64::EPSILON || var_b <= f64::EPSILON {
        0.0
    } else {
        cov / (var_a.sqrt() * var_b.sqrt())
    }
}

fn spearman(a: &[f64], b: &[f64]) -> f64 {
    pearson(&rank(a), &rank(b))
}

/// Run both word summaries over the job's `Mixed` result: enrichment
/// (contingency-table test of each corpus keyword's frequency among kept
/// terms vs. the species background) and correlation (Spearman rank
/// correlation of keyword presence against `transformed_value`, permutation-
/// tested). Both are one-shot, read-only passes over already-finished
/// clustering/layout output (spec §4.7 "Word summaries").
pub fn summarize(
    ontology: &Ontology,
    by_namespace: &HashMap<Namespace, NamespaceResult>,
    corpus: &WordCorpus,
) -> WordSummary {
    let Some(mixed) = by_namespace.get(&Namespace::Mixed) else {
        return WordSummary::default();
    };

    let kept: Vec<TermId> = mixed
        .terms
        .values()
        .filter(|t| t.is_kept())
        .map(|t| t.id)
        .collect();
    if kept.len() < 3 {
        return WordSummary::default();
    }

    let mut words: Vec<CompactString> = corpus.counts.keys().cloned().collect();
    words.sort();

    let presence_of = |word: &str| -> Vec<bool> {
        kept.iter()
            .map(|id| {
                ontology
                    .term(*id)
                    .map(|t| t.keywords.contains(word))
                    .unwrap_or(false)
            })
            .collect()
    };

    let enrichment = enrichment_summary(&words, kept.len(), corpus, &presence_of);
    let correlations = correlation_summary(&words, &kept, mixed, &presence_of);

    WordSummary {
        enrichment,
        correlations,
    }
}

/// Enrichment half: how over/under-represented each corpus keyword is among
/// kept terms, by the same contingency-table/log-odds/hypergeometric
/// machinery TaxaGO uses for GO-term-vs-background enrichment (spec §4.7,
/// TaxaGO's `analysis::enrichment_analysis`).
fn enrichment_summary(
    words: &[CompactString],
    total_study: usize,
    corpus: &WordCorpus,
    presence_of: &impl Fn(&str) -> Vec<bool>,
) -> Vec<WordEnrichment> {
    let mut enrichment: Vec<WordEnrichment> = words
        .iter()
        .filter_map(|word| {
            let presence = presence_of(word.as_str());
            let study_with_word = presence.iter().filter(|&&p| p).count();
            let background_with_word = corpus.counts.get(word).copied().unwrap_or(0);
            if study_with_word == 0 && background_with_word == 0 {
                return None;
            }
            let table = contingency_table(
                study_with_word,
                background_with_word,
                total_study,
                corpus.total.max(background_with_word),
            );
            Some(WordEnrichment {
                word: word.clone(),
                log_odds_ratio: log_odds_ratio(&table),
                p_value: hypergeometric_p_value(&table),
            })
        })
        .collect();

    enrichment.sort_by(|a, b| a.p_value.partial_cmp(&b.p_value).unwrap());
    enrichment.truncate(TOP_N);
    enrichment
}

/// Correlation half: Spearman correlation between each keyword's
/// presence/absence across kept terms and those terms' `transformed_value`,
/// with a permutation p-value computed by reshuffling the value vector with
/// the seeded word-correlation RNG (spec §9's `26012021` seed) rather than
/// recomputing ranks from scratch for every keyword.
fn correlation_summary(
    words: &[CompactString],
    kept: &[TermId],
    mixed: &NamespaceResult,
    presence_of: &impl Fn(&str) -> Vec<bool>,
) -> Vec<WordCorrelation> {
    let values: Vec<f64> = kept
        .iter()
        .map(|id| mixed.terms[id].transformed_value)
        .collect();

    let mut rng = word_correlation_rng();
    let mut correlations = Vec::with_capacity(words.len());

    for word in words {
        let presence: Vec<f64> = presence_of(word.as_str())
            .into_iter()
            .map(|p| if p { 1.0 } else { 0.0 })
            .collect();
        if presence.iter().all(|&v| v == presence[0]) {
            continue;
        }

        let observed = spearman(&presence, &values);
        let mut at_least_as_extreme = 0usize;
        let mut shuffled = values.clone();
        for _ in 0..PERMUTATIONS {
            fisher_yates(&mut shuffled, &mut rng);
            let permuted = spearman(&presence, &shuffled);
            if permuted.abs() >= observed.abs() {
                at_least_as_extreme += 1;
            }
        }
        let p_value = at_least_as_extreme as f64 / PERMUTATIONS as f64;

        correlations.push(WordCorrelation {
            word: word.clone(),
            correlation: observed,
            p_value,
        });
    }

    correlations.sort_by(|a, b| b.correlation.abs().partial_cmp(&a.correlation.abs()).unwrap());
    correlations.truncate(TOP_N);
    correlations
}

fn fisher_yates(items: &mut [f64], rng: &mut rand_mt::Mt19937GenRand32) {
    for i in (1..items.len()).rev() {
        let j = uniform_index(rng, i + 1);
        items.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::RevigoTerm;
    use crate::graph::OntoloGraph;
    use crate::ontology::{Namespace as Ns, Ontology, TermRecord};
    use crate::similarity::{SimilarityMatrix, SimilarityVariant};
    use crate::annotation::SpeciesAnnotations;

    #[test]
    fn rank_averages_ties() {
        let ranks = rank(&[10.0, 20.0, 20.0, 30.0]);
        assert_eq!(ranks, vec![1.0, 2.5, 2.5, 4.0]);
    }

    #[test]
    fn spearman_of_identical_vectors_is_one() {
        let v = vec![1.0, 5.0, 3.0, 2.0, 9.0];
        assert!((spearman(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn spearman_of_inverted_vectors_is_negative_one() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let b = vec![4.0, 3.0, 2.0, 1.0];
        assert!((spearman(&a, &b) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn contingency_table_is_laplace_smoothed() {
        // Every cell gets +1, so an all-zero observation still produces a
        // valid (non-zero-dividing) table.
        let table = contingency_table(0, 0, 0, 0);
        assert_eq!(table, [1, 1, 1, 1]);
    }

    #[test]
    fn word_fully_enriched_in_study_has_positive_log_odds() {
        let table = contingency_table(8, 10, 10, 1000);
        assert!(log_odds_ratio(&table) > 0.0);
    }

    fn mixed_result_with_keywords() -> NamespaceResult {
        let records = vec![
            TermRecord {
                id: 1,
                namespace: Some(Ns::BiologicalProcess),
                keywords: vec!["apoptosis".into()],
                ..Default::default()
            },
            TermRecord {
                id: 2,
                namespace: Some(Ns::BiologicalProcess),
                keywords: vec!["apoptosis".into()],
                ..Default::default()
            },
            TermRecord {
                id: 3,
                namespace: Some(Ns::BiologicalProcess),
                keywords: vec!["transport".into()],
                ..Default::default()
            },
        ];
        let ontology = Ontology::build(records).unwrap();
        let mut freq = rustc_hash::FxHashMap::default();
        freq.insert(1, 0.2);
        freq.insert(2, 0.15);
        freq.insert(3, 0.01);
        let annotations = SpeciesAnnotations::new(rustc_hash::FxHashMap::default(), freq);
        let ids = vec![1, 2, 3];
        let matrix = SimilarityMatrix::build(&ontology, &annotations, &ids, SimilarityVariant::SimRel);

        let mut terms = rustc_hash::FxHashMap::default();
        terms.insert(1, RevigoTerm::new(1, 0.01, 6.0, 10, 0.2));
        terms.insert(2, RevigoTerm::new(2, 0.02, 5.0, 10, 0.15));
        terms.insert(3, RevigoTerm::new(3, 0.5, 1.0, 10, 0.01));

        NamespaceResult {
            namespace: Ns::Mixed,
            terms,
            matrix,
            coordinates_2d: Default::default(),
            coordinates_3d: Default::default(),
            graph: OntoloGraph::default(),
        }
    }

    #[test]
    fn summarize_reports_both_enrichment_and_correlation_for_corpus_words() {
        let ontology = Ontology::build(vec![
            TermRecord {
                id: 1,
                namespace: Some(Ns::BiologicalProcess),
                keywords: vec!["apoptosis".into()],
                ..Default::default()
            },
            TermRecord {
                id: 2,
                namespace: Some(Ns::BiologicalProcess),
                keywords: vec!["apoptosis".into()],
                ..Default::default()
            },
            TermRecord {
                id: 3,
                namespace: Some(Ns::BiologicalProcess),
                keywords: vec!["transport".into()],
                ..Default::default()
            },
        ])
        .unwrap();

        let mut by_namespace = HashMap::new();
        by_namespace.insert(Ns::Mixed, mixed_result_with_keywords());

        let mut counts = FxHashMap::default();
        counts.insert(CompactString::from("apoptosis"), 50);
        counts.insert(CompactString::from("transport"), 500);
        let corpus = WordCorpus { counts, total: 10_000 };

        let summary = summarize(&ontology, &by_namespace, &corpus);
        assert!(!summary.enrichment.is_empty());
        assert!(summary.enrichment.iter().any(|e| e.word == "apoptosis"));
        assert!(!summary.correlations.is_empty());
    }

    #[test]
    fn fewer_than_three_kept_terms_skips_word_summaries() {
        let ontology = Ontology::build(vec![TermRecord {
            id: 1,
            namespace: Some(Ns::BiologicalProcess),
            ..Default::default()
        }])
        .unwrap();
        let mut result = mixed_result_with_keywords();
        result.terms.retain(|&id, _| id == 1);
        let mut by_namespace = HashMap::new();
        by_namespace.insert(Ns::Mixed, result);

        let corpus = WordCorpus::default();
        let summary = summarize(&ontology, &by_namespace, &corpus);
        assert!(summary.enrichment.is_empty());
        assert!(summary.correlations.is_empty());
    }
}
