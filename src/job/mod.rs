//! The job orchestrator: partitions scored terms by namespace, runs
//! similarity → clustering → layout → graph export for each, maintains a
//! cooperative cancellation/timeout mechanism, and supports pinning a term
//! and recomputing only what that invalidates (spec §4.7, "Job
//! Orchestrator").
//!
//! Grounded on `TaxaGO`'s `analysis::result_combination::group_results_by_taxonomy`
//! (partitioning a flat result set by a categorical key before downstream
//! processing) and its rayon-parallel-over-independent-buckets idiom seen
//! throughout `analysis/enrichment_analysis.rs`. The cancellation/timeout
//! watchdog has no direct TaxaGO precedent (its CLI runs to completion), so
//! it is built from the primitives (`std::thread`, `std::sync::atomic`)
//! already used pervasively in the teacher's rayon-heavy code.

mod input;
mod word_summary;

pub use input::parse_input;
pub use word_summary::{WordCorpus, WordSummary};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use strum_macros::{Display, EnumString};

use crate::annotation::SpeciesAnnotations;
use crate::clustering::{assign_dispensability, ClusteringOptions, RevigoTerm, ValueType};
use crate::error::{RevigoError, Result};
use crate::graph::{build_threshold_graph, OntoloGraph};
use crate::layout::layout;
use crate::ontology::{Namespace, Ontology, TermId};
use crate::similarity::{SimilarityMatrix, SimilarityVariant};

/// Maximum number of terms accepted in a single namespace before the job
/// refuses to run (spec §4.7 "Capacity"): clustering is `O(n^2)` in
/// similarity-matrix size, and REVIGO has always drawn the line at 2000.
const MAX_TERMS_PER_NAMESPACE: usize = 2000;

/// Percentile of the pairwise similarity distribution used as the edge
/// cutoff when exporting the threshold graph (spec §4.6).
const GRAPH_EDGE_PERCENTILE: f64 = 0.95;

/// A `PValue`-typed raw input above this is dropped before clustering ever
/// sees it (spec §4.7 "Input": p-values this weak carry no signal worth
/// keeping, and the drop is silent aside from an aggregate warning).
const PVALUE_SIGNIFICANCE_FLOOR: f64 = 0.5;

/// A namespace keeping more terms than this after clustering is unusual
/// enough to flag (spec §4.7 "Warnings": "excessive result list").
const EXCESSIVE_RESULT_LIST_THRESHOLD: usize = 300;

/// Share of a namespace's progress budget spent on clustering (spec §4.4
/// "Report progress twice: half during pair-bucket construction, half
/// during consumption" describes clustering's own internal split; this is
/// clustering's share of the namespace's overall budget, with the
/// remainder split between layout and graph export).
const CLUSTERING_PROGRESS_SHARE: f64 = 0.6;
/// Progress mark once MDS layout has finished, ahead of graph export.
const LAYOUT_PROGRESS_MARK: f64 = 0.9;

/// Where a job's input originated — ambient request metadata, not used in
/// any computation, but carried through for logging/diagnostics the way
/// `TaxaGO`'s CLI args record invocation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
pub enum RequestSource {
    #[default]
    Api,
    Cli,
    Web,
}

/// Job-wide configuration (spec §4.7, ambient layer per SPEC_FULL.md §1).
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub cut_off: f64,
    pub value_type: ValueType,
    pub similarity_variant: SimilarityVariant,
    pub remove_obsolete: bool,
    pub timeout: Duration,
    pub request_source: RequestSource,
    /// R3/R5 tiebreak direction: whether a larger comparison value wins
    /// (spec §4.4 "larger wins is parameterizable by a `keep_greater` flag").
    pub keep_greater: bool,
    /// R3/R5 tiebreak magnitude: whether the comparison value is
    /// `|log10(max(x, 1e-300))|`-transformed first (spec §4.4).
    pub log_transform_value: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            cut_off: 0.7,
            value_type: ValueType::default(),
            similarity_variant: SimilarityVariant::default(),
            remove_obsolete: true,
            timeout: Duration::from_secs(30),
            request_source: RequestSource::default(),
            keep_greater: true,
            log_transform_value: false,
        }
    }
}

impl JobConfig {
    fn clustering_options(&self) -> ClusteringOptions {
        ClusteringOptions {
            keep_greater: self.keep_greater,
            log_transform_value: self.log_transform_value,
        }
    }
}

/// The four cut-off levels REVIGO's own UI has always exposed ("Small",
/// "Medium", "Large", "None"). A caller-supplied cut-off is snapped to the
/// nearest of these rather than rejected outright.
const CUT_OFF_LEVELS: [f64; 4] = [0.4, 0.5, 0.7, 0.9];

impl JobConfig {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cut_off: f64,
        value_type: ValueType,
        similarity_variant: SimilarityVariant,
        remove_obsolete: bool,
        timeout: Duration,
        request_source: RequestSource,
        keep_greater: bool,
        log_transform_value: bool,
    ) -> Self {
        let snapped = CUT_OFF_LEVELS
            .iter()
            .copied()
            .min_by(|a, b| {
                (a - cut_off)
                    .abs()
                    .partial_cmp(&(b - cut_off).abs())
                    .unwrap()
            })
            .unwrap_or(0.7);
        Self {
            cut_off: snapped,
            value_type,
            similarity_variant,
            remove_obsolete,
            timeout,
            request_source,
            keep_greater,
            log_transform_value,
        }
    }
}

/// Non-fatal, per-term issues surfaced alongside a successful job result
/// (spec §7 "Propagation": warnings don't abort the job).
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    UnknownTermId(TermId),
    ObsoleteTermWithoutReplacement(TermId),
    /// An obsolete input ID was dropped because `remove_obsolete` was set,
    /// whether or not it had a declared replacement.
    ObsoleteTermDropped(TermId),
    /// An obsolete input ID was rewritten to its replacement rather than
    /// dropped (`remove_obsolete` was false).
    ObsoleteTermRewritten { original: TermId, replacement: TermId },
    /// An alternate ID was resolved to its canonical term.
    AlternateIdRewritten { original: TermId, canonical: TermId },
    /// The same canonical term appeared more than once in the input; every
    /// occurrence after the first was dropped.
    DuplicateTerm(TermId),
    TermValueRejected { id: TermId, reason: String },
    /// A line of raw input text didn't start with a recognizable GO ID.
    UnparseableLine(String),
    /// This many `PValue`-typed terms were silently dropped for being
    /// weaker than [`PVALUE_SIGNIFICANCE_FLOOR`].
    NonSignificantPValuesFiltered(usize),
    /// A namespace kept more terms than [`EXCESSIVE_RESULT_LIST_THRESHOLD`]
    /// after clustering.
    ExcessiveResultList { namespace: Namespace, count: usize },
}

/// One scored term as handed to [`Job::run`], before namespace resolution
/// or value transformation.
#[derive(Debug, Clone)]
pub struct InputTerm {
    pub id: TermId,
    pub raw_value: f64,
    pub user_values: Vec<f64>,
}

impl InputTerm {
    pub fn new(id: TermId, raw_value: f64) -> Self {
        Self {
            id,
            raw_value,
            user_values: Vec::new(),
        }
    }
}

/// Everything produced for a single namespace.
pub struct NamespaceResult {
    pub namespace: Namespace,
    pub terms: FxHashMap<TermId, RevigoTerm>,
    pub matrix: SimilarityMatrix,
    pub coordinates_2d: FxHashMap<TermId, [f64; 2]>,
    pub coordinates_3d: FxHashMap<TermId, [f64; 3]>,
    pub graph: OntoloGraph,
}

pub struct JobOutput {
    pub by_namespace: HashMap<Namespace, NamespaceResult>,
    pub word_summary: Option<WordSummary>,
    pub warnings: Vec<Warning>,
}

/// Cooperative cancellation/timeout handle shared between the job and
/// whatever watchdog or caller thread wants to interrupt it.
#[derive(Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative progress-reporting handle shared between the job and
/// whatever caller wants to poll it from another thread (spec §2's "C7 Job
/// Orchestrator" responsibilities, spec §4.4 "Progress"). Tracks one
/// fraction per namespace since namespaces run in parallel and finish at
/// different times; overall progress is their unweighted mean.
#[derive(Clone)]
pub struct ProgressToken {
    by_namespace: Arc<RwLock<FxHashMap<Namespace, f64>>>,
}

impl ProgressToken {
    pub fn new() -> Self {
        Self {
            by_namespace: Arc::new(RwLock::new(FxHashMap::default())),
        }
    }

    fn report(&self, namespace: Namespace, fraction: f64) {
        self.by_namespace
            .write()
            .unwrap()
            .insert(namespace, fraction.clamp(0.0, 1.0));
    }

    /// Overall progress in `[0, 1]`: the unweighted mean of every
    /// namespace's own fraction reported so far. Namespaces not yet started
    /// don't count against the mean until [`Job::run`] seeds them at `0.0`.
    pub fn fraction(&self) -> f64 {
        let map = self.by_namespace.read().unwrap();
        if map.is_empty() {
            return 0.0;
        }
        map.values().sum::<f64>() / map.len() as f64
    }
}

impl Default for ProgressToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns a watchdog thread that cancels `token` after `timeout` elapses.
/// The returned guard stops the watchdog early if the job finishes first.
struct TimeoutWatchdog {
    done: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl TimeoutWatchdog {
    fn spawn(token: CancelToken, timeout: Duration) -> Self {
        let done = Arc::new(AtomicBool::new(false));
        let done_clone = Arc::clone(&done);
        let handle = thread::spawn(move || {
            let step = Duration::from_millis(20);
            let mut waited = Duration::ZERO;
            while waited < timeout {
                if done_clone.load(Ordering::SeqCst) {
                    return;
                }
                thread::sleep(step);
                waited += step;
            }
            if !done_clone.load(Ordering::SeqCst) {
                token.cancel();
            }
        });
        Self {
            done,
            handle: Some(handle),
        }
    }
}

impl Drop for TimeoutWatchdog {
    fn drop(&mut self) {
        self.done.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// A single clustering/layout/graph run, holding the shared read-only
/// ontology and annotation data plus whatever pin state has accumulated
/// across reruns.
pub struct Job {
    config: JobConfig,
    ontology: Arc<Ontology>,
    annotations: Arc<SpeciesAnnotations>,
    cancel: CancelToken,
    progress: ProgressToken,
    pinned: RwLock<Option<TermId>>,
}

impl Job {
    pub fn new(
        config: JobConfig,
        ontology: Arc<Ontology>,
        annotations: Arc<SpeciesAnnotations>,
    ) -> Self {
        Self {
            config,
            ontology,
            annotations,
            cancel: CancelToken::new(),
            progress: ProgressToken::new(),
            pinned: RwLock::new(None),
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// A handle for polling overall job progress from another thread while
    /// [`Job::run`] is in flight (spec §4.4 "Progress").
    pub fn progress_token(&self) -> ProgressToken {
        self.progress.clone()
    }

    /// Unpin whatever term was previously pinned and pin `term_id` instead.
    /// Does not itself recompute anything; callers rerun [`Job::run`] (or a
    /// future targeted rerun) afterward for the change to take effect.
    pub fn pin(&self, term_id: TermId) {
        *self.pinned.write().unwrap() = Some(term_id);
    }

    pub fn unpin(&self) {
        *self.pinned.write().unwrap() = None;
    }

    /// Parse a raw scored-term-list blob and run it (spec §4.7/§6 "Input
    /// format"). Parse warnings (unparseable lines) are folded into the
    /// returned [`JobOutput::warnings`] alongside everything `run` itself
    /// produces.
    pub fn run_text(
        &self,
        text: &str,
        word_corpus: Option<&WordCorpus>,
    ) -> Result<JobOutput> {
        let (input, parse_warnings) = parse_input(text);
        let mut output = self.run(input, word_corpus)?;
        output.warnings.splice(0..0, parse_warnings);
        Ok(output)
    }

    /// Run the full pipeline: partition by namespace, then similarity →
    /// clustering → layout → graph for each, in parallel across namespaces.
    pub fn run(
        &self,
        input: Vec<InputTerm>,
        word_corpus: Option<&WordCorpus>,
    ) -> Result<JobOutput> {
        let _watchdog = TimeoutWatchdog::spawn(self.cancel.clone(), self.config.timeout);
        let mut warnings = Vec::new();

        let mut seen: FxHashSet<TermId> = FxHashSet::default();
        let mut non_significant_dropped = 0usize;
        let mut buckets: HashMap<Namespace, Vec<InputTerm>> = HashMap::new();

        for item in input {
            if self.config.value_type == ValueType::PValue
                && item.raw_value > PVALUE_SIGNIFICANCE_FLOOR
            {
                non_significant_dropped += 1;
                continue;
            }

            let mut id = item.id;
            if self.ontology.is_obsolete_id(id) {
                if self.config.remove_obsolete {
                    warnings.push(Warning::ObsoleteTermDropped(id));
                    continue;
                }
                match self.ontology.obsolete_replacement_for(id) {
                    Some(replacement) => {
                        warnings.push(Warning::ObsoleteTermRewritten {
                            original: id,
                            replacement,
                        });
                        id = replacement;
                    }
                    None => {
                        warnings.push(Warning::ObsoleteTermWithoutReplacement(id));
                        continue;
                    }
                }
            }

            let Some(term) = self.ontology.term(id) else {
                warnings.push(Warning::UnknownTermId(id));
                continue;
            };
            if self.ontology.is_alt_id(id) {
                warnings.push(Warning::AlternateIdRewritten {
                    original: id,
                    canonical: term.id,
                });
            }
            if !seen.insert(term.id) {
                warnings.push(Warning::DuplicateTerm(term.id));
                continue;
            }

            buckets.entry(term.namespace).or_default().push(InputTerm {
                id: term.id,
                raw_value: item.raw_value,
                user_values: item.user_values,
            });
        }

        if non_significant_dropped > 0 {
            warnings.push(Warning::NonSignificantPValuesFiltered(non_significant_dropped));
        }

        for (namespace, terms) in &buckets {
            if terms.len() > MAX_TERMS_PER_NAMESPACE {
                return Err(RevigoError::CapacityExceeded(*namespace, terms.len()));
            }
        }

        if buckets.values().all(|v| v.is_empty()) || buckets.is_empty() {
            return Err(RevigoError::CapacityEmptyResult);
        }

        let pinned = *self.pinned.read().unwrap();
        let namespaces: Vec<Namespace> = buckets.keys().copied().collect();
        for &namespace in &namespaces {
            self.progress.report(namespace, 0.0);
        }

        let results: Vec<Result<(NamespaceResult, Vec<Warning>)>> = namespaces
            .par_iter()
            .map(|&namespace| {
                let items = buckets.get(&namespace).cloned().unwrap_or_default();
                info!("starting namespace {namespace} with {} terms", items.len());
                self.run_namespace(namespace, items, pinned)
            })
            .collect();

        let mut by_namespace = HashMap::new();
        for result in results {
            let (result, namespace_warnings) = result?;
            info!("finished namespace {}", result.namespace);
            warnings.extend(namespace_warnings);
            by_namespace.insert(result.namespace, result);
        }

        let mixed = self.build_mixed(&by_namespace)?;
        by_namespace.insert(Namespace::Mixed, mixed);

        let word_summary = word_corpus.map(|corpus| {
            word_summary::summarize(&self.ontology, &by_namespace, corpus)
        });

        if self.cancel.is_cancelled() {
            return Err(RevigoError::StateTimedOut);
        }

        Ok(JobOutput {
            by_namespace,
            word_summary,
            warnings,
        })
    }

    /// Pin `term_id` and rerun only the namespace it belongs to plus the
    /// combined `Mixed` view, reusing every other namespace's prior result
    /// unchanged (spec §4.7 "Pin & recompute").
    pub fn pin_and_recompute(
        &self,
        term_id: TermId,
        previous: &mut JobOutput,
        input: &[InputTerm],
    ) -> Result<()> {
        self.pin(term_id);
        let Some(term) = self.ontology.term(term_id) else {
            return Err(RevigoError::InternalOntologyUninitialized);
        };
        let namespace = term.namespace;

        let items: Vec<InputTerm> = input
            .iter()
            .filter(|i| {
                self.ontology
                    .term(i.id)
                    .map(|t| t.namespace == namespace)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        let (result, namespace_warnings) = self.run_namespace(namespace, items, Some(term_id))?;
        previous.by_namespace.insert(namespace, result);
        previous.warnings.extend(namespace_warnings);

        let mixed = self.build_mixed(&previous.by_namespace)?;
        previous.by_namespace.insert(Namespace::Mixed, mixed);
        Ok(())
    }

    fn run_namespace(
        &self,
        namespace: Namespace,
        items: Vec<InputTerm>,
        pinned: Option<TermId>,
    ) -> Result<(NamespaceResult, Vec<Warning>)> {
        let mut warnings = Vec::new();
        let mut terms: FxHashMap<TermId, RevigoTerm> = FxHashMap::default();
        let ids: Vec<TermId> = items.iter().map(|i| i.id).collect();

        for item in items {
            let transformed = self.config.value_type.transform(item.raw_value)?;
            let record_value = match self.config.value_type {
                // The transform for this variant is |log2(x)|; the record's
                // own `value` is remapped to the signed log2 it was derived
                // from, not kept as the raw input (spec §4.7 "Transforms").
                ValueType::HigherAbsLog2 => item.raw_value.log2(),
                _ => item.raw_value,
            };
            let size = self.annotations.get_size(&self.ontology, item.id);
            let freq = self.annotations.get_frequency(&self.ontology, item.id);
            let mut term = RevigoTerm::new(item.id, record_value, transformed, size, freq);
            term.user_values = item.user_values;
            if pinned == Some(item.id) {
                term.pinned = true;
            }
            terms.insert(item.id, term);
        }

        let matrix = SimilarityMatrix::build(
            &self.ontology,
            &self.annotations,
            &ids,
            self.config.similarity_variant,
        );

        // Uniqueness must be populated before clustering runs: R3's NaN
        // fallback substitutes a term's own `uniqueness` for a missing
        // `transformed_value`, so every term needs its real value in place
        // before the elimination loop can see it (spec §4.4 "Preconditions").
        for id in &ids {
            if let Some(u) = matrix.uniqueness(*id) {
                if let Some(term) = terms.get_mut(id) {
                    term.uniqueness = u;
                }
            }
        }

        let cancel = self.cancel.clone();
        let progress = self.progress.clone();
        assign_dispensability(
            &mut terms,
            &self.ontology,
            &matrix,
            self.config.clustering_options(),
            move |fraction| progress.report(namespace, fraction * CLUSTERING_PROGRESS_SHARE),
            move || cancel.is_cancelled(),
        );

        let retained_ids: Vec<TermId> = ids
            .iter()
            .copied()
            .filter(|id| {
                terms
                    .get(id)
                    .map(|t| t.is_retained(self.config.cut_off))
                    .unwrap_or(false)
            })
            .collect();
        let retained_count = retained_ids.len();
        if retained_count > EXCESSIVE_RESULT_LIST_THRESHOLD {
            warnings.push(Warning::ExcessiveResultList {
                namespace,
                count: retained_count,
            });
        }

        let layout_matrix = SimilarityMatrix::build(
            &self.ontology,
            &self.annotations,
            &retained_ids,
            self.config.similarity_variant,
        );

        let cancel = self.cancel.clone();
        let layout_2d = layout::<2>(&layout_matrix, || cancel.is_cancelled());
        let cancel = self.cancel.clone();
        let layout_3d = layout::<3>(&layout_matrix, || cancel.is_cancelled());

        let mut coordinates_2d = FxHashMap::default();
        let mut coordinates_3d = FxHashMap::default();
        for (idx, &id) in layout_matrix.terms().iter().enumerate() {
            coordinates_2d.insert(id, layout_2d.coordinates[idx]);
            coordinates_3d.insert(id, layout_3d.coordinates[idx]);
            if let Some(term) = terms.get_mut(&id) {
                term.pc = layout_2d.coordinates[idx];
                term.pc3 = layout_3d.coordinates[idx];
            }
        }

        debug!(
            "namespace {namespace} mds stress 2d={:.4} 3d={:.4}",
            layout_2d.stress, layout_3d.stress
        );
        self.progress.report(namespace, LAYOUT_PROGRESS_MARK);

        let graph = build_threshold_graph(
            &self.ontology,
            &terms,
            &layout_matrix,
            &coordinates_2d,
            GRAPH_EDGE_PERCENTILE,
            self.config.cut_off,
        );
        self.progress.report(namespace, 1.0);

        Ok((
            NamespaceResult {
                namespace,
                terms,
                matrix,
                coordinates_2d,
                coordinates_3d,
                graph,
            },
            warnings,
        ))
    }

    /// Rebuild an aggregate "Mixed" view over every kept term across all
    /// primary namespaces (spec §3 `Namespace::Mixed`): its own similarity
    /// matrix, layout, and graph, so a caller gets one combined picture in
    /// addition to the three per-namespace ones.
    fn build_mixed(
        &self,
        by_namespace: &HashMap<Namespace, NamespaceResult>,
    ) -> Result<NamespaceResult> {
        let mut terms: FxHashMap<TermId, RevigoTerm> = FxHashMap::default();
        for result in by_namespace.values() {
            for (&id, term) in &result.terms {
                if term.is_retained(self.config.cut_off) {
                    terms.insert(id, term.clone());
                }
            }
        }
        if terms.is_empty() {
            warn!("mixed namespace has no kept terms to combine");
        }
        let ids: Vec<TermId> = terms.keys().copied().collect();
        let matrix = SimilarityMatrix::build(
            &self.ontology,
            &self.annotations,
            &ids,
            self.config.similarity_variant,
        );

        let cancel = self.cancel.clone();
        let layout_2d = layout::<2>(&matrix, || cancel.is_cancelled());
        let cancel = self.cancel.clone();
        let layout_3d = layout::<3>(&matrix, || cancel.is_cancelled());

        let mut coordinates_2d = FxHashMap::default();
        let mut coordinates_3d = FxHashMap::default();
        for (idx, &id) in matrix.terms().iter().enumerate() {
            coordinates_2d.insert(id, layout_2d.coordinates[idx]);
            coordinates_3d.insert(id, layout_3d.coordinates[idx]);
            if let Some(term) = terms.get_mut(&id) {
                term.pc = layout_2d.coordinates[idx];
                term.pc3 = layout_3d.coordinates[idx];
            }
        }

        let graph = build_threshold_graph(
            &self.ontology,
            &terms,
            &matrix,
            &coordinates_2d,
            GRAPH_EDGE_PERCENTILE,
            self.config.cut_off,
        );

        Ok(NamespaceResult {
            namespace: Namespace::Mixed,
            terms,
            matrix,
            coordinates_2d,
            coordinates_3d,
            graph,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::TermRecord;
    use rustc_hash::FxHashMap as Map;

    fn build_job() -> Job {
        let ontology = Ontology::build(vec![
            TermRecord {
                id: 8150,
                namespace: Some(Namespace::BiologicalProcess),
                ..Default::default()
            },
            TermRecord {
                id: 9987,
                namespace: Some(Namespace::BiologicalProcess),
                relationships: vec![(8150, crate::ontology::RawRelationship::IsA)],
                ..Default::default()
            },
            TermRecord {
                id: 6807,
                namespace: Some(Namespace::BiologicalProcess),
                relationships: vec![(9987, crate::ontology::RawRelationship::IsA)],
                ..Default::default()
            },
        ])
        .unwrap();
        let mut freq = Map::default();
        freq.insert(8150, 0.3);
        freq.insert(9987, 0.1);
        freq.insert(6807, 0.01);
        let annotations = SpeciesAnnotations::new(Map::default(), freq);
        Job::new(JobConfig::default(), Arc::new(ontology), Arc::new(annotations))
    }

    #[test]
    fn run_produces_a_mixed_namespace_alongside_primary_ones() {
        let job = build_job();
        let input = vec![
            InputTerm::new(8150, 0.5),
            InputTerm::new(9987, 0.01),
            InputTerm::new(6807, 0.001),
        ];
        let output = job.run(input, None).unwrap();
        assert!(output.by_namespace.contains_key(&Namespace::BiologicalProcess));
        assert!(output.by_namespace.contains_key(&Namespace::Mixed));
    }

    #[test]
    fn unknown_term_id_is_a_warning_not_a_fatal_error() {
        let job = build_job();
        let input = vec![
            InputTerm::new(8150, 0.5),
            InputTerm::new(424242, 0.5),
        ];
        let output = job.run(input, None).unwrap();
        assert!(output
            .warnings
            .contains(&Warning::UnknownTermId(424242)));
    }

    #[test]
    fn duplicate_term_id_is_dropped_after_the_first_occurrence() {
        let job = build_job();
        let input = vec![
            InputTerm::new(8150, 0.5),
            InputTerm::new(8150, 0.2),
        ];
        let output = job.run(input, None).unwrap();
        assert!(output.warnings.contains(&Warning::DuplicateTerm(8150)));
        let bp = &output.by_namespace[&Namespace::BiologicalProcess];
        assert_eq!(bp.terms.len(), 1);
    }

    #[test]
    fn empty_input_is_a_capacity_error() {
        let job = build_job();
        let err = job.run(Vec::new(), None).unwrap_err();
        assert_eq!(err, RevigoError::CapacityEmptyResult);
    }

    #[test]
    fn oversized_namespace_is_rejected() {
        let mut records = Vec::new();
        for i in 0..(MAX_TERMS_PER_NAMESPACE + 1) as u32 {
            records.push(TermRecord {
                id: i + 1,
                namespace: Some(Namespace::BiologicalProcess),
                ..Default::default()
            });
        }
        let ontology = Ontology::build(records).unwrap();
        let annotations = SpeciesAnnotations::new(Map::default(), Map::default());
        let job = Job::new(JobConfig::default(), Arc::new(ontology), Arc::new(annotations));

        let input: Vec<InputTerm> = (0..(MAX_TERMS_PER_NAMESPACE + 1) as u32)
            .map(|i| InputTerm::new(i + 1, 0.5))
            .collect();
        let err = job.run(input, None).unwrap_err();
        assert!(matches!(err, RevigoError::CapacityExceeded(_, _)));
    }

    #[test]
    fn parse_and_run_round_trips_through_run_text() {
        let job = build_job();
        let text = "GO:0008150 0.5\nGO:0009987 0.01\nGO:0006807 0.001\n";
        let output = job.run_text(text, None).unwrap();
        assert!(output.by_namespace.contains_key(&Namespace::BiologicalProcess));
    }
}
