//! Multidimensional scaling: turn a similarity matrix into 2D/3D
//! coordinates that place semantically close terms near each other (spec
//! §4.5, "MDS Layout").
//!
//! Grounded on `TaxaGO`'s `analysis::phylogenetic_meta_analysis`, the only
//! file in the teacher that does real linear algebra (`nalgebra::DMatrix`
//! SVD for a whitening transform, with `ndarray` interop helpers). The
//! eigen-decomposition there is generalized here from "SVD of a covariance
//! matrix" to "power iteration over a double-centered squared-distance
//! matrix" (classical MDS), followed by an SMACOF majorization loop that
//! TaxaGO has no precedent for — there is no iterative stress minimization
//! anywhere in the teacher, so this part is built directly from spec §4.5's
//! description rather than adapted from an existing file.

use nalgebra::{DMatrix, DVector};

use crate::similarity::SimilarityMatrix;

/// Similarities at or below this floor are treated as maximally distant —
/// otherwise a near-zero similarity would blow up to a near-infinite
/// distance and dominate the stress function.
const MIN_SIMILARITY_FLOOR: f64 = 0.1;

const SMACOF_MAX_ITERATIONS: usize = 300;
const SMACOF_CONVERGENCE_EPSILON: f64 = 1e-6;
const POWER_ITERATION_STEPS: usize = 200;

/// A layout in `DIM` dimensions: one coordinate array per term, in the same
/// order as the [`SimilarityMatrix`] it was built from.
pub struct Layout<const DIM: usize> {
    pub coordinates: Vec<[f64; DIM]>,
    pub stress: f64,
}

fn distance_matrix(matrix: &SimilarityMatrix) -> DMatrix<f64> {
    let n = matrix.len();
    let mut d = DMatrix::<f64>::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            if i != j {
                let sim = matrix.similarity_by_index(i, j);
                d[(i, j)] = if sim.is_nan() {
                    0.0
                } else {
                    1.0 / sim.max(MIN_SIMILARITY_FLOOR)
                };
            }
        }
    }
    d
}

/// Double-center the squared distance matrix: `B = -1/2 J D^2 J` where `J`
/// is the centering matrix `I - 1/n * ones`.
fn double_centered_gram(distances: &DMatrix<f64>) -> DMatrix<f64> {
    let n = distances.nrows();
    let d2 = distances.map(|v| v * v);
    let row_means: Vec<f64> = (0..n).map(|i| d2.row(i).sum() / n as f64).collect();
    let grand_mean = row_means.iter().sum::<f64>() / n as f64;

    let mut b = DMatrix::<f64>::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            b[(i, j)] = -0.5 * (d2[(i, j)] - row_means[i] - row_means[j] + grand_mean);
        }
    }
    b
}

/// Find the top `k` eigenpairs of a symmetric matrix via power iteration
/// with deflation. Starting vectors are fixed standard basis vectors
/// (rotated per component) rather than random, so the result is
/// reproducible without depending on an RNG.
fn top_eigenpairs(matrix: &DMatrix<f64>, k: usize) -> Vec<(f64, DVector<f64>)> {
    let n = matrix.nrows();
    let mut deflated = matrix.clone();
    let mut result = Vec::with_capacity(k);

    for component in 0..k.min(n) {
        let mut v = DVector::<f64>::from_fn(n, |i, _| if i == component % n { 1.0 } else { 0.1 });
        let mut eigenvalue = 0.0;
        for _ in 0..POWER_ITERATION_STEPS {
            let next = &deflated * &v;
            let norm = next.norm();
            if norm < f64::EPSILON {
                break;
            }
            v = next / norm;
            eigenvalue = (v.transpose() * &deflated * &v)[(0, 0)];
        }
        deflated -= eigenvalue * (&v * v.transpose());
        result.push((eigenvalue.max(0.0), v));
    }
    result
}

fn classical_init<const DIM: usize>(matrix: &SimilarityMatrix) -> Vec<[f64; DIM]> {
    let n = matrix.len();
    let distances = distance_matrix(matrix);
    let gram = double_centered_gram(&distances);
    let eigenpairs = top_eigenpairs(&gram, DIM);

    let mut coords = vec![[0.0_f64; DIM]; n];
    for (component, (eigenvalue, vector)) in eigenpairs.into_iter().enumerate() {
        let scale = eigenvalue.sqrt();
        for i in 0..n {
            coords[i][component] = vector[i] * scale;
        }
    }
    coords
}

fn euclidean_distance<const DIM: usize>(a: &[f64; DIM], b: &[f64; DIM]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

fn stress<const DIM: usize>(coords: &[[f64; DIM]], distances: &DMatrix<f64>) -> f64 {
    let n = coords.len();
    let mut num = 0.0;
    let mut denom = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            let target = distances[(i, j)];
            let actual = euclidean_distance(&coords[i], &coords[j]);
            num += (target - actual).powi(2);
            denom += target * target;
        }
    }
    if denom < f64::EPSILON {
        0.0
    } else {
        (num / denom).sqrt()
    }
}

/// Run classical MDS initialization followed by SMACOF majorization to
/// minimize stress, stopping early on convergence, an iteration cap, or
/// cancellation. If there are `m <= DIM` terms, MDS is skipped entirely and
/// each term's coordinates are its (clamped) column of the distance matrix
/// (spec §4.5's small-input special case — not reported as an error).
pub fn layout<const DIM: usize>(
    matrix: &SimilarityMatrix,
    mut should_cancel: impl FnMut() -> bool,
) -> Layout<DIM> {
    let n = matrix.len();
    if n <= DIM {
        let distances = distance_matrix(matrix);
        let mut coords = vec![[0.0_f64; DIM]; n];
        for i in 0..n {
            for d in 0..n {
                coords[i][d] = distances[(i, d)].min(1.0 / MIN_SIMILARITY_FLOOR);
            }
        }
        return Layout {
            coordinates: coords,
            stress: 0.0,
        };
    }

    let distances = distance_matrix(matrix);
    let mut coords = classical_init::<DIM>(matrix);
    let mut current_stress = stress(&coords, &distances);

    for _ in 0..SMACOF_MAX_ITERATIONS {
        if should_cancel() {
            break;
        }
        let updated = smacof_step(&coords, &distances);
        let updated_stress = stress(&updated, &distances);
        let improvement = current_stress - updated_stress;
        coords = updated;
        current_stress = updated_stress;
        if improvement.abs() < SMACOF_CONVERGENCE_EPSILON {
            break;
        }
    }

    Layout {
        coordinates: coords,
        stress: current_stress,
    }
}

/// One Guttman-transform update: move each point toward the position that
/// would exactly satisfy its target distances to every other point, given
/// the current configuration.
fn smacof_step<const DIM: usize>(
    coords: &[[f64; DIM]],
    distances: &DMatrix<f64>,
) -> Vec<[f64; DIM]> {
    let n = coords.len();
    let mut updated = vec![[0.0_f64; DIM]; n];

    for i in 0..n {
        let mut accum = [0.0_f64; DIM];
        for j in 0..n {
            if i == j {
                continue;
            }
            let actual = euclidean_distance(&coords[i], &coords[j]).max(f64::EPSILON);
            let target = distances[(i, j)];
            let factor = target / actual;
            for d in 0..DIM {
                accum[d] += coords[j][d] + factor * (coords[i][d] - coords[j][d]);
            }
        }
        for d in 0..DIM {
            updated[i][d] = accum[d] / n as f64;
        }
    }
    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::SpeciesAnnotations;
    use crate::ontology::{Namespace, RawRelationship, TermRecord, Ontology};
    use crate::similarity::SimilarityVariant;
    use rustc_hash::FxHashMap;

    fn sample_matrix(n_extra: usize) -> SimilarityMatrix {
        let mut records = vec![TermRecord {
            id: 1,
            namespace: Some(Namespace::BiologicalProcess),
            ..Default::default()
        }];
        let mut ids = vec![1];
        for i in 0..n_extra {
            let id = 100 + i as u32;
            records.push(TermRecord {
                id,
                namespace: Some(Namespace::BiologicalProcess),
                relationships: vec![(1, RawRelationship::IsA)],
                ..Default::default()
            });
            ids.push(id);
        }
        let ontology = Ontology::build(records).unwrap();
        let mut freq = FxHashMap::default();
        for (i, &id) in ids.iter().enumerate() {
            freq.insert(id, 0.05 + 0.01 * i as f64);
        }
        let annotations = SpeciesAnnotations::new(FxHashMap::default(), freq);
        SimilarityMatrix::build(&ontology, &annotations, &ids, SimilarityVariant::SimRel)
    }

    #[test]
    fn tiny_input_skips_mds_with_zero_stress() {
        let matrix = sample_matrix(1);
        let layout = layout::<2>(&matrix, || false);
        assert_eq!(layout.stress, 0.0);
        assert_eq!(layout.coordinates.len(), 2);
    }

    #[test]
    fn larger_input_produces_one_coordinate_per_term() {
        let matrix = sample_matrix(5);
        let layout = layout::<2>(&matrix, || false);
        assert_eq!(layout.coordinates.len(), 6);
        assert!(layout.stress.is_finite());
    }

    #[test]
    fn cancellation_stops_refinement_without_panicking() {
        let matrix = sample_matrix(5);
        let layout = layout::<2>(&matrix, || true);
        assert_eq!(layout.coordinates.len(), 6);
    }
}
