//! Truncated SVD: linear dimensionality reduction of sparse matrices
//!
//! Randomized range finder with subspace (power) iterations, followed by an
//! exact decomposition of the small projected matrix. The data is not
//! centered, so it works directly on TF-IDF output.

use super::text_features::CsrMatrix;
use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Truncated SVD configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvdConfig {
    /// Number of output dimensions
    pub n_components: usize,
    /// Extra random directions sampled for the range finder
    pub n_oversamples: usize,
    /// Power iterations
    pub n_iter: usize,
    /// Random seed for the range finder initialization
    pub random_state: u64,
}

impl Default for SvdConfig {
    fn default() -> Self {
        Self {
            n_components: 3,
            n_oversamples: 10,
            n_iter: 5,
            random_state: 42,
        }
    }
}

/// Truncated SVD on a sparse matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruncatedSvd {
    config: SvdConfig,
    /// Right singular vectors: n_components x n_features
    components: Option<Array2<f64>>,
    singular_values: Option<Array1<f64>>,
}

impl TruncatedSvd {
    pub fn new(config: SvdConfig) -> Self {
        Self {
            config,
            components: None,
            singular_values: None,
        }
    }

    pub fn n_components(&self) -> usize {
        self.config.n_components
    }

    pub fn singular_values(&self) -> Option<&Array1<f64>> {
        self.singular_values.as_ref()
    }

    pub fn fit(&mut self, x: &CsrMatrix) -> Result<()> {
        let n_components = self.config.n_components;
        if n_components == 0 {
            return Err(ChurnError::InvalidParameter {
                name: "n_components".into(),
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(ChurnError::PreprocessingError("TruncatedSVD on an empty matrix".into()));
        }

        let rank = n_components.min(x.nrows()).min(x.ncols());
        let k = (n_components + self.config.n_oversamples).min(x.nrows()).min(x.ncols());

        // Range finder: Q spans the dominant column space of X
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);
        let omega = Array2::from_shape_fn((x.ncols(), k), |_| rng.gen_range(-1.0..1.0));
        let mut q = orthonormalize(sparse_dot(x, &omega));
        for _ in 0..self.config.n_iter {
            let z = orthonormalize(sparse_t_dot(x, &q));
            q = orthonormalize(sparse_dot(x, &z));
        }

        // B = Q^T X is small (k x n_features); decompose B B^T
        let b = sparse_t_dot(x, &q).reversed_axes();
        let bbt = b.dot(&b.t());
        let (eigenvalues, eigenvectors) = jacobi_eigen(&bbt);

        let mut order: Vec<usize> = (0..eigenvalues.len()).collect();
        order.sort_by(|&i, &j| {
            eigenvalues[j]
                .partial_cmp(&eigenvalues[i])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut components = Array2::zeros((n_components, x.ncols()));
        let mut singular_values = Array1::zeros(n_components);
        for (c, &idx) in order.iter().take(rank).enumerate() {
            let sigma = eigenvalues[idx].max(0.0).sqrt();
            if sigma <= 1e-12 {
                continue;
            }
            // v = B^T u / sigma
            let u = eigenvectors.column(idx);
            let mut v = b.t().dot(&u) / sigma;

            // Deterministic sign: largest-magnitude loading is positive
            let pivot = v
                .iter()
                .copied()
                .fold(0.0f64, |acc, val| if val.abs() > acc.abs() { val } else { acc });
            if pivot < 0.0 {
                v.mapv_inplace(|val| -val);
            }
            components.row_mut(c).assign(&v);
            singular_values[c] = sigma;
        }

        debug!(
            n_features = x.ncols(),
            rank,
            singular_values = ?singular_values.to_vec(),
            "truncated svd fitted"
        );
        self.components = Some(components);
        self.singular_values = Some(singular_values);
        Ok(())
    }

    /// Project rows onto the components: X V
    pub fn transform(&self, x: &CsrMatrix) -> Result<Array2<f64>> {
        let components = self.components.as_ref().ok_or(ChurnError::ModelNotFitted)?;
        if x.ncols() != components.ncols() {
            return Err(ChurnError::ShapeError {
                expected: format!("{} features", components.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(sparse_dot(x, &components.t().to_owned()))
    }

    pub fn fit_transform(&mut self, x: &CsrMatrix) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}

/// X (sparse, n x m) times M (dense, m x k)
fn sparse_dot(x: &CsrMatrix, m: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::zeros((x.nrows(), m.ncols()));
    for (i, mut out_row) in out.axis_iter_mut(Axis(0)).enumerate() {
        for (j, v) in x.row(i) {
            out_row.scaled_add(v, &m.row(j));
        }
    }
    out
}

/// X^T (m x n) times M (dense, n x k)
fn sparse_t_dot(x: &CsrMatrix, m: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::zeros((x.ncols(), m.ncols()));
    for i in 0..x.nrows() {
        let m_row = m.row(i);
        for (j, v) in x.row(i) {
            out.row_mut(j).scaled_add(v, &m_row);
        }
    }
    out
}

/// Modified Gram-Schmidt on the columns; degenerate columns become zero
fn orthonormalize(mut a: Array2<f64>) -> Array2<f64> {
    for j in 0..a.ncols() {
        for p in 0..j {
            let proj = a.column(p).dot(&a.column(j));
            let prev = a.column(p).to_owned();
            a.column_mut(j).scaled_add(-proj, &prev);
        }
        let norm = a.column(j).dot(&a.column(j)).sqrt();
        if norm > 1e-12 {
            a.column_mut(j).mapv_inplace(|v| v / norm);
        } else {
            a.column_mut(j).fill(0.0);
        }
    }
    a
}

/// Cyclic Jacobi eigen decomposition of a small symmetric matrix.
///
/// Returns eigenvalues and eigenvectors (as columns).
fn jacobi_eigen(s: &Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let n = s.nrows();
    let mut a = s.clone();
    let mut v = Array2::<f64>::eye(n);

    for _sweep in 0..100 {
        let off: f64 = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| a[[i, j]] * a[[i, j]])
            .sum();
        if off < 1e-22 {
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                if a[[p, q]].abs() < 1e-300 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * a[[p, q]]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let t = if theta == 0.0 { 1.0 } else { t };
                let c = 1.0 / (t * t + 1.0).sqrt();
                let sn = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - sn * akq;
                    a[[k, q]] = sn * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - sn * aqk;
                    a[[q, k]] = sn * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - sn * vkq;
                    v[[k, q]] = sn * vkp + c * vkq;
                }
            }
        }
    }

    ((0..n).map(|i| a[[i, i]]).collect(), v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn dense_to_csr(d: &Array2<f64>) -> CsrMatrix {
        let rows = d
            .rows()
            .into_iter()
            .map(|r| {
                r.iter()
                    .enumerate()
                    .filter(|(_, &v)| v != 0.0)
                    .map(|(j, &v)| (j, v))
                    .collect()
            })
            .collect();
        CsrMatrix::from_rows(rows, d.ncols())
    }

    #[test]
    fn test_jacobi_recovers_eigenvalues() {
        let s = array![[2.0, 1.0], [1.0, 2.0]];
        let (vals, vecs) = jacobi_eigen(&s);
        let mut sorted = vals.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((sorted[0] - 1.0).abs() < 1e-10);
        assert!((sorted[1] - 3.0).abs() < 1e-10);
        // A v = lambda v
        for (i, &lambda) in vals.iter().enumerate() {
            let v = vecs.column(i);
            let av = s.dot(&v);
            for k in 0..2 {
                assert!((av[k] - lambda * v[k]).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn test_singular_values_of_diagonal_matrix() {
        let d = array![
            [5.0, 0.0, 0.0, 0.0],
            [0.0, 3.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 0.5],
            [0.0, 0.0, 0.0, 0.0]
        ];
        let mut svd = TruncatedSvd::new(SvdConfig::default());
        let out = svd.fit_transform(&dense_to_csr(&d)).unwrap();
        let sv = svd.singular_values().unwrap();
        assert!((sv[0] - 5.0).abs() < 1e-8);
        assert!((sv[1] - 3.0).abs() < 1e-8);
        assert!((sv[2] - 1.0).abs() < 1e-8);
        assert_eq!(out.dim(), (5, 3));
        // First row projects onto the first component only
        assert!((out[[0, 0]] - 5.0).abs() < 1e-8);
        assert!(out[[0, 1]].abs() < 1e-8);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let d = Array2::from_shape_fn((30, 8), |(i, j)| ((i * 7 + j * 3) % 5) as f64);
        let x = dense_to_csr(&d);
        let a = TruncatedSvd::new(SvdConfig::default()).fit_transform(&x).unwrap();
        let b = TruncatedSvd::new(SvdConfig::default()).fit_transform(&x).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_low_rank_input_pads_with_zero_components() {
        let d = array![[1.0, 0.0], [0.0, 2.0]];
        let mut svd = TruncatedSvd::new(SvdConfig::default());
        let out = svd.fit_transform(&dense_to_csr(&d)).unwrap();
        assert_eq!(out.dim(), (2, 3));
        assert!(out.column(2).iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_transform_checks_width() {
        let d = array![[1.0, 0.0, 1.0], [0.0, 2.0, 0.0]];
        let mut svd = TruncatedSvd::new(SvdConfig { n_components: 1, ..Default::default() });
        svd.fit(&dense_to_csr(&d)).unwrap();
        let narrow = dense_to_csr(&array![[1.0, 0.0]]);
        assert!(svd.transform(&narrow).is_err());
    }
}
