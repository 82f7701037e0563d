//! Histogram-based split finding
//!
//! Every feature is quantized once into at most 255 bins. Bin `b` holds the
//! values in `(upper[b-1], upper[b]]`, and the last bound is `+inf`, so a
//! split "bin <= b" is the same as "value <= upper[b]" on raw data. Trees
//! store the raw threshold and predict on unbinned rows.

use crate::error::{ChurnError, Result};
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Upper bound on bins per feature; bin codes are `u8`
pub const MAX_BINS: usize = 255;

/// Bin boundaries for a single feature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureBins {
    upper_bounds: Vec<f64>,
}

impl FeatureBins {
    /// Learn bin boundaries from one column of training values
    pub fn fit(values: &[f64], max_bins: usize) -> Self {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        // Distinct values with their counts
        let mut distinct: Vec<(f64, usize)> = Vec::new();
        for v in sorted.iter().copied() {
            match distinct.last_mut() {
                Some((last, count)) if *last == v => *count += 1,
                _ => distinct.push((v, 1)),
            }
        }

        let mut upper_bounds = Vec::new();
        if distinct.len() <= max_bins {
            for pair in distinct.windows(2) {
                upper_bounds.push(midpoint(pair[0].0, pair[1].0));
            }
        } else {
            // Equal-frequency cuts, always placed between two distinct values
            let per_bin = sorted.len() as f64 / max_bins as f64;
            let mut seen = 0usize;
            let mut next_cut = per_bin;
            for pair in distinct.windows(2) {
                seen += pair[0].1;
                if seen as f64 >= next_cut && upper_bounds.len() + 1 < max_bins {
                    upper_bounds.push(midpoint(pair[0].0, pair[1].0));
                    while next_cut <= seen as f64 {
                        next_cut += per_bin;
                    }
                }
            }
        }
        upper_bounds.push(f64::INFINITY);

        Self { upper_bounds }
    }

    /// Bin code for a raw value (NaN falls into the first bin)
    pub fn bin(&self, value: f64) -> u8 {
        self.upper_bounds.partition_point(|&b| b < value) as u8
    }

    pub fn n_bins(&self) -> usize {
        self.upper_bounds.len()
    }

    /// Raw-value threshold equivalent to "bin <= `bin`"
    pub fn threshold(&self, bin: usize) -> f64 {
        self.upper_bounds[bin]
    }
}

fn midpoint(a: f64, b: f64) -> f64 {
    let m = a + (b - a) / 2.0;
    // Guard against rounding onto the upper value for adjacent floats
    if m >= b { a } else { m }
}

/// Column-major matrix of bin codes
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    codes: Vec<u8>,
    n_rows: usize,
    bins: Vec<FeatureBins>,
}

impl BinnedMatrix {
    /// Quantize every column of `x`
    pub fn from_array(x: &Array2<f64>, max_bins: usize) -> Result<Self> {
        if max_bins < 2 || max_bins > MAX_BINS {
            return Err(ChurnError::InvalidParameter {
                name: "max_bins".into(),
                value: max_bins.to_string(),
                reason: format!("must be in [2, {}]", MAX_BINS),
            });
        }

        let n_rows = x.nrows();
        let columns: Vec<(FeatureBins, Vec<u8>)> = (0..x.ncols())
            .into_par_iter()
            .map(|f| {
                let values: Vec<f64> = x.column(f).to_vec();
                let bins = FeatureBins::fit(&values, max_bins);
                let codes: Vec<u8> = values.iter().map(|&v| bins.bin(v)).collect();
                (bins, codes)
            })
            .collect();

        let mut codes = Vec::with_capacity(n_rows * columns.len());
        let mut bins = Vec::with_capacity(columns.len());
        for (b, c) in columns {
            codes.extend_from_slice(&c);
            bins.push(b);
        }

        Ok(Self { codes, n_rows, bins })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.bins.len()
    }

    pub fn column(&self, feature: usize) -> &[u8] {
        &self.codes[feature * self.n_rows..(feature + 1) * self.n_rows]
    }

    pub fn feature_bins(&self, feature: usize) -> &FeatureBins {
        &self.bins[feature]
    }

    /// Split `rows` into (bin <= `bin`, bin > `bin`)
    pub fn partition(&self, rows: &[usize], feature: usize, bin: usize) -> (Vec<usize>, Vec<usize>) {
        let col = self.column(feature);
        rows.iter().partition(|&&r| (col[r] as usize) <= bin)
    }
}

/// Gradient statistics accumulated over a set of rows
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BinStats {
    pub grad: f64,
    pub hess: f64,
    pub count: usize,
}

impl BinStats {
    pub fn of_rows(rows: &[usize], grad: &[f64], hess: &[f64]) -> Self {
        rows.iter().fold(Self::default(), |acc, &r| Self {
            grad: acc.grad + grad[r],
            hess: acc.hess + hess[r],
            count: acc.count + 1,
        })
    }

    fn add(&mut self, other: &BinStats) {
        self.grad += other.grad;
        self.hess += other.hess;
        self.count += other.count;
    }

    fn minus(&self, other: &BinStats) -> BinStats {
        BinStats {
            grad: self.grad - other.grad,
            hess: self.hess - other.hess,
            count: self.count - other.count,
        }
    }
}

/// Per-bin gradient sums of `rows` for one feature
pub fn build_histogram(
    matrix: &BinnedMatrix,
    feature: usize,
    rows: &[usize],
    grad: &[f64],
    hess: &[f64],
) -> Vec<BinStats> {
    let col = matrix.column(feature);
    let mut hist = vec![BinStats::default(); matrix.feature_bins(feature).n_bins()];
    for &r in rows {
        let slot = &mut hist[col[r] as usize];
        slot.grad += grad[r];
        slot.hess += hess[r];
        slot.count += 1;
    }
    hist
}

/// Best split found on one feature
#[derive(Debug, Clone, Copy)]
pub struct SplitCandidate {
    pub feature: usize,
    pub bin: usize,
    pub threshold: f64,
    pub gain: f64,
    pub left: BinStats,
    pub right: BinStats,
}

/// Scan the cut points of a histogram left to right.
///
/// `gain_fn` returns `None` when a cut violates a child constraint.
pub fn best_split_in_histogram<F>(
    matrix: &BinnedMatrix,
    feature: usize,
    hist: &[BinStats],
    gain_fn: F,
) -> Option<SplitCandidate>
where
    F: Fn(&BinStats, &BinStats) -> Option<f64>,
{
    let mut total = BinStats::default();
    for b in hist {
        total.add(b);
    }

    let mut left = BinStats::default();
    let mut best: Option<SplitCandidate> = None;
    for bin in 0..hist.len().saturating_sub(1) {
        left.add(&hist[bin]);
        if hist[bin].count == 0 {
            // Same partition as the previous cut
            continue;
        }
        let right = total.minus(&left);
        if left.count == 0 || right.count == 0 {
            continue;
        }
        if let Some(gain) = gain_fn(&left, &right) {
            if best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    bin,
                    threshold: matrix.feature_bins(feature).threshold(bin),
                    gain,
                    left,
                    right,
                });
            }
        }
    }
    best
}

/// Pick the highest-gain candidate across features
pub fn best_of(candidates: impl Iterator<Item = SplitCandidate>) -> Option<SplitCandidate> {
    candidates.fold(None, |best: Option<SplitCandidate>, c| match best {
        Some(b) if b.gain >= c.gain => Some(b),
        _ => Some(c),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_few_distinct_values_get_own_bins() {
        let bins = FeatureBins::fit(&[1.0, 2.0, 2.0, 3.0], 255);
        assert_eq!(bins.n_bins(), 3);
        assert_eq!(bins.bin(1.0), 0);
        assert_eq!(bins.bin(2.0), 1);
        assert_eq!(bins.bin(3.0), 2);
        assert_eq!(bins.bin(100.0), 2);
        assert!((bins.threshold(0) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_quantile_bins_respect_limit() {
        let values: Vec<f64> = (0..10_000).map(|i| i as f64).collect();
        let bins = FeatureBins::fit(&values, 16);
        assert!(bins.n_bins() <= 16);
        assert!(bins.n_bins() >= 8);
    }

    #[test]
    fn test_bin_matches_threshold_semantics() {
        let values: Vec<f64> = (0..1000).map(|i| (i as f64 * 0.37).sin()).collect();
        let bins = FeatureBins::fit(&values, 32);
        for &v in &values {
            let b = bins.bin(v) as usize;
            assert!(v <= bins.threshold(b));
            if b > 0 {
                assert!(v > bins.threshold(b - 1));
            }
        }
    }

    #[test]
    fn test_rejects_bad_max_bins() {
        let x = array![[1.0], [2.0]];
        assert!(BinnedMatrix::from_array(&x, 1).is_err());
        assert!(BinnedMatrix::from_array(&x, 256).is_err());
        assert!(BinnedMatrix::from_array(&x, MAX_BINS).is_ok());
    }

    #[test]
    fn test_histogram_and_best_split() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let m = BinnedMatrix::from_array(&x, 255).unwrap();
        let grad = [-1.0, -1.0, 1.0, 1.0];
        let hess = [1.0; 4];
        let rows = [0, 1, 2, 3];
        let hist = build_histogram(&m, 0, &rows, &grad, &hess);
        assert_eq!(hist.len(), 4);

        let split = best_split_in_histogram(&m, 0, &hist, |l, r| {
            Some(l.grad * l.grad / l.hess + r.grad * r.grad / r.hess)
        })
        .unwrap();
        assert_eq!(split.bin, 1);
        assert!((split.threshold - 1.5).abs() < 1e-12);
        assert_eq!(split.left.count, 2);

        let (left, right) = m.partition(&rows, 0, split.bin);
        assert_eq!(left, vec![0, 1]);
        assert_eq!(right, vec![2, 3]);
    }
}
