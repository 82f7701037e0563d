//! Text feature extraction

use crate::error::{ChurnError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Word tokenizer: runs of alphanumeric or `_` characters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextTokenizer {
    lowercase: bool,
    min_token_length: usize,
}

impl TextTokenizer {
    pub fn new() -> Self {
        Self {
            lowercase: true,
            min_token_length: 2,
        }
    }

    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    pub fn with_min_length(mut self, len: usize) -> Self {
        self.min_token_length = len;
        self
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let processed = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        processed
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|s| s.chars().count() >= self.min_token_length.max(1))
            .map(|s| s.to_string())
            .collect()
    }
}

impl Default for TextTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Compressed sparse row matrix
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
    n_cols: usize,
}

impl CsrMatrix {
    /// Build from per-row `(column, value)` entries
    pub fn from_rows(rows: Vec<Vec<(usize, f64)>>, n_cols: usize) -> Self {
        let mut indptr = Vec::with_capacity(rows.len() + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);
        for row in rows {
            for (c, v) in row {
                indices.push(c);
                data.push(v);
            }
            indptr.push(indices.len());
        }
        Self { indptr, indices, data, n_cols }
    }

    pub fn nrows(&self) -> usize {
        self.indptr.len() - 1
    }

    pub fn ncols(&self) -> usize {
        self.n_cols
    }

    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Non-zero `(column, value)` pairs of one row
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let (start, end) = (self.indptr[i], self.indptr[i + 1]);
        self.indices[start..end]
            .iter()
            .copied()
            .zip(self.data[start..end].iter().copied())
    }
}

/// TF-IDF vectorizer with a sorted vocabulary and sparse output
///
/// Terms are indexed alphabetically. IDF is smoothed,
/// `ln((1 + n) / (1 + df)) + 1`, and rows are L2 normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    tokenizer: TextTokenizer,
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
    normalize: bool,
    smooth_idf: bool,
    sublinear_tf: bool,
}

impl TfidfVectorizer {
    pub fn new() -> Self {
        Self {
            tokenizer: TextTokenizer::new(),
            vocabulary: BTreeMap::new(),
            idf: Vec::new(),
            normalize: true,
            smooth_idf: true,
            sublinear_tf: false,
        }
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_sublinear_tf(mut self, sublinear: bool) -> Self {
        self.sublinear_tf = sublinear;
        self
    }

    pub fn fit<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<()> {
        let n_docs = documents.len();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let mut tokens = self.tokenizer.tokenize(doc.as_ref());
            tokens.sort_unstable();
            tokens.dedup();
            for token in tokens {
                *doc_freq.entry(token).or_insert(0) += 1;
            }
        }

        if doc_freq.is_empty() {
            return Err(ChurnError::PreprocessingError(
                "empty vocabulary; documents contain no tokens".to_string(),
            ));
        }

        let sorted: BTreeMap<String, usize> = doc_freq.into_iter().collect();
        let n = n_docs as f64;
        self.idf = sorted
            .values()
            .map(|&df| {
                let df = df as f64;
                if self.smooth_idf {
                    ((n + 1.0) / (df + 1.0)).ln() + 1.0
                } else {
                    (n / df).ln() + 1.0
                }
            })
            .collect();
        self.vocabulary = sorted.into_keys().enumerate().map(|(idx, term)| (term, idx)).collect();

        Ok(())
    }

    pub fn transform<S: AsRef<str>>(&self, documents: &[S]) -> Result<CsrMatrix> {
        if self.vocabulary.is_empty() {
            return Err(ChurnError::ModelNotFitted);
        }

        let rows = documents
            .iter()
            .map(|doc| {
                let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
                for token in self.tokenizer.tokenize(doc.as_ref()) {
                    // Out-of-vocabulary terms are ignored
                    if let Some(&idx) = self.vocabulary.get(&token) {
                        *counts.entry(idx).or_insert(0.0) += 1.0;
                    }
                }

                let mut row: Vec<(usize, f64)> = counts
                    .into_iter()
                    .map(|(idx, tf)| {
                        let tf = if self.sublinear_tf { 1.0 + tf.ln() } else { tf };
                        (idx, tf * self.idf[idx])
                    })
                    .collect();

                if self.normalize {
                    let norm = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
                    if norm > 0.0 {
                        row.iter_mut().for_each(|(_, v)| *v /= norm);
                    }
                }
                row
            })
            .collect();

        Ok(CsrMatrix::from_rows(rows, self.vocabulary.len()))
    }

    pub fn fit_transform<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<CsrMatrix> {
        self.fit(documents)?;
        self.transform(documents)
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn get_feature_names(&self) -> Vec<String> {
        self.vocabulary.keys().cloned().collect()
    }
}

impl Default for TfidfVectorizer {
    fn default() -> Self {
        Self::new()
    }
}
