//! Dense text embeddings: TF-IDF followed by truncated SVD, one pair per column

use super::svd::{SvdConfig, TruncatedSvd};
use super::text_features::TfidfVectorizer;
use crate::data::string_column;
use crate::error::{ChurnError, Result};
use polars::prelude::*;
use tracing::debug;

/// Prefix of the generated columns; numbering runs across all text columns
pub const EMBEDDING_PREFIX: &str = "TextEmbedding";

#[derive(Debug, Clone)]
struct ColumnEmbedding {
    column: String,
    vectorizer: TfidfVectorizer,
    svd: TruncatedSvd,
}

/// Embeds string columns into `n_components` dense columns each
#[derive(Debug, Clone)]
pub struct TextEmbedder {
    columns: Vec<String>,
    svd_config: SvdConfig,
    fitted: Vec<ColumnEmbedding>,
}

impl TextEmbedder {
    pub fn new(columns: &[&str], svd_config: SvdConfig) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            svd_config,
            fitted: Vec::new(),
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.fitted.is_empty()
    }

    /// Names of the generated columns in output order
    pub fn output_names(&self) -> Vec<String> {
        let total = self.columns.len() * self.svd_config.n_components;
        (0..total).map(|i| format!("{}{}", EMBEDDING_PREFIX, i)).collect()
    }

    pub fn fit(&mut self, df: &DataFrame) -> Result<()> {
        let mut fitted = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let docs = string_column(df, column)?;
            let mut vectorizer = TfidfVectorizer::new();
            let tfidf = vectorizer.fit_transform(&docs)?;
            let mut svd = TruncatedSvd::new(self.svd_config.clone());
            svd.fit(&tfidf)?;
            debug!(
                column = %column,
                vocabulary = vectorizer.vocabulary_size(),
                nnz = tfidf.nnz(),
                "text embedding fitted"
            );
            fitted.push(ColumnEmbedding {
                column: column.clone(),
                vectorizer,
                svd,
            });
        }
        self.fitted = fitted;
        Ok(())
    }

    /// Append the embedding columns to a copy of `df`
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted() {
            return Err(ChurnError::ModelNotFitted);
        }
        let mut out = df.clone();
        let mut next = 0;
        for embedding in &self.fitted {
            let docs = string_column(df, &embedding.column)?;
            let tfidf = embedding.vectorizer.transform(&docs)?;
            let dense = embedding.svd.transform(&tfidf)?;
            for component in dense.columns() {
                let name = format!("{}{}", EMBEDDING_PREFIX, next);
                out.with_column(Series::new(name.as_str().into(), component.to_vec()))?;
                next += 1;
            }
        }
        Ok(out)
    }

    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        self.fit(df)?;
        self.transform(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::f64_column;

    fn frame() -> DataFrame {
        df! {
            "Surname" => ["Smith", "Smith", "Chen", "Okafor", "Chen", "Rossi"],
            "Key" => ["a smith", "b smith", "c chen", "d okafor", "e chen", "f rossi"],
        }
        .unwrap()
    }

    #[test]
    fn test_embedding_columns() {
        let mut embedder = TextEmbedder::new(&["Surname", "Key"], SvdConfig::default());
        let out = embedder.fit_transform(&frame()).unwrap();
        assert_eq!(out.width(), 2 + 6);
        assert_eq!(embedder.output_names().len(), 6);
        for name in embedder.output_names() {
            assert!(f64_column(&out, &name).unwrap().iter().all(|v| v.is_finite()));
        }
        // Identical surnames embed identically
        let e0 = f64_column(&out, "TextEmbedding0").unwrap();
        assert!((e0[0] - e0[1]).abs() < 1e-12);
    }

    #[test]
    fn test_unseen_text_embeds_to_zero() {
        let mut embedder = TextEmbedder::new(&["Surname"], SvdConfig::default());
        embedder.fit(&frame()).unwrap();
        let test = df! { "Surname" => ["Nakamura"] }.unwrap();
        let out = embedder.transform(&test).unwrap();
        for name in embedder.output_names() {
            assert_eq!(f64_column(&out, &name).unwrap(), vec![0.0]);
        }
    }

    #[test]
    fn test_transform_before_fit() {
        let embedder = TextEmbedder::new(&["Surname"], SvdConfig::default());
        assert!(matches!(embedder.transform(&frame()), Err(ChurnError::ModelNotFitted)));
    }
}
