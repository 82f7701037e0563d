//! Categorical encoding implementations

use crate::data::string_column;
use crate::error::{ChurnError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Type of encoder to use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EncoderType {
    /// One 0/1 column per category; unseen values encode as all zeros
    OneHot,
    /// Category index in sorted order; unseen values map to -1
    Label,
}

/// Categorical encoder
///
/// Categories are learned per column and kept sorted, numerically when
/// every category parses as a number and lexicographically otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encoder {
    encoder_type: EncoderType,
    // (column name, sorted categories) in fit order
    categories: Vec<(String, Vec<String>)>,
    is_fitted: bool,
}

impl Encoder {
    /// Create a new encoder
    pub fn new(encoder_type: EncoderType) -> Self {
        Self {
            encoder_type,
            categories: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fit the encoder to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        let mut categories = Vec::with_capacity(columns.len());
        for col_name in columns {
            let values = string_column(df, col_name)?;
            let unique: BTreeSet<String> = values.into_iter().collect();
            categories.push((col_name.to_string(), sort_categories(unique.into_iter().collect())));
        }
        self.categories = categories;
        self.is_fitted = true;
        Ok(self)
    }

    /// Learned categories of a column
    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.categories
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cats)| cats.as_slice())
    }

    /// Names of the columns `transform` produces, in order
    pub fn output_names(&self) -> Vec<String> {
        match self.encoder_type {
            EncoderType::OneHot => self
                .categories
                .iter()
                .flat_map(|(col, cats)| cats.iter().map(move |cat| format!("{}_{}", col, cat)))
                .collect(),
            EncoderType::Label => self.categories.iter().map(|(col, _)| col.clone()).collect(),
        }
    }

    /// Transform the data
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(ChurnError::ModelNotFitted);
        }

        match self.encoder_type {
            EncoderType::OneHot => self.transform_onehot(df),
            EncoderType::Label => self.transform_label(df),
        }
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    fn transform_onehot(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();

        for (col_name, cats) in &self.categories {
            let values = string_column(df, col_name)?;
            for cat in cats {
                let encoded: Vec<f64> = values.iter().map(|v| if v == cat { 1.0 } else { 0.0 }).collect();
                let new_name = format!("{}_{}", col_name, cat);
                result.with_column(Series::new(new_name.as_str().into(), encoded))?;
            }
            result = result.drop(col_name)?;
        }

        Ok(result)
    }

    fn transform_label(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();

        for (col_name, cats) in &self.categories {
            let values = string_column(df, col_name)?;
            let encoded: Vec<i64> = values
                .iter()
                .map(|v| cats.iter().position(|c| c == v).map_or(-1, |i| i as i64))
                .collect();
            result.with_column(Series::new(col_name.as_str().into(), encoded))?;
        }

        Ok(result)
    }
}

fn sort_categories(mut cats: Vec<String>) -> Vec<String> {
    let numeric: Option<Vec<f64>> = cats.iter().map(|c| c.parse::<f64>().ok()).collect();
    if let Some(nums) = numeric {
        let mut paired: Vec<(f64, String)> = nums.into_iter().zip(cats).collect();
        paired.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        paired.into_iter().map(|(_, c)| c).collect()
    } else {
        cats.sort();
        cats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::f64_column;

    fn names(df: &DataFrame) -> Vec<String> {
        df.get_column_names().iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_onehot_encoder() {
        let df = df! {
            "Geography" => ["Spain", "France", "Germany", "France"],
            "x" => [1.0, 2.0, 3.0, 4.0],
        }
        .unwrap();

        let mut encoder = Encoder::new(EncoderType::OneHot);
        let result = encoder.fit_transform(&df, &["Geography"]).unwrap();

        assert_eq!(
            names(&result),
            vec!["x", "Geography_France", "Geography_Germany", "Geography_Spain"]
        );
        assert_eq!(f64_column(&result, "Geography_France").unwrap(), vec![0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_numeric_categories_sort_numerically() {
        let df = df! { "NumOfProducts" => [10i64, 2, 1, 2] }.unwrap();
        let mut encoder = Encoder::new(EncoderType::OneHot);
        encoder.fit(&df, &["NumOfProducts"]).unwrap();
        assert_eq!(
            encoder.output_names(),
            vec!["NumOfProducts_1", "NumOfProducts_2", "NumOfProducts_10"]
        );
    }

    #[test]
    fn test_unseen_category_is_all_zeros() {
        let train = df! { "Gender" => ["Male", "Female"] }.unwrap();
        let test = df! { "Gender" => ["Other"] }.unwrap();

        let mut encoder = Encoder::new(EncoderType::OneHot);
        encoder.fit(&train, &["Gender"]).unwrap();
        let result = encoder.transform(&test).unwrap();

        assert_eq!(names(&result), vec!["Gender_Female", "Gender_Male"]);
        assert_eq!(f64_column(&result, "Gender_Female").unwrap(), vec![0.0]);
        assert_eq!(f64_column(&result, "Gender_Male").unwrap(), vec![0.0]);
    }

    #[test]
    fn test_label_encoder() {
        let df = df! { "c" => ["b", "a", "c"] }.unwrap();
        let mut encoder = Encoder::new(EncoderType::Label);
        encoder.fit(&df, &["c"]).unwrap();
        let test = df! { "c" => ["c", "z"] }.unwrap();
        let result = encoder.transform(&test).unwrap();
        assert_eq!(crate::data::i64_column(&result, "c").unwrap(), vec![2, -1]);
    }

    #[test]
    fn test_transform_before_fit() {
        let df = df! { "c" => ["a"] }.unwrap();
        assert!(Encoder::new(EncoderType::OneHot).transform(&df).is_err());
    }
}
