//! Data loading and submission writing
//!
//! Also holds the small DataFrame accessors shared by the feature and
//! preprocessing code.

mod loader;
mod submission;

pub use loader::{
    load_competition_data, read_csv, split_target, CompetitionData, ID_COLUMN, REQUIRED_COLUMNS,
    TARGET_COLUMN,
};
pub use submission::{write_submission, Submission};

use crate::error::{ChurnError, Result};
use polars::prelude::*;

/// Fail with [`ChurnError::ColumnNotFound`] on the first missing column
pub fn require_columns(df: &DataFrame, columns: &[&str]) -> Result<()> {
    let present = df.get_column_names();
    for name in columns {
        if !present.iter().any(|c| c.as_str() == *name) {
            return Err(ChurnError::ColumnNotFound(name.to_string()));
        }
    }
    Ok(())
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| ChurnError::ColumnNotFound(name.to_string()))
}

/// Column values as `f64` (integers are cast, nulls are an error)
pub fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let casted = column(df, name)?.cast(&DataType::Float64)?;
    let ca = casted.f64()?;
    ca.into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| ChurnError::DataError(format!("null in column '{}' at row {}", name, row)))
        })
        .collect()
}

/// Column values as `i64` (nulls are an error)
pub fn i64_column(df: &DataFrame, name: &str) -> Result<Vec<i64>> {
    let casted = column(df, name)?.cast(&DataType::Int64)?;
    let ca = casted.i64()?;
    ca.into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| ChurnError::DataError(format!("null in column '{}' at row {}", name, row)))
        })
        .collect()
}

/// Column values rendered as strings (nulls are an error)
pub fn string_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let casted = column(df, name)?.cast(&DataType::String)?;
    let ca = casted.str()?;
    ca.into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.map(str::to_string).ok_or_else(|| {
                ChurnError::DataError(format!("null in column '{}' at row {}", name, row))
            })
        })
        .collect()
}

/// Rows of `df` at `indices`, in that order
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec(
        "idx".into(),
        indices.iter().map(|&i| i as IdxSize).collect(),
    );
    Ok(df.take(&idx)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_accessors() {
        let df = df! {
            "a" => [1i64, 2, 3],
            "b" => ["x", "y", "z"],
        }
        .unwrap();
        assert_eq!(f64_column(&df, "a").unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(i64_column(&df, "a").unwrap(), vec![1, 2, 3]);
        assert_eq!(string_column(&df, "a").unwrap(), vec!["1", "2", "3"]);
        assert_eq!(string_column(&df, "b").unwrap(), vec!["x", "y", "z"]);
        assert!(matches!(f64_column(&df, "nope"), Err(ChurnError::ColumnNotFound(_))));
    }

    #[test]
    fn test_nulls_are_rejected() {
        let df = df! { "a" => [Some(1.0), None] }.unwrap();
        assert!(f64_column(&df, "a").is_err());
    }

    #[test]
    fn test_require_and_take() {
        let df = df! { "a" => [10i64, 20, 30], "b" => [1.0, 2.0, 3.0] }.unwrap();
        assert!(require_columns(&df, &["a", "b"]).is_ok());
        assert!(matches!(
            require_columns(&df, &["a", "c"]),
            Err(ChurnError::ColumnNotFound(c)) if c == "c"
        ));

        let taken = take_rows(&df, &[2, 0]).unwrap();
        assert_eq!(i64_column(&taken, "a").unwrap(), vec![30, 10]);
    }
}
