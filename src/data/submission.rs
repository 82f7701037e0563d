//! Submission file: `id,Exited`

use super::loader::{ID_COLUMN, TARGET_COLUMN};
use crate::error::{ChurnError, Result};
use ndarray::Array1;
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Predicted churn probability per test id
#[derive(Debug, Clone)]
pub struct Submission {
    ids: Vec<i64>,
    probabilities: Array1<f64>,
}

impl Submission {
    /// Pair ids with probabilities.
    ///
    /// Ids must be unique and probabilities finite and within `[0, 1]`.
    pub fn new(ids: Vec<i64>, probabilities: Array1<f64>) -> Result<Self> {
        if ids.len() != probabilities.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("{} predictions", ids.len()),
                actual: format!("{} predictions", probabilities.len()),
            });
        }
        let mut seen = HashSet::with_capacity(ids.len());
        if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
            return Err(ChurnError::ValidationError(format!("duplicate submission id {}", dup)));
        }
        if let Some(bad) = probabilities.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(ChurnError::ValidationError(format!(
                "probability {} outside [0, 1]",
                bad
            )));
        }
        Ok(Self { ids, probabilities })
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn probabilities(&self) -> &Array1<f64> {
        &self.probabilities
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            Series::new(ID_COLUMN.into(), &self.ids).into(),
            Series::new(TARGET_COLUMN.into(), self.probabilities.to_vec()).into(),
        ])?)
    }

    /// Write as CSV with a header row
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut df = self.to_dataframe()?;
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
        info!(rows = self.len(), path = %path.display(), "submission written");
        Ok(())
    }
}

/// Validate and write a submission in one step
pub fn write_submission(path: impl AsRef<Path>, ids: &[i64], probabilities: &Array1<f64>) -> Result<Submission> {
    let submission = Submission::new(ids.to_vec(), probabilities.clone())?;
    submission.write_csv(path)?;
    Ok(submission)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{i64_column, read_csv};
    use ndarray::array;

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("submission.csv");
        write_submission(&path, &[7, 3, 9], &array![0.1, 0.5, 0.9]).unwrap();

        let df = read_csv(&path).unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["id", "Exited"]);
        assert_eq!(i64_column(&df, "id").unwrap(), vec![7, 3, 9]);
    }

    #[test]
    fn test_rejects_duplicates_and_bad_probabilities() {
        assert!(Submission::new(vec![1, 1], array![0.1, 0.2]).is_err());
        assert!(Submission::new(vec![1, 2], array![0.1, 1.2]).is_err());
        assert!(Submission::new(vec![1, 2], array![0.1, f64::NAN]).is_err());
        assert!(Submission::new(vec![1], array![0.1, 0.2]).is_err());
    }
}
