//! CSV loading for the bank-churn competition files

use super::{f64_column, i64_column, require_columns};
use crate::error::{ChurnError, Result};
use ndarray::Array1;
use polars::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Row identifier column
pub const ID_COLUMN: &str = "id";
/// Binary churn label
pub const TARGET_COLUMN: &str = "Exited";

/// Columns every train and test row must carry
pub const REQUIRED_COLUMNS: [&str; 13] = [
    "id",
    "CustomerId",
    "Surname",
    "CreditScore",
    "Geography",
    "Gender",
    "Age",
    "Tenure",
    "Balance",
    "NumOfProducts",
    "HasCrCard",
    "IsActiveMember",
    "EstimatedSalary",
];

/// Train features, labels and test features
#[derive(Debug, Clone)]
pub struct CompetitionData {
    pub train: DataFrame,
    pub target: Array1<f64>,
    pub test: DataFrame,
    pub test_ids: Vec<i64>,
}

/// Read a CSV file with a header row
pub fn read_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ChurnError::DataError(format!("file not found: {}", path.display())));
    }
    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()?;
    Ok(df)
}

/// Split the label column off a training frame
pub fn split_target(df: &DataFrame) -> Result<(DataFrame, Array1<f64>)> {
    let values = f64_column(df, TARGET_COLUMN)?;
    if let Some(bad) = values.iter().find(|&&v| v != 0.0 && v != 1.0) {
        return Err(ChurnError::DataError(format!(
            "'{}' must be 0 or 1, found {}",
            TARGET_COLUMN, bad
        )));
    }
    let features = df.drop(TARGET_COLUMN)?;
    Ok((features, Array1::from_vec(values)))
}

fn unique_ids(df: &DataFrame, file: &str) -> Result<Vec<i64>> {
    let ids = i64_column(df, ID_COLUMN)?;
    let mut seen = HashSet::with_capacity(ids.len());
    if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
        return Err(ChurnError::DataError(format!("duplicate id {} in {}", dup, file)));
    }
    Ok(ids)
}

/// Load `train.csv` and `test.csv` from `data_dir`
pub fn load_competition_data(data_dir: impl AsRef<Path>) -> Result<CompetitionData> {
    let data_dir = data_dir.as_ref();
    let start = Instant::now();

    let train_raw = read_csv(data_dir.join("train.csv"))?;
    require_columns(&train_raw, &REQUIRED_COLUMNS)?;
    require_columns(&train_raw, &[TARGET_COLUMN])?;
    unique_ids(&train_raw, "train.csv")?;
    let (train, target) = split_target(&train_raw)?;

    let test = read_csv(data_dir.join("test.csv"))?;
    require_columns(&test, &REQUIRED_COLUMNS)?;
    let test_ids = unique_ids(&test, "test.csv")?;

    if train.height() == 0 || test.height() == 0 {
        return Err(ChurnError::DataError("train.csv and test.csv must not be empty".into()));
    }

    info!(
        train_rows = train.height(),
        test_rows = test.height(),
        positive_rate = target.mean().unwrap_or(0.0),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "data loaded"
    );

    Ok(CompetitionData { train, target, test, test_ids })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const HEADER: &str = "id,CustomerId,Surname,CreditScore,Geography,Gender,Age,Tenure,Balance,NumOfProducts,HasCrCard,IsActiveMember,EstimatedSalary";

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_load_competition_data() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "train.csv",
            &format!(
                "{},Exited\n0,15674932,Okwudilichukwu,668,France,Male,33.0,3,0.0,2,1.0,0.0,181449.97,0\n1,15749177,Okwudiliolisa,627,France,Male,33.0,1,0.0,2,1.0,1.0,49503.5,1\n",
                HEADER
            ),
        );
        write(
            dir.path(),
            "test.csv",
            &format!("{}\n165034,15773898,Lucchese,586,France,Female,23.0,2,0.0,2,0.0,1.0,160976.75\n", HEADER),
        );

        let data = load_competition_data(dir.path()).unwrap();
        assert_eq!(data.train.height(), 2);
        assert!(data.train.column(TARGET_COLUMN).is_err());
        assert_eq!(data.target.to_vec(), vec![0.0, 1.0]);
        assert_eq!(data.test_ids, vec![165034]);
    }

    #[test]
    fn test_missing_column_is_named() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "train.csv", "id,Surname,Exited\n0,A,0\n");
        write(dir.path(), "test.csv", "id,Surname\n1,B\n");
        match load_competition_data(dir.path()) {
            Err(ChurnError::ColumnNotFound(c)) => assert_eq!(c, "CustomerId"),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_competition_data(dir.path()).is_err());
    }

    #[test]
    fn test_split_target_rejects_non_binary() {
        let df = df! { "a" => [1.0, 2.0], "Exited" => [0i64, 2] }.unwrap();
        assert!(split_target(&df).is_err());
    }
}
