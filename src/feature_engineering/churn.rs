//! Derived bank-churn columns
//!
//! Stateless: every derived column depends on its own row only, so the same
//! function serves train, validation and test frames.

use crate::data::{f64_column, require_columns, string_column};
use crate::error::Result;
use polars::prelude::*;

pub const SURNAME_LENGTH: &str = "SurnameLength";
pub const AGE_CATEGORY: &str = "AgeCategory";
pub const IS_SENIOR: &str = "IsSenior";
pub const IS_ACTIVE_BY_CR_CARD: &str = "IsActiveByCrCard";
pub const PRODUCTS_PER_TENURE: &str = "ProductsPerTenure";
pub const SUR_GEO_GEND_SAL: &str = "SurGeoGendSal";

/// Width of each age bucket in years
const AGE_BUCKET_YEARS: f64 = 20.0;
const SENIOR_AGE: f64 = 60.0;

const INPUT_COLUMNS: [&str; 10] = [
    "CustomerId",
    "Surname",
    "Geography",
    "Gender",
    "Age",
    "Tenure",
    "NumOfProducts",
    "HasCrCard",
    "IsActiveMember",
    "EstimatedSalary",
];

/// `round(age / 20)` with ties to even
pub fn age_category(age: f64) -> i64 {
    (age / AGE_BUCKET_YEARS).round_ties_even() as i64
}

/// Salary rounded half-to-even and printed with one decimal, e.g. `181450.0`
pub fn salary_token(salary: f64) -> String {
    format!("{:.1}", salary.round_ties_even())
}

/// Append the derived columns to a copy of `df`
pub fn engineer_features(df: &DataFrame) -> Result<DataFrame> {
    require_columns(df, &INPUT_COLUMNS)?;

    let surnames = string_column(df, "Surname")?;
    let customer_ids = string_column(df, "CustomerId")?;
    let geography = string_column(df, "Geography")?;
    let gender = string_column(df, "Gender")?;
    let age = f64_column(df, "Age")?;
    let tenure = f64_column(df, "Tenure")?;
    let products = f64_column(df, "NumOfProducts")?;
    let has_card = f64_column(df, "HasCrCard")?;
    let active = f64_column(df, "IsActiveMember")?;
    let salary = f64_column(df, "EstimatedSalary")?;

    let surname_length: Vec<i64> = surnames.iter().map(|s| s.chars().count() as i64).collect();
    let age_cat: Vec<i64> = age.iter().map(|&a| age_category(a)).collect();
    let is_senior: Vec<i64> = age.iter().map(|&a| i64::from(a >= SENIOR_AGE)).collect();
    let active_by_card: Vec<f64> = has_card.iter().zip(&active).map(|(c, a)| c * a).collect();
    // NumOfProducts is at least 1 in valid data; a zero yields inf like a float division would
    let per_tenure: Vec<f64> = tenure.iter().zip(&products).map(|(t, p)| t / p).collect();
    let sur_geo_gend_sal: Vec<String> = (0..df.height())
        .map(|i| {
            format!(
                "{}{}{}{}{}",
                customer_ids[i],
                surnames[i],
                geography[i],
                gender[i],
                salary_token(salary[i])
            )
        })
        .collect();

    let mut out = df.clone();
    out.with_column(Series::new(SURNAME_LENGTH.into(), surname_length))?;
    out.with_column(Series::new(AGE_CATEGORY.into(), age_cat))?;
    out.with_column(Series::new(IS_SENIOR.into(), is_senior))?;
    out.with_column(Series::new(IS_ACTIVE_BY_CR_CARD.into(), active_by_card))?;
    out.with_column(Series::new(PRODUCTS_PER_TENURE.into(), per_tenure))?;
    out.with_column(Series::new(SUR_GEO_GEND_SAL.into(), sur_geo_gend_sal))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::i64_column;

    fn frame() -> DataFrame {
        df! {
            "CustomerId" => [15674932i64, 15749177],
            "Surname" => ["Okwudilichukwu", "Hsia"],
            "Geography" => ["France", "Spain"],
            "Gender" => ["Male", "Female"],
            "Age" => [30.0, 62.0],
            "Tenure" => [3i64, 4],
            "NumOfProducts" => [2i64, 1],
            "HasCrCard" => [1.0, 1.0],
            "IsActiveMember" => [0.0, 1.0],
            "EstimatedSalary" => [181449.97, 49502.5],
        }
        .unwrap()
    }

    #[test]
    fn test_age_category_rounds_half_to_even() {
        assert_eq!(age_category(30.0), 2); // 1.5 -> 2
        assert_eq!(age_category(50.0), 2); // 2.5 -> 2
        assert_eq!(age_category(70.0), 4); // 3.5 -> 4
        assert_eq!(age_category(18.0), 1);
    }

    #[test]
    fn test_salary_token() {
        assert_eq!(salary_token(181449.97), "181450.0");
        assert_eq!(salary_token(49502.5), "49502.0");
        assert_eq!(salary_token(49503.5), "49504.0");
    }

    #[test]
    fn test_engineer_features() {
        let out = engineer_features(&frame()).unwrap();
        assert_eq!(out.width(), frame().width() + 6);
        assert_eq!(i64_column(&out, SURNAME_LENGTH).unwrap(), vec![14, 4]);
        assert_eq!(i64_column(&out, AGE_CATEGORY).unwrap(), vec![2, 3]);
        assert_eq!(i64_column(&out, IS_SENIOR).unwrap(), vec![0, 1]);
        assert_eq!(f64_column(&out, IS_ACTIVE_BY_CR_CARD).unwrap(), vec![0.0, 1.0]);
        assert_eq!(f64_column(&out, PRODUCTS_PER_TENURE).unwrap(), vec![1.5, 4.0]);
        assert_eq!(
            string_column(&out, SUR_GEO_GEND_SAL).unwrap(),
            vec!["15674932OkwudilichukwuFranceMale181450.0", "15749177HsiaSpainFemale49502.0"]
        );
    }

    #[test]
    fn test_missing_input_column() {
        let df = frame().drop("Gender").unwrap();
        assert!(engineer_features(&df).is_err());
    }
}
