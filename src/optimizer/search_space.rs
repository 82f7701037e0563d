//! Search space definition for hyperparameters

use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Type of parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterType {
    /// Continuous float parameter on `[low, high]`
    Float { low: f64, high: f64 },
    /// Integer parameter on `[low, high]`
    Int { low: i64, high: i64 },
}

/// A single hyperparameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParameterType,
}

impl Parameter {
    /// Create a float parameter
    pub fn float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float { low, high },
        }
    }

    /// Create an integer parameter
    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Int { low, high },
        }
    }

    /// Sample a random value
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match &self.param_type {
            ParameterType::Float { low, high } => {
                ParameterValue::Float(rng.gen::<f64>() * (high - low) + low)
            }
            ParameterType::Int { low, high } => ParameterValue::Int(rng.gen_range(*low..=*high)),
        }
    }

    /// Map a value onto `[0, 1]`.
    ///
    /// Integers own the slice `[v - 0.5, v + 0.5]` so every integer in the
    /// range gets the same width.
    pub fn to_unit(&self, value: &ParameterValue) -> Option<f64> {
        let v = value.as_float()?;
        let u = match &self.param_type {
            ParameterType::Float { low, high } => {
                if high > low { (v - low) / (high - low) } else { 0.5 }
            }
            ParameterType::Int { low, high } => {
                let (lo, hi) = (*low as f64 - 0.5, *high as f64 + 0.5);
                (v - lo) / (hi - lo)
            }
        };
        Some(u.clamp(0.0, 1.0))
    }

    /// Inverse of [`Parameter::to_unit`]
    pub fn from_unit(&self, u: f64) -> ParameterValue {
        let u = u.clamp(0.0, 1.0);
        match &self.param_type {
            ParameterType::Float { low, high } => ParameterValue::Float(low + u * (high - low)),
            ParameterType::Int { low, high } => {
                let (lo, hi) = (*low as f64 - 0.5, *high as f64 + 0.5);
                let v = (lo + u * (hi - lo)).round() as i64;
                ParameterValue::Int(v.clamp(*low, *high))
            }
        }
    }

    /// Whether `value` has the right type and lies inside the bounds
    pub fn contains(&self, value: &ParameterValue) -> bool {
        match (&self.param_type, value) {
            (ParameterType::Float { low, high }, ParameterValue::Float(v)) => *v >= *low && *v <= *high,
            (ParameterType::Float { low, high }, ParameterValue::Int(v)) => {
                (*v as f64) >= *low && (*v as f64) <= *high
            }
            (ParameterType::Int { low, high }, ParameterValue::Int(v)) => *v >= *low && *v <= *high,
            (ParameterType::Int { .. }, ParameterValue::Float(_)) => false,
        }
    }
}

/// Sampled parameter value
///
/// Serialized untagged, so a study file reads `{"xgb__max_depth": 9}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
}

impl ParameterValue {
    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
        }
    }

    /// Get as int (floats must be integral)
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            ParameterValue::Float(_) => None,
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{:.6}", v),
        }
    }
}

/// Search space for hyperparameter optimization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    /// Create a new empty search space
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }

    /// Add a parameter to the search space
    pub fn add(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// Add a float parameter
    pub fn float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::float(name, low, high))
    }

    /// Add an integer parameter
    pub fn int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(Parameter::int(name, low, high))
    }

    /// Get all parameters
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Sample a random configuration
    pub fn sample(&self, rng: &mut impl Rng) -> TrialParams {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.sample(rng)))
            .collect()
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Get parameter names in order
    pub fn param_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }
}

/// Alias for sampled configuration
pub type TrialParams = BTreeMap<String, ParameterValue>;

#[cfg(test)]
mod tests {
    use super::*;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_search_space_builder() {
        let space = SearchSpace::new()
            .float("learning_rate", 0.001, 0.1)
            .int("n_estimators", 10, 1000);

        assert_eq!(space.len(), 2);
        assert_eq!(space.param_names(), vec!["learning_rate", "n_estimators"]);
        assert!(space.get("n_estimators").is_some());
    }

    #[test]
    fn test_parameter_sampling_in_bounds() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let float = Parameter::float("lr", 0.05, 1.0);
        let int = Parameter::int("depth", 1, 10);
        for _ in 0..200 {
            assert!(float.contains(&float.sample(&mut rng)));
            assert!(int.contains(&int.sample(&mut rng)));
        }
    }

    #[test]
    fn test_unit_mapping_round_trips_ints() {
        let p = Parameter::int("leaves", 2, 1000);
        for v in [2, 3, 500, 999, 1000] {
            let u = p.to_unit(&ParameterValue::Int(v)).unwrap();
            assert_eq!(p.from_unit(u), ParameterValue::Int(v));
        }
        assert_eq!(p.from_unit(0.0), ParameterValue::Int(2));
        assert_eq!(p.from_unit(1.0), ParameterValue::Int(1000));
    }

    #[test]
    fn test_value_json_is_untagged() {
        let mut params = TrialParams::new();
        params.insert("a".into(), ParameterValue::Int(3));
        params.insert("b".into(), ParameterValue::Float(0.25));
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"a":3,"b":0.25}"#);
        let back: TrialParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
