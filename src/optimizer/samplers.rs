//! Sampling strategies for hyperparameter optimization
//!
//! Samplers see the completed trials as `(params, loss)` pairs where a
//! lower loss is better. The optimizer flips the sign for maximization.

use super::config::OptimizationConfig;
use super::search_space::{Parameter, SearchSpace, TrialParams};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, SQRT_2};

/// Type of sampler to use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SamplerType {
    /// Random sampling
    Random,
    /// Tree-structured Parzen Estimator
    TPE,
}

/// Trait for hyperparameter samplers
pub trait Sampler: Send + Sync {
    /// Sample the next set of hyperparameters
    fn sample(&mut self, search_space: &SearchSpace, history: &[(TrialParams, f64)]) -> TrialParams;
}

fn seeded(seed: Option<u64>) -> Xoshiro256PlusPlus {
    match seed {
        Some(s) => Xoshiro256PlusPlus::seed_from_u64(s),
        None => Xoshiro256PlusPlus::from_entropy(),
    }
}

/// Random sampler
#[derive(Debug)]
pub struct RandomSampler {
    rng: Xoshiro256PlusPlus,
}

impl RandomSampler {
    /// Create a new random sampler
    pub fn new(seed: Option<u64>) -> Self {
        Self { rng: seeded(seed) }
    }
}

impl Sampler for RandomSampler {
    fn sample(&mut self, search_space: &SearchSpace, _history: &[(TrialParams, f64)]) -> TrialParams {
        search_space.sample(&mut self.rng)
    }
}

/// Tree-structured Parzen Estimator sampler
///
/// Each parameter is modelled independently in `[0, 1]`. Completed trials
/// are split at the `gamma` quantile of the loss into a good set `l(x)` and
/// a bad set `g(x)`, each turned into a mixture of truncated Gaussians plus
/// a flat prior. Candidates are drawn from `l(x)` and the one maximizing
/// `l(x) / g(x)` is kept.
#[derive(Debug)]
pub struct TPESampler {
    rng: Xoshiro256PlusPlus,
    n_startup_trials: usize,
    gamma: f64,
    n_candidates: usize,
}

impl TPESampler {
    /// Create a new TPE sampler
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: seeded(seed),
            n_startup_trials: 10,
            gamma: 0.25,
            n_candidates: 24,
        }
    }

    /// Set number of startup trials
    pub fn with_n_startup(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    /// Set gamma (quantile for splitting good/bad)
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma.clamp(f64::EPSILON, 1.0);
        self
    }

    /// Set number of candidates drawn per parameter
    pub fn with_n_candidates(mut self, n: usize) -> Self {
        self.n_candidates = n.max(1);
        self
    }

    fn sample_parameter(&mut self, param: &Parameter, good: &[f64], bad: &[f64]) -> f64 {
        let l = ParzenEstimator::new(good);
        let g = ParzenEstimator::new(bad);

        let mut best_u = 0.5;
        let mut best_score = f64::NEG_INFINITY;
        for _ in 0..self.n_candidates {
            let u = l.sample(&mut self.rng);
            let score = l.log_pdf(u) - g.log_pdf(u);
            if score > best_score {
                best_score = score;
                best_u = u;
            }
        }
        // Snap to the parameter's grid so integers land on their bucket centre
        param.to_unit(&param.from_unit(best_u)).unwrap_or(best_u)
    }
}

impl Sampler for TPESampler {
    fn sample(&mut self, search_space: &SearchSpace, history: &[(TrialParams, f64)]) -> TrialParams {
        let finished: Vec<&(TrialParams, f64)> =
            history.iter().filter(|(_, loss)| loss.is_finite()).collect();

        // Use random sampling for startup trials
        if finished.len() < self.n_startup_trials.max(2) {
            return search_space.sample(&mut self.rng);
        }

        // Sort history by loss (ascending: best first)
        let mut sorted = finished;
        sorted.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        let n_good = ((sorted.len() as f64 * self.gamma).ceil() as usize).clamp(1, sorted.len() - 1);
        let (good_trials, bad_trials) = sorted.split_at(n_good);

        let mut params = TrialParams::new();
        for param in search_space.parameters() {
            let observe = |trials: &[&(TrialParams, f64)]| -> Vec<f64> {
                trials
                    .iter()
                    .filter_map(|(p, _)| p.get(&param.name).and_then(|v| param.to_unit(v)))
                    .collect()
            };
            let good = observe(good_trials);
            let bad = observe(bad_trials);
            let u = self.sample_parameter(param, &good, &bad);
            params.insert(param.name.clone(), param.from_unit(u));
        }
        params
    }
}

/// Mixture of Gaussians truncated to `[0, 1]` with a flat prior component
#[derive(Debug)]
struct ParzenEstimator {
    mus: Vec<f64>,
    sigmas: Vec<f64>,
}

const PRIOR_MU: f64 = 0.5;
const PRIOR_SIGMA: f64 = 1.0;

impl ParzenEstimator {
    fn new(observations: &[f64]) -> Self {
        let mut mus: Vec<f64> = observations.to_vec();
        mus.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        // Bandwidth: distance to the farther neighbour, bounded below by the
        // data density so repeated values do not collapse to a spike
        let min_sigma = 1.0 / ((mus.len() + 1) as f64).min(100.0);
        let mut sigmas: Vec<f64> = (0..mus.len())
            .map(|i| {
                let left = if i == 0 { mus[i] } else { mus[i] - mus[i - 1] };
                let right = if i + 1 == mus.len() { 1.0 - mus[i] } else { mus[i + 1] - mus[i] };
                left.max(right).clamp(min_sigma, PRIOR_SIGMA)
            })
            .collect();

        mus.push(PRIOR_MU);
        sigmas.push(PRIOR_SIGMA);
        Self { mus, sigmas }
    }

    fn sample(&self, rng: &mut impl Rng) -> f64 {
        let k = rng.gen_range(0..self.mus.len());
        let (mu, sigma) = (self.mus[k], self.sigmas[k]);
        for _ in 0..64 {
            let z = standard_normal(rng);
            let x = mu + sigma * z;
            if (0.0..=1.0).contains(&x) {
                return x;
            }
        }
        mu.clamp(0.0, 1.0)
    }

    fn log_pdf(&self, x: f64) -> f64 {
        let weight = 1.0 / self.mus.len() as f64;
        let density: f64 = self
            .mus
            .iter()
            .zip(self.sigmas.iter())
            .map(|(&mu, &sigma)| {
                let mass = normal_cdf((1.0 - mu) / sigma) - normal_cdf(-mu / sigma);
                let z = (x - mu) / sigma;
                weight * (-0.5 * z * z).exp() / (sigma * (2.0 * PI).sqrt() * mass.max(1e-12))
            })
            .sum();
        density.max(1e-300).ln()
    }
}

/// Box-Muller draw from N(0, 1)
fn standard_normal(rng: &mut impl Rng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / SQRT_2))
}

/// Abramowitz and Stegun 7.1.26, absolute error below 1.5e-7
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.3275911 * x);
    let poly = t
        * (0.254829592
            + t * (-0.284496736 + t * (1.421413741 + t * (-1.453152027 + t * 1.061405429))));
    sign * (1.0 - poly * (-x * x).exp())
}

/// Create the sampler described by an optimization config
pub fn create_sampler(config: &OptimizationConfig) -> Box<dyn Sampler> {
    match config.sampler {
        SamplerType::Random => Box::new(RandomSampler::new(config.random_state)),
        SamplerType::TPE => Box::new(
            TPESampler::new(config.random_state)
                .with_n_startup(config.n_startup_trials)
                .with_gamma(config.tpe_gamma)
                .with_n_candidates(config.tpe_candidates),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::ParameterValue;

    #[test]
    fn test_random_sampler() {
        let space = SearchSpace::new()
            .float("lr", 0.001, 0.1)
            .int("n", 10, 100);

        let mut sampler = RandomSampler::new(Some(42));
        let params = sampler.sample(&space, &[]);

        assert!(params.contains_key("lr"));
        assert!(params.contains_key("n"));
    }

    #[test]
    fn test_tpe_sampler_startup() {
        let space = SearchSpace::new().float("lr", 0.001, 0.1);
        let mut sampler = TPESampler::new(Some(42));

        // During startup, should just do random sampling
        for _ in 0..5 {
            let params = sampler.sample(&space, &[]);
            assert!(space.get("lr").unwrap().contains(&params["lr"]));
        }
    }

    #[test]
    fn test_tpe_concentrates_near_good_region() {
        let space = SearchSpace::new().float("x", 0.0, 1.0).int("k", 1, 10);

        // Loss is minimized at x = 0.2, k = 3
        let history: Vec<(TrialParams, f64)> = (0..40)
            .map(|i| {
                let x = (i as f64 * 0.618_034) % 1.0;
                let k = (i % 10) as i64 + 1;
                let mut params = TrialParams::new();
                params.insert("x".to_string(), ParameterValue::Float(x));
                params.insert("k".to_string(), ParameterValue::Int(k));
                let loss = (x - 0.2).powi(2) + ((k - 3) as f64).powi(2) * 0.01;
                (params, loss)
            })
            .collect();

        let mut sampler = TPESampler::new(Some(7));
        let n = 30;
        let mut mean_x = 0.0;
        for _ in 0..n {
            let params = sampler.sample(&space, &history);
            assert!(space.get("k").unwrap().contains(&params["k"]));
            mean_x += params["x"].as_float().unwrap() / n as f64;
        }
        assert!(mean_x < 0.45, "mean x = {}", mean_x);
    }

    #[test]
    fn test_parzen_density_integrates_to_one() {
        let est = ParzenEstimator::new(&[0.1, 0.15, 0.8]);
        let steps = 2000;
        let integral: f64 = (0..steps)
            .map(|i| est.log_pdf((i as f64 + 0.5) / steps as f64).exp() / steps as f64)
            .sum();
        assert!((integral - 1.0).abs() < 1e-2, "integral = {}", integral);
    }

    #[test]
    fn test_erf_reference_values() {
        assert!(erf(0.0).abs() < 1e-7);
        assert!((erf(1.0) - 0.842_700_79).abs() < 1e-6);
        assert!((erf(-1.0) + 0.842_700_79).abs() < 1e-6);
    }
}
