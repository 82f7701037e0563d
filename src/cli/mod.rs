//! Command-line interface
//!
//! One command with an `--optimize` switch. Progress is logged through
//! `tracing`; the final summary is printed as a box on stdout.

use clap::Parser;
use colored::*;
use std::path::PathBuf;

use crate::config::RunConfig;
use crate::runner::{run, RunMode, RunReport};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(&format!("{:<12}", key)), val.white())
}

fn step_run(msg: &str) {
    println!("  {} {}...", accent("›"), msg);
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "churnboost")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bank-churn voting ensemble with optional hyperparameter search")]
#[command(long_about = None)]
pub struct Cli {
    /// Run the hyperparameter search before predicting
    #[arg(long)]
    pub optimize: bool,

    /// JSON run configuration; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory with train.csv and test.csv
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Submission CSV to write
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Where to save the search study
    #[arg(long)]
    pub study: Option<PathBuf>,

    /// Saved study whose best trial supplies the hyperparameters
    #[arg(long)]
    pub params: Option<PathBuf>,

    /// Number of stratified folds
    #[arg(long)]
    pub folds: Option<usize>,

    /// Number of search trials
    #[arg(long)]
    pub trials: Option<usize>,

    /// Search time limit in seconds
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Random seed for models and sampler
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Cli {
    pub fn mode(&self) -> RunMode {
        if self.optimize {
            RunMode::Optimize
        } else {
            RunMode::Predict
        }
    }

    /// Config file (or defaults) with the command-line overrides applied
    pub fn run_config(&self) -> anyhow::Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)?,
            None => RunConfig::default(),
        };
        if let Some(dir) = &self.data_dir {
            config = config.with_data_dir(dir);
        }
        if let Some(path) = &self.output {
            config = config.with_output(path);
        }
        if let Some(path) = &self.study {
            config = config.with_study_path(path);
        }
        if let Some(path) = &self.params {
            config = config.with_params_path(path);
        }
        if let Some(n) = self.folds {
            config = config.with_n_folds(n);
        }
        if let Some(n) = self.trials {
            config = config.with_n_trials(n);
        }
        if let Some(t) = self.timeout {
            config = config.with_timeout(t);
        }
        if let Some(seed) = self.seed {
            config = config.with_random_state(seed);
        }
        config.validate()?;
        Ok(config)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

/// Execute the run selected on the command line
pub fn cmd_run(cli: &Cli) -> anyhow::Result<RunReport> {
    let config = cli.run_config()?;
    let mode = cli.mode();

    match mode {
        RunMode::Optimize => step_run(&format!(
            "Searching {} trials over {} folds",
            config.optimization.n_trials, config.n_folds
        )),
        RunMode::Predict => step_run(&format!("Training over {} folds", config.n_folds)),
    }

    let report = run(&config, mode)?;
    step_ok(&format!("Submission written to {}", report.output.display()));
    print_report(&report);
    Ok(report)
}

fn print_report(report: &RunReport) {
    let mode = match report.mode {
        RunMode::Predict => "predict",
        RunMode::Optimize => "optimize",
    };

    println!();
    line_box_top();
    line_box(&kv("Mode", mode));
    line_box(&kv("Features", &report.n_features.to_string()));
    line_box(&kv("Test rows", &report.n_test.to_string()));
    if let Some((trial, auc)) = report.best_trial {
        line_box(&kv("Best trial", &format!("#{} (AUC {:.5})", trial, auc)));
    }
    line_box_sep();
    for fold in &report.folds {
        line_box(&kv(
            &format!("Fold {}", fold.fold),
            &format!("AUC {:.5}   acc {:.4}   logloss {:.4}", fold.auc, fold.accuracy, fold.log_loss),
        ));
    }
    line_box_sep();
    line_box(&format!(
        "{} {}",
        muted(&format!("{:<12}", "Mean AUC")),
        format!("{:.5} ± {:.5}", report.mean_auc, report.std_auc).white().bold()
    ));
    line_box(&kv("Time", &format!("{:.1}s", report.elapsed_secs)));
    line_box_bottom();
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::parse_from(["churnboost"]);
        assert_eq!(cli.mode(), RunMode::Predict);
        let config = cli.run_config().unwrap();
        assert_eq!(config.n_folds, 5);
        assert_eq!(config.data_dir, PathBuf::from("./data"));
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "churnboost",
            "--optimize",
            "--data-dir",
            "in",
            "--folds",
            "3",
            "--trials",
            "20",
            "--seed",
            "11",
        ]);
        assert_eq!(cli.mode(), RunMode::Optimize);
        let config = cli.run_config().unwrap();
        assert_eq!(config.data_dir, PathBuf::from("in"));
        assert_eq!(config.n_folds, 3);
        assert_eq!(config.optimization.n_trials, 20);
        assert_eq!(config.random_state, 11);
    }

    #[test]
    fn test_invalid_folds_rejected() {
        let cli = Cli::parse_from(["churnboost", "--folds", "1"]);
        assert!(cli.run_config().is_err());
    }

    #[test]
    fn test_strip_ansi() {
        let s = format!("{}", "abc".truecolor(1, 2, 3));
        assert_eq!(strip_ansi(&s), "abc");
    }
}
