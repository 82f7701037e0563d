//! churnboost - Main Entry Point
//!
//! Bank-churn submission runner: `churnboost` predicts with fixed
//! hyperparameters, `churnboost --optimize` searches them first.

use clap::Parser;
use churnboost::cli::{cmd_run, Cli};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "churnboost=info".into()),
        )
        .init();

    let cli = Cli::parse();
    cmd_run(&cli)?;

    Ok(())
}
