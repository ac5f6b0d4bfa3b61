//! bbpi CLI
//!
//! Sums the BBP series and prints three lines on stdout: the approximation,
//! `f64::consts::PI`, and whether the two are exactly equal. Logs go to
//! stderr.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use bbp_core::{Comparison, ConfigError, ReportConfig, RunConfig, Stats, approximate, pool};
use clap::Parser as ClapParser;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(ClapParser, Debug)]
#[command(name = "bbpi")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Approximate pi with the Bailey-Borwein-Plouffe series", long_about = None)]
struct Cli {
    /// Number of series terms to sum (zero or negative sums nothing)
    #[arg(short = 'n', long, allow_negative_numbers = true)]
    iterations: Option<i64>,

    /// Worker threads; 0 sums directly on the main thread
    #[arg(short, long)]
    workers: Option<usize>,

    /// Terms per job handed to a worker
    #[arg(long)]
    term_size: Option<u64>,

    /// Keep the job size fixed instead of shrinking it after slow jobs
    #[arg(long)]
    fixed_term_size: bool,

    /// TOML run configuration; flags given here override it
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Statistics report: 1, json or json:<path> (overrides BBPI_REPORT)
    #[arg(long, value_name = "SPEC")]
    report: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    debug!("Using config: {:?}", config);

    let report = match &cli.report {
        Some(value) => ReportConfig::parse(value),
        None => ReportConfig::from_env(),
    };

    let (approximation, stats) = if config.uses_pool() {
        match pool::run(&config) {
            Ok(outcome) => (outcome.approximation, Some(outcome.stats)),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    } else {
        (approximate(config.iterations), None)
    };

    let mut stdout = io::stdout().lock();
    let printed = Comparison::against_pi(approximation)
        .write_to(&mut stdout)
        .and_then(|_| stdout.flush());
    if let Err(e) = printed {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }

    if let Some(report) = report {
        let stats = stats.unwrap_or_else(|| Stats::direct(config.total_terms(), approximation));
        if let Err(e) = report.emit(&stats) {
            error!("{}", e);
        }
    }
}

/// Defaults, then the config file, then command-line flags
fn resolve_config(cli: &Cli) -> Result<RunConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::default(),
    };

    if let Some(iterations) = cli.iterations {
        config = config.with_iterations(iterations);
    }
    if let Some(workers) = cli.workers {
        config = config.with_workers(workers);
    }
    if let Some(term_size) = cli.term_size {
        config = config.with_term_size(term_size);
    }
    if cli.fixed_term_size {
        config = config.with_reduce_term_size(false);
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("bbpi").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_no_flags_is_default_run() {
        let config = resolve_config(&parse(&[])).unwrap();
        assert_eq!(config, RunConfig::default());
        assert!(!config.uses_pool());
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = resolve_config(&parse(&[
            "-n",
            "500",
            "--workers",
            "3",
            "--term-size",
            "50",
            "--fixed-term-size",
        ]))
        .unwrap();
        assert_eq!(config.iterations, 500);
        assert_eq!(config.workers, 3);
        assert_eq!(config.term_size, 50);
        assert!(!config.reduce_term_size);
    }

    #[test]
    fn test_negative_iterations_accepted() {
        let config = resolve_config(&parse(&["--iterations", "-7"])).unwrap();
        assert_eq!(config.iterations, -7);
        assert_eq!(config.total_terms(), 0);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "iterations = 20\nworkers = 2\nterm_size = 4\n").unwrap();

        let cli = parse(&["--config", path.to_str().unwrap(), "--workers", "5"]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.iterations, 20);
        assert_eq!(config.workers, 5);
        assert_eq!(config.term_size, 4);
    }

    #[test]
    fn test_invalid_term_size_flag() {
        let err = resolve_config(&parse(&["--term-size", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
