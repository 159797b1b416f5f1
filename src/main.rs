//! needlefix - Volume index reconstruction
//!
//! Rebuilds the `.idx` file of each given volume by replaying its `.dat` log.

use clap::Parser;
use colored::Colorize;
use needlefix_core::{BatchReport, FixConfig, Fixer, VolumeOutcome, CONFIG_ENV};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "needlefix")]
#[command(about = "Rebuild volume index files from their data files")]
#[command(version)]
struct Cli {
    /// Volume data files, e.g. /data/pics_3.dat
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// YAML config file
    #[arg(short, long, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Stop at the first volume that fails
    #[arg(long)]
    fail_fast: bool,

    /// Skip fsync of written index files
    #[arg(long)]
    no_fsync: bool,

    /// Print the batch report as JSON
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            return ExitCode::from(2);
        }
    };
    if cli.fail_fast {
        config.fail_fast = true;
    }
    if cli.no_fsync {
        config.fsync = false;
    }
    tracing::debug!("Using {:?}", config);

    let report = Fixer::new(config).run(&cli.paths);

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("{}: failed to encode report: {}", "Error".red(), e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_report(&report);
    }

    if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn load_config(cli: &Cli) -> Result<FixConfig, needlefix_core::ConfigError> {
    // clap already folded NEEDLEFIX_CONFIG into --config
    match &cli.config {
        Some(path) => {
            let mut config = FixConfig::from_file(path)?;
            config.apply_env_overrides();
            tracing::info!("Loaded config from {}", path.display());
            Ok(config)
        }
        None => FixConfig::load(),
    }
}

fn print_report(report: &BatchReport) {
    for outcome in &report.outcomes {
        match outcome {
            VolumeOutcome::Rebuilt { path, summary } => println!(
                "{} {} -> {} ({} live needles, {} bytes)",
                "Rebuilt".green(),
                path.display(),
                summary.index_path.display(),
                summary.live_needles,
                summary.live_bytes
            ),
            VolumeOutcome::Skipped { path, reason } => {
                println!("{} {}: {}", "Skipped".yellow(), path.display(), reason)
            }
            VolumeOutcome::Failed { path, error } => {
                println!("{} {}: {}", "Failed".red(), path.display(), error)
            }
            VolumeOutcome::NotAttempted { path } => {
                println!("{} {}", "Not attempted".dimmed(), path.display())
            }
        }
    }

    let summary = format!(
        "{} rebuilt, {} skipped, {} failed, {} not attempted",
        report.rebuilt(),
        report.skipped(),
        report.failed(),
        report.not_attempted()
    );
    if report.has_failures() {
        println!("{}", summary.red());
        for path in report.failed_paths() {
            println!("  {}", path.display());
        }
    } else {
        println!("{}", summary.green());
    }
}
