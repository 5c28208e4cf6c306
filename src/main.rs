//! mapdfn command line entry point.

use std::path::PathBuf;
use std::{process, str::FromStr};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, error, info};

use mapdfn::io::{read_config, read_network};
use mapdfn::mapdfn_ecpm;

/// Map a discrete fracture network onto an ECPM grid.
#[derive(Debug, Parser)]
#[command(name = "mapdfn", version, about)]
struct Args {
    /// Fracture network (JSON)
    #[arg(short, long)]
    network: PathBuf,

    /// ECPM job configuration (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Job directory; overrides the one in the configuration
    #[arg(short, long)]
    jobname: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn run(args: &Args) -> Result<()> {
    let network = read_network(&args.network)
        .with_context(|| format!("Failed to load network: {}", args.network.display()))?;
    let mut config = read_config(&args.config)
        .with_context(|| format!("Failed to load configuration: {}", args.config.display()))?;
    if let Some(jobname) = &args.jobname {
        config = config.with_jobname(jobname);
    }

    let report = mapdfn_ecpm(&network, &config).context("ECPM mapping failed")?;

    println!(
        "Mapped {} fractures onto {} x {} x {} cells ({} fractured)",
        network.len() - report.skipped.len(),
        report.dims[0],
        report.dims[1],
        report.dims[2],
        report.fractured_cells
    );
    if !report.skipped.is_empty() {
        println!("Skipped fractures: {:?}", report.skipped);
    }
    for (name, path) in report.artifacts.iter() {
        println!("  {name:<14} {}", path.display());
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    let log_level = LevelFilter::from_str(&args.log_level).unwrap_or_else(|_| {
        eprintln!(
            "Invalid log level: {}. Using 'info' instead.",
            args.log_level
        );
        LevelFilter::Info
    });
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();

    debug!(args:?; "Parsed arguments");

    if let Err(err) = run(&args) {
        error!("{err:#}");
        process::exit(1);
    }

    info!("Completed successfully");
}
