//! `pvscan` — command-line driver for `provenance-core`.
//!
//! Calls straight into the core with no server in between, the way `cs` calls
//! straight into `codescope-core`. The in-memory gateway this binary loads from
//! a JSON fixture stands in for the real content-addressed index (§1 of the
//! spec treats the store as an external collaborator).

use clap::{Parser, Subcommand};
use provenance_core::{MemoryGateway, ScanConfig, ScanDriver, ScanResult};
use std::path::PathBuf;

/// Scan files against a provenance index and report component attributions.
#[derive(Parser)]
#[command(name = "pvscan", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print results as JSON instead of a short human summary
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a file, a directory, or a WFP manifest against a loaded index
    Scan {
        /// Target file, directory, or WFP manifest
        target: PathBuf,

        /// Path to a JSON index fixture (components/files/snippets); an empty
        /// in-memory index is used if omitted
        #[arg(long)]
        index: Option<PathBuf>,

        /// Treat `target` as a precomputed WFP manifest instead of raw source
        #[arg(long)]
        wfp: bool,

        /// Maximum matches retained per target
        #[arg(long, default_value = "10")]
        scan_limit: usize,

        /// Comma-separated component names already declared in the caller's SBOM
        #[arg(long, default_value = "")]
        sbom: String,

        /// Comma-separated component names to suppress entirely
        #[arg(long, default_value = "")]
        blacklist: String,

        /// Comma-separated path substrings; matched files under any of these are skipped
        #[arg(long, default_value = "")]
        blacklist_paths: String,
    },
    /// Validate a JSON index fixture without scanning anything
    LoadIndex {
        /// Path to a JSON index fixture
        index: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("provenance=warn".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { target, index, wfp, scan_limit, sbom, blacklist, blacklist_paths } => {
            run_scan(target, index, wfp, scan_limit, sbom, blacklist, blacklist_paths, cli.json)
        }
        Commands::LoadIndex { index } => run_load_index(index),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_scan(
    target: PathBuf,
    index: Option<PathBuf>,
    wfp: bool,
    scan_limit: usize,
    sbom: String,
    blacklist: String,
    blacklist_paths: String,
    json: bool,
) {
    let gateway = match index {
        Some(path) => match MemoryGateway::from_fixture_json(&path) {
            Ok(gw) => gw,
            Err(e) => {
                eprintln!("Could not load index {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => MemoryGateway::new(),
    };

    let config = ScanConfig {
        scan_limit,
        sbom,
        blacklisted_assets: blacklist,
        blacklisted_paths: blacklist_paths,
        ..ScanConfig::default()
    };
    let mut driver = ScanDriver::new(&gateway, config);

    let results: Vec<ScanResult> = if wfp {
        match driver.scan_wfp_manifest(&target) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Could not read manifest {}: {e}", target.display());
                std::process::exit(1);
            }
        }
    } else if target.is_dir() {
        driver.scan_dir(&target)
    } else {
        match driver.scan_file(&target) {
            Ok(r) => vec![r],
            Err(e) => {
                eprintln!("Could not read target {}: {e}", target.display());
                std::process::exit(1);
            }
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&results).unwrap());
        return;
    }

    let mut any_match = false;
    for result in &results {
        if result.matches.is_empty() {
            println!("{}: no match", result.file_path);
            continue;
        }
        any_match = true;
        println!("{}: {:?} ({} match{})", result.file_path, result.match_type, result.matches.len(), if result.matches.len() == 1 { "" } else { "es" });
        for m in &result.matches {
            println!(
                "  {}/{} {}..{}  {}%  {} (lines {}, oss {})",
                m.vendor, m.component, m.version, m.latest_version, m.matched_percent, m.file_path, m.lines, m.oss_lines
            );
        }
    }

    if !any_match {
        std::process::exit(1);
    }
}

fn run_load_index(index: PathBuf) {
    match MemoryGateway::from_fixture_json(&index) {
        Ok(_) => println!("{}: index loads cleanly", index.display()),
        Err(e) => {
            eprintln!("{}: {e}", index.display());
            std::process::exit(1);
        }
    }
}
