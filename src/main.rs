use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use depscan::{scan, supported_manifest_filenames, ScanOptions, ScanResult};
use indicatif::{ProgressBar, ProgressStyle};
use tabled::{Table, Tabled};
use tracing_subscriber::EnvFilter;

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const VULNERABLE: u8 = 2;
}

#[derive(Parser)]
#[command(name = "depscan")]
#[command(
    author,
    version,
    about = "Scan project dependencies for known vulnerabilities"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a project directory or a single lockfile
    Scan {
        /// Project directory, or a standalone manifest/lockfile path
        path: PathBuf,

        /// Include dev and indirect dependencies
        #[arg(long)]
        include_dev: bool,

        /// Validate the lockfile with the package manager before scanning
        #[arg(long)]
        validate_lock: bool,

        /// Refresh the lockfile with the package manager before scanning
        #[arg(long)]
        refresh_lock: bool,

        /// Maximum concurrent advisory lookups
        #[arg(long, default_value_t = 10)]
        concurrency: usize,

        /// Path to an ignore-rule JSON file
        #[arg(long)]
        ignore_file: Option<PathBuf>,

        /// Output format (table, json)
        #[arg(short, long, value_enum, default_value_t = Format::Table)]
        format: Format,

        /// Exit non-zero when advisories remain after filtering
        #[arg(long)]
        fail_on_vulns: bool,
    },

    /// List the manifest and lockfile names depscan understands
    ListFormats,
}

#[derive(Clone, Copy, PartialEq, ValueEnum)]
enum Format {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

async fn run() -> Result<u8> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            path,
            include_dev,
            validate_lock,
            refresh_lock,
            concurrency,
            ignore_file,
            format,
            fail_on_vulns,
        } => {
            let opts = ScanOptions {
                include_dev,
                validate_lock,
                refresh_lock,
                concurrency,
                ignore_file_path: ignore_file,
                ..Default::default()
            };

            let spinner = if format == Format::Table {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} {msg}")
                        .unwrap(),
                );
                pb.enable_steady_tick(Duration::from_millis(100));
                pb.set_message("Scanning dependencies...");
                Some(pb)
            } else {
                None
            };

            let result = scan(&path, &opts).await;

            if let Some(pb) = spinner {
                pb.finish_and_clear();
            }

            let result = result?;
            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
                Format::Table => print_table(&result),
            }

            if fail_on_vulns && result.advisory_count() > 0 {
                Ok(exit_codes::VULNERABLE)
            } else {
                Ok(exit_codes::SUCCESS)
            }
        }
        Commands::ListFormats => {
            for name in supported_manifest_filenames() {
                println!("{name}");
            }
            Ok(exit_codes::SUCCESS)
        }
    }
}

#[derive(Tabled)]
struct AdvisoryRow {
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Advisory")]
    advisory: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Patched")]
    patched: String,
    #[tabled(rename = "Summary")]
    summary: String,
}

fn print_table(result: &ScanResult) {
    println!(
        "{}: {} dependencies scanned in {} ms",
        result.detection.name,
        result.deps.len(),
        result.scan_duration_ms
    );

    let mut rows = Vec::new();
    // Report in original detection order.
    for dep in &result.deps {
        let Some(advisories) = result.advisories_by_package.get(&dep.key()) else {
            continue;
        };
        for advisory in advisories {
            rows.push(AdvisoryRow {
                package: dep.key(),
                advisory: advisory.id.clone(),
                severity: advisory.severity.to_string(),
                patched: advisory
                    .first_patched_version
                    .clone()
                    .unwrap_or_else(|| "-".to_string()),
                summary: advisory.summary.clone().unwrap_or_default(),
            });
        }
    }

    if rows.is_empty() {
        println!("No known vulnerabilities found.");
    } else {
        println!("{}", Table::new(rows));
        println!("{} advisories found.", result.advisory_count());
    }

    if result.suppressed_count > 0 {
        println!("{} advisories suppressed by ignore rules.", result.suppressed_count);
    }
}
