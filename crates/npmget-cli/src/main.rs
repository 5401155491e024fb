#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_pass_by_value)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use npmget_core::config::DEFAULT_OUT_DIR;
use npmget_core::pkg::{BareEntryPolicy, DOWNLOAD_TIMEOUT_SECS, MAX_TARBALL_SIZE, REGISTRY_ENV};
use npmget_core::Config;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "npmget")]
#[command(author, version, about = "Download and unpack the latest release of an npm package", long_about = None)]
struct Cli {
    /// Package name (e.g., "express" or "@types/node")
    package: String,

    /// Directory to extract into
    #[arg(default_value = DEFAULT_OUT_DIR)]
    output_dir: PathBuf,

    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long)]
    json: bool,

    /// Override the working directory
    #[arg(long, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Registry base URL (defaults to .npmrc, then the public npm registry)
    #[arg(long, value_name = "URL", env = REGISTRY_ENV)]
    registry: Option<String>,

    /// Reject top-level files outside the package directory instead of skipping them
    #[arg(long)]
    strict: bool,

    /// Registry metadata request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 15)]
    timeout: u64,

    /// Tarball download and extraction timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = DOWNLOAD_TIMEOUT_SECS)]
    download_timeout: u64,

    /// Maximum compressed tarball size in bytes
    #[arg(long, value_name = "BYTES", default_value_t = MAX_TARBALL_SIZE)]
    max_size: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine working directory
    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let bare_entries = if cli.strict {
        BareEntryPolicy::Reject
    } else {
        BareEntryPolicy::Skip
    };

    let config = Config::new(cwd)
        .with_registry(cli.registry)
        .with_out_dir(cli.output_dir)
        .with_bare_entries(bare_entries)
        .with_timeout(Duration::from_secs(cli.timeout))
        .with_download_timeout(Duration::from_secs(cli.download_timeout))
        .with_max_tarball_size(cli.max_size)
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);

    let _span = tracing::info_span!("fetch", package = %cli.package).entered();
    commands::fetch::run(&config, &cli.package, cli.json)
}
