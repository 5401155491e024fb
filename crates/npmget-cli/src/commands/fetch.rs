//! Fetch command: resolve `latest`, download, and unpack.

use miette::Result;
use npmget_core::pkg::{fetch_latest, ExtractReport, PkgError, ResolvedPackage};
use npmget_core::Config;
use serde::Serialize;
use std::path::PathBuf;

/// Fetch result for JSON output.
#[derive(Serialize)]
struct FetchResult {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    package: Option<ResolvedPackage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    destination: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extract: Option<ExtractReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
}

#[derive(Serialize)]
struct ErrorInfo {
    code: &'static str,
    message: String,
}

/// Run the fetch command.
///
/// Errors are returned as diagnostics (printed to stderr, exit status 1). With
/// `--json` the error is written to stdout instead and the process exits 1.
pub fn run(config: &Config, package: &str, json: bool) -> Result<()> {
    match fetch_latest(config, package) {
        Ok(outcome) => {
            if json {
                let result = FetchResult {
                    ok: true,
                    package: Some(outcome.package),
                    destination: Some(outcome.destination),
                    extract: Some(outcome.extract),
                    error: None,
                };
                print_json(&result);
            } else {
                println!("{}", outcome.package.tarball_url);
                println!(
                    "{}@{}: {} files, {} directories, {} skipped -> {}",
                    outcome.package.name,
                    outcome.package.version,
                    outcome.extract.files,
                    outcome.extract.directories,
                    outcome.extract.skipped,
                    outcome.destination.display()
                );
            }
            Ok(())
        }
        Err(e) => {
            tracing::debug!(code = e.code(), "fetch failed");
            if json {
                report_json_error(&e);
                std::process::exit(1);
            }
            Err(miette::miette!(code = e.code(), "{e}"))
        }
    }
}

fn report_json_error(e: &PkgError) {
    let result = FetchResult {
        ok: false,
        package: None,
        destination: None,
        extract: None,
        error: Some(ErrorInfo {
            code: e.code(),
            message: e.message().to_string(),
        }),
    };
    print_json(&result);
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("error: failed to serialize result: {e}"),
    }
}
