//! Resolve a package's `latest` version and unpack it.

use super::error::PkgError;
use super::registry::{RegistryClient, ResolvedPackage};
use super::spec::PackageName;
use super::tarball::{download_and_extract, ExtractReport};
use crate::config::Config;
use serde::Serialize;
use std::path::PathBuf;

/// Result of a successful fetch.
#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    pub package: ResolvedPackage,
    pub destination: PathBuf,
    pub extract: ExtractReport,
}

/// Fetch the `latest` version of `name` and extract it into the configured
/// output directory.
///
/// Runs metadata fetch, dist-tag lookup, download and extraction one after
/// another and stops at the first error. Nothing is written to disk until
/// the tarball download has started successfully.
///
/// # Errors
/// Returns the first error from any step.
pub fn fetch_latest(config: &Config, name: &str) -> Result<FetchOutcome, PkgError> {
    let name = PackageName::parse(name)?;
    let registry = config.registry_for(&name)?;

    let client = RegistryClient::with_timeout(registry.as_str(), config.timeout)?;
    tracing::info!(package = %name, registry = %client.base_url(), "resolving latest version");

    let metadata = client.fetch_metadata(&name)?;
    let package = metadata.resolve_latest()?;
    tracing::info!(
        package = %package.name,
        version = %package.version,
        shasum = %package.shasum,
        "resolved latest"
    );

    let destination = config.resolved_out_dir();
    let extract = download_and_extract(
        client.http(),
        &package.tarball_url,
        &destination,
        &config.extract_options(),
    )?;

    Ok(FetchOutcome {
        package,
        destination,
        extract,
    })
}
