//! npm registry client.

use super::error::PkgError;
use super::spec::PackageName;
use crate::config::parse_registry_url;
use crate::version::user_agent;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Default npm registry URL.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org/";

/// Environment variable to override registry URL.
pub const REGISTRY_ENV: &str = "NPMGET_NPM_REGISTRY";

/// The dist-tag that is resolved.
pub const LATEST_TAG: &str = "latest";

/// Connect timeout in seconds.
pub const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Package metadata document (the "packument").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: BTreeMap<String, String>,
    #[serde(default)]
    pub versions: BTreeMap<String, VersionRecord>,
}

/// One published version of a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(rename = "dist", default)]
    pub distribution: DistributionInfo,
}

/// Where a version's tarball lives.
///
/// `shasum` is carried through for reporting only; it is not verified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionInfo {
    #[serde(rename = "tarball", default)]
    pub tarball_url: String,
    #[serde(default)]
    pub shasum: String,
}

/// A version picked from the metadata, ready to download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPackage {
    pub name: String,
    pub version: String,
    pub tarball_url: String,
    pub shasum: String,
}

impl PackageMetadata {
    /// Look up the version a dist-tag points at.
    ///
    /// # Errors
    /// Returns an error if the tag is missing or points at a version that
    /// is not listed in `versions`.
    pub fn version_for_tag(&self, tag: &str) -> Result<(&str, &VersionRecord), PkgError> {
        let version = self.dist_tags.get(tag).ok_or_else(|| {
            PkgError::version_not_found(format!("{} has no '{tag}' dist-tag", self.name))
        })?;

        let record = self.versions.get(version).ok_or_else(|| {
            PkgError::version_not_found(format!(
                "{}: dist-tag '{tag}' points at {version}, which is not a published version",
                self.name
            ))
        })?;

        Ok((version.as_str(), record))
    }

    /// Resolve the `latest` dist-tag to a downloadable tarball.
    ///
    /// # Errors
    /// Returns an error if the tag or version is missing, or the version has
    /// no tarball URL.
    pub fn resolve_latest(&self) -> Result<ResolvedPackage, PkgError> {
        let (version, record) = self.version_for_tag(LATEST_TAG)?;
        let tarball_url = record.distribution.tarball_url.trim();

        if tarball_url.is_empty() {
            return Err(PkgError::version_not_found(format!(
                "{}@{version} has no tarball URL",
                self.name
            )));
        }

        Ok(ResolvedPackage {
            name: self.name.clone(),
            version: version.to_string(),
            tarball_url: tarball_url.to_string(),
            shasum: record.distribution.shasum.clone(),
        })
    }
}

/// Registry client for fetching package metadata.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: Url,
    http: Client,
}

impl RegistryClient {
    /// Create a new registry client with the given base URL and default timeouts.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be created.
    pub fn new(base_url: &str) -> Result<Self, PkgError> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    /// Create a new registry client with a custom request timeout.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be created.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, PkgError> {
        let base_url = parse_registry_url(base_url)?;

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(timeout)
            .user_agent(user_agent())
            .build()
            .map_err(|e| PkgError::registry(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { base_url, http })
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get the HTTP client (for reuse in tarball downloads).
    #[must_use]
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// URL of the metadata document for a package.
    ///
    /// # Errors
    /// Returns an error if the URL cannot be built.
    pub fn metadata_url(&self, name: &PackageName) -> Result<Url, PkgError> {
        self.base_url
            .join(&name.encoded())
            .map_err(|e| PkgError::registry(format!("Failed to build URL for '{name}': {e}")))
    }

    /// Fetch the metadata document for a package.
    ///
    /// # Errors
    /// Returns an error if the request fails, the registry answers with a
    /// non-success status, or the body is not package metadata.
    pub fn fetch_metadata(&self, name: &PackageName) -> Result<PackageMetadata, PkgError> {
        let url = self.metadata_url(name)?;
        tracing::debug!(url = %url, "fetching package metadata");

        let response = self
            .http
            .get(url.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PkgError::not_found(&name.name));
        }

        if !status.is_success() {
            return Err(PkgError::registry(format!(
                "Registry returned status {status} for '{name}'"
            )));
        }

        let body = response.bytes()?;
        let metadata: PackageMetadata = serde_json::from_slice(&body).map_err(|e| {
            PkgError::metadata_invalid(format!("Invalid metadata for '{name}': {e}"))
        })?;

        tracing::debug!(
            versions = metadata.versions.len(),
            tags = metadata.dist_tags.len(),
            "decoded package metadata"
        );

        Ok(metadata)
    }
}
