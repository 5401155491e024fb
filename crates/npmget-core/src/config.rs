use crate::error::ConfigError;
use crate::pkg::npmrc::load_npmrc_files;
use crate::pkg::registry::{DEFAULT_REGISTRY, REQUEST_TIMEOUT_SECS};
use crate::pkg::spec::PackageName;
use crate::pkg::tarball::{
    BareEntryPolicy, ExtractOptions, DOWNLOAD_TIMEOUT_SECS, MAX_TARBALL_SIZE,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default output directory, relative to the working directory.
pub const DEFAULT_OUT_DIR: &str = "testing";

/// Runtime configuration for a fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory. Relative paths and `.npmrc` lookup start here.
    pub cwd: PathBuf,

    /// Explicit registry base URL. Takes precedence over `.npmrc`.
    pub registry: Option<String>,

    /// Directory the package contents are extracted into.
    pub out_dir: PathBuf,

    /// What to do with archive entries that have no wrapper directory.
    pub bare_entries: BareEntryPolicy,

    /// Timeout for the registry metadata request.
    pub timeout: Duration,

    /// Timeout for the tarball download, including extraction of the
    /// streamed body.
    pub download_timeout: Duration,

    /// Maximum compressed tarball size in bytes.
    pub max_tarball_size: u64,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new(cwd)
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            registry: None,
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            bare_entries: BareEntryPolicy::default(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            download_timeout: Duration::from_secs(DOWNLOAD_TIMEOUT_SECS),
            max_tarball_size: MAX_TARBALL_SIZE,
            json_logs: false,
            verbosity: 0,
        }
    }

    /// Set an explicit registry base URL.
    #[must_use]
    pub fn with_registry(mut self, registry: Option<String>) -> Self {
        self.registry = registry;
        self
    }

    /// Set the output directory.
    #[must_use]
    pub fn with_out_dir(mut self, out_dir: PathBuf) -> Self {
        self.out_dir = out_dir;
        self
    }

    /// Set the bare entry policy.
    #[must_use]
    pub fn with_bare_entries(mut self, policy: BareEntryPolicy) -> Self {
        self.bare_entries = policy;
        self
    }

    /// Set the metadata request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the tarball download timeout.
    #[must_use]
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Set the maximum tarball size.
    #[must_use]
    pub fn with_max_tarball_size(mut self, max: u64) -> Self {
        self.max_tarball_size = max;
        self
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// The output directory, anchored at `cwd` when relative.
    #[must_use]
    pub fn resolved_out_dir(&self) -> PathBuf {
        if self.out_dir.is_absolute() {
            self.out_dir.clone()
        } else {
            self.cwd.join(&self.out_dir)
        }
    }

    /// Extraction options derived from this config.
    #[must_use]
    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            bare_entries: self.bare_entries,
            max_bytes: self.max_tarball_size,
            timeout: self.download_timeout,
        }
    }

    /// Pick the registry base URL for a package.
    ///
    /// Order: explicit registry, `.npmrc` scope mapping, `.npmrc` default
    /// registry, then the public npm registry.
    pub fn registry_for(&self, name: &PackageName) -> Result<Url, ConfigError> {
        if let Some(explicit) = &self.registry {
            return parse_registry_url(explicit);
        }

        let npmrc = load_npmrc_files(&self.cwd);
        if let Some(url) = npmrc.registry_for(name) {
            return Ok(url.clone());
        }

        parse_registry_url(DEFAULT_REGISTRY)
    }
}

/// Parse and normalize a registry base URL.
///
/// The result always ends in `/` so that joining a package name appends a
/// path segment instead of replacing the last one.
pub fn parse_registry_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };

    let url = Url::parse(&with_slash).map_err(|source| ConfigError::InvalidRegistryUrl {
        url: trimmed.to_string(),
        source,
    })?;

    if url.cannot_be_a_base() {
        return Err(ConfigError::NotABase {
            url: trimmed.to_string(),
        });
    }

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme {
            url: trimmed.to_string(),
            scheme: other.to_string(),
        }),
    }
}
