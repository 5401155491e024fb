//! Package fetching.
//!
//! Provides utilities for:
//! - Validating package names (including `@scope/name`)
//! - Fetching package metadata from an npm-compatible registry
//! - Resolving the `latest` dist-tag to a tarball URL
//! - Streaming a tarball download through gzip and tar into a directory
//! - Discovering the registry base URL from `.npmrc` files

pub mod error;
pub mod fetch;
pub mod npmrc;
pub mod registry;
pub mod spec;
pub mod tarball;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{codes as pkg_codes, PkgError};
pub use fetch::{fetch_latest, FetchOutcome};
pub use npmrc::{load_npmrc_files, parse_npmrc, NpmrcConfig};
pub use registry::{
    DistributionInfo, PackageMetadata, RegistryClient, ResolvedPackage, VersionRecord,
    DEFAULT_REGISTRY, LATEST_TAG, REGISTRY_ENV,
};
pub use spec::PackageName;
pub use tarball::{
    download_and_extract, extract_tgz, strip_wrapper, BareEntryPolicy, ExtractOptions,
    ExtractReport, DOWNLOAD_TIMEOUT_SECS, MAX_TARBALL_SIZE,
};
