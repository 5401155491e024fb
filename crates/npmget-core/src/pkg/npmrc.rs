//! `.npmrc` file parser for registry selection.
//!
//! Parses `.npmrc` files to extract:
//! - `registry=URL` for the default registry
//! - `@scope:registry=URL` directives for routing scoped packages
//!
//! Auth token lines are recognized and ignored.

use super::spec::PackageName;
use crate::config::parse_registry_url;
use std::collections::HashMap;
use std::path::Path;
use url::Url;

/// Parsed `.npmrc` configuration.
#[derive(Debug, Clone, Default)]
pub struct NpmrcConfig {
    /// Default registry (`registry=URL`).
    pub registry: Option<Url>,
    /// Scope → registry URL mapping (e.g., `@acme` → `https://npm.acme.dev/`).
    pub scoped_registries: HashMap<String, Url>,
}

impl NpmrcConfig {
    /// The registry configured for a package, if any.
    ///
    /// A scope mapping takes precedence over the default registry.
    #[must_use]
    pub fn registry_for(&self, name: &PackageName) -> Option<&Url> {
        name.scope
            .as_ref()
            .and_then(|scope| self.scoped_registries.get(&format!("@{scope}")))
            .or(self.registry.as_ref())
    }
}

/// Parse a single `.npmrc` file's content.
///
/// Ignores comments (`#`, `;`), blank lines, unknown keys, and values that
/// are not valid registry URLs.
#[must_use]
pub fn parse_npmrc(content: &str) -> NpmrcConfig {
    let mut config = NpmrcConfig::default();

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        // Parse @scope:registry=URL
        if key.starts_with('@') {
            if let Some((scope, "registry")) = key.split_once(':') {
                match parse_registry_url(value) {
                    Ok(url) => {
                        config.scoped_registries.insert(scope.to_string(), url);
                    }
                    Err(e) => tracing::warn!(scope, "ignoring .npmrc entry: {e}"),
                }
            }
            continue;
        }

        if key == "registry" {
            match parse_registry_url(value) {
                Ok(url) => config.registry = Some(url),
                Err(e) => tracing::warn!("ignoring .npmrc entry: {e}"),
            }
        }
    }

    config
}

/// Load and merge `.npmrc` files from a project directory.
///
/// Priority order (first wins, no overwrite):
/// 1. `project_dir/.npmrc`
/// 2. Parent directories up to filesystem root
/// 3. `$HOME/.npmrc`
#[must_use]
pub fn load_npmrc_files(project_dir: &Path) -> NpmrcConfig {
    load_npmrc_files_with_home(project_dir, dirs_next::home_dir().as_deref())
}

/// Same as [`load_npmrc_files`] with an explicit home directory.
#[must_use]
pub fn load_npmrc_files_with_home(project_dir: &Path, home: Option<&Path>) -> NpmrcConfig {
    let mut merged = NpmrcConfig::default();

    for dir in project_dir.ancestors() {
        merge_file(&mut merged, &dir.join(".npmrc"));
    }

    // Also check $HOME/.npmrc (may already be covered by the walk, but
    // handles cases where project_dir is not under HOME)
    if let Some(home) = home {
        merge_file(&mut merged, &home.join(".npmrc"));
    }

    merged
}

fn merge_file(target: &mut NpmrcConfig, path: &Path) {
    if !path.is_file() {
        return;
    }

    match std::fs::read_to_string(path) {
        Ok(content) => {
            tracing::debug!(path = %path.display(), "loaded .npmrc");
            merge_config(target, &parse_npmrc(&content));
        }
        Err(e) => tracing::warn!(path = %path.display(), "failed to read .npmrc: {e}"),
    }
}

/// Merge `source` into `target`, keeping existing entries (first wins).
fn merge_config(target: &mut NpmrcConfig, source: &NpmrcConfig) {
    if target.registry.is_none() {
        target.registry.clone_from(&source.registry);
    }
    for (scope, url) in &source.scoped_registries {
        target
            .scoped_registries
            .entry(scope.clone())
            .or_insert_with(|| url.clone());
    }
}
