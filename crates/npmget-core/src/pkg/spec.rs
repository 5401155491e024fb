//! Package name parsing.
//!
//! Accepts plain names like `react` and scoped names like `@types/node`.
//! Version ranges are not accepted; only the `latest` dist-tag is fetched.

use super::error::PkgError;
use std::fmt;

/// Maximum length of a package name on the npm registry.
pub const MAX_NAME_LENGTH: usize = 214;

/// A validated package name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageName {
    /// Full package name (e.g., "@scope/name" or "name").
    pub name: String,
    /// Scope without the @ prefix, if scoped.
    pub scope: Option<String>,
}

impl PackageName {
    /// Parse and validate a package name.
    ///
    /// # Errors
    /// Returns an error if the name is empty, too long, or contains
    /// characters that cannot appear in a registry path.
    pub fn parse(input: &str) -> Result<Self, PkgError> {
        let input = input.trim();

        if input.is_empty() {
            return Err(PkgError::spec_invalid("Empty package name"));
        }

        if input.len() > MAX_NAME_LENGTH {
            return Err(PkgError::spec_invalid(format!(
                "Package name is longer than {MAX_NAME_LENGTH} characters"
            )));
        }

        if input.chars().any(|c| c.is_whitespace() || c == '\\') {
            return Err(PkgError::spec_invalid(format!(
                "Invalid package name '{input}': contains whitespace or backslash"
            )));
        }

        if input.starts_with('@') {
            Self::parse_scoped(input)
        } else {
            Self::parse_unscoped(input)
        }
    }

    fn parse_scoped(input: &str) -> Result<Self, PkgError> {
        let Some((scope, name)) = input[1..].split_once('/') else {
            return Err(PkgError::spec_invalid(format!(
                "Invalid scoped package: missing '/' in '{input}'"
            )));
        };

        if scope.is_empty() {
            return Err(PkgError::spec_invalid(format!(
                "Invalid scoped package: empty scope in '{input}'"
            )));
        }

        if name.is_empty() {
            return Err(PkgError::spec_invalid(format!(
                "Invalid scoped package: empty name in '{input}'"
            )));
        }

        check_segment(input, scope)?;
        check_segment(input, name)?;

        Ok(Self {
            name: input.to_string(),
            scope: Some(scope.to_string()),
        })
    }

    fn parse_unscoped(input: &str) -> Result<Self, PkgError> {
        check_segment(input, input)?;

        Ok(Self {
            name: input.to_string(),
            scope: None,
        })
    }

    /// The name as it appears in a registry URL path.
    ///
    /// The scope separator is percent-encoded so the whole name stays a
    /// single path segment.
    #[must_use]
    pub fn encoded(&self) -> String {
        if self.scope.is_some() {
            self.name.replace('/', "%2F")
        } else {
            self.name.clone()
        }
    }

    /// Returns true for `@scope/name` packages.
    #[must_use]
    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }
}

fn check_segment(input: &str, segment: &str) -> Result<(), PkgError> {
    if segment.contains('/') {
        return Err(PkgError::spec_invalid(format!(
            "Invalid package name '{input}': unexpected '/'"
        )));
    }

    if segment.starts_with('.') || segment.starts_with('_') {
        return Err(PkgError::spec_invalid(format!(
            "Invalid package name '{input}': cannot start with '.' or '_'"
        )));
    }

    if segment.contains('@') || segment.contains('%') {
        return Err(PkgError::spec_invalid(format!(
            "Invalid package name '{input}': version ranges and encoded names are not supported"
        )));
    }

    if let Some(c) = segment.chars().find(|c| !is_url_safe(*c)) {
        return Err(PkgError::spec_invalid(format!(
            "Invalid package name '{input}': '{c}' is not a URL-safe character"
        )));
    }

    Ok(())
}

/// Characters a URL component encoder leaves untouched. Anything else would
/// be read as URL syntax (`?`, `#`, `:`) or need escaping.
fn is_url_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '!' | '~' | '*' | '\'' | '(' | ')')
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
