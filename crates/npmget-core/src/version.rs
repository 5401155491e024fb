/// The current version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User agent sent with every registry and tarball request.
#[must_use]
pub fn user_agent() -> String {
    match option_env!("NPMGET_BUILD_GIT_HASH") {
        Some(hash) => format!("npmget/{VERSION} ({hash})"),
        None => format!("npmget/{VERSION}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_not_empty() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_user_agent_contains_version() {
        let ua = user_agent();
        assert!(ua.starts_with("npmget/"));
        assert!(ua.contains(VERSION));
    }
}
