use thiserror::Error;

/// Configuration errors raised while resolving where to fetch from.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid registry URL '{url}': {source}")]
    InvalidRegistryUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Unsupported registry URL scheme '{scheme}' in '{url}' (expected http or https)")]
    UnsupportedScheme { url: String, scheme: String },

    #[error("Registry URL '{url}' cannot be used as a base URL")]
    NotABase { url: String },
}
