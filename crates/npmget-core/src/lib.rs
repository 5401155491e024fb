#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod config;
pub mod error;
pub mod pkg;
pub mod version;

pub use config::Config;
pub use error::ConfigError;
pub use pkg::{fetch_latest, FetchOutcome, PkgError};
pub use version::VERSION;
