//! Configuration for wikistream sessions.
//!
//! Layered loading (defaults, files, environment) via figment, plus
//! validation of the merged result.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    ClientConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, RetryConfig, SpanEventConfig,
    WikiStreamConfig,
};
pub use validation::validate_config;
