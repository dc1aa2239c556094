//! Configuration module for the Relay runtime.
//!
//! Configuration is layered with figment: built-in defaults, TOML/YAML files,
//! `RELAY_*` environment variables and programmatic overrides.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{LogFormat, LogLevel, LogOutput, LoggingConfig, RelayConfig, SpanEventConfig};
pub use validation::validate_config;
