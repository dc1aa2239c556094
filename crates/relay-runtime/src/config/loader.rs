//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config`: enables TOML configuration files (`relay.toml`, `config.toml`)
//! - `yaml-config`: enables YAML configuration files (`relay.yaml`, `relay.yml`, etc.)
//!
//! Both features can be enabled simultaneously; if so, both file formats are
//! searched and loaded.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific config file (`relay.{profile}.toml` / `relay.{profile}.yaml`)
//! 3. Main config file (`relay.toml` / `relay.yaml`)
//! 4. Environment variables (`RELAY_*`)
//! 5. Programmatic overrides
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `RELAY_` prefix with `__` as separator:
//!
//! - `RELAY_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `RELAY_BOT__THREADPOOL_NUM_WORKERS=4` → `bot.threadpool_num_workers = 4`
//! - `RELAY_BOT__PLUGINS__GREETER__GREETING=ahoy` → `bot.plugins.greeter.greeting = "ahoy"`
//!
//! # Example
//!
//! ```rust,ignore
//! use relay_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/relay.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::RelayConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "RELAY_";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `RELAY_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var("RELAY_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Profile::parse(&profile.into());
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        if let Ok(cwd) = std::env::current_dir() {
            self.search_path(cwd)
        } else {
            self
        }
    }

    /// Adds `<user config dir>/relay` to the search paths.
    pub fn with_user_config_dir(self) -> Self {
        if let Some(config_dir) = dirs::config_dir() {
            self.search_path(config_dir.join("relay"))
        } else {
            self
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges configuration programmatically, over every other source.
    pub fn merge(mut self, config: RelayConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads, validates and returns the configuration.
    pub fn load(self) -> ConfigResult<RelayConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: RelayConfig = figment.extract()?;
        validate_config(&config)?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            plugins = config.bot.plugins.len(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(RelayConfig::default()));

        if let Some(path) = self.config_file.take() {
            if path.exists() {
                info!(path = %path.display(), "Loading configuration file");
                figment = Self::merge_config_file(figment, &path)?;
            } else {
                return Err(ConfigError::FileNotFound(path));
            }
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        // Programmatic overrides win over files and environment.
        let user_figment = std::mem::take(&mut self.figment);
        Ok(figment.merge(user_figment))
    }

    /// Merges a single config file, dispatching on its extension.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::UnsupportedFormat(ext.to_owned())),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if self.search_paths.is_empty() {
            let mut paths = Vec::new();
            if let Ok(cwd) = std::env::current_dir() {
                paths.push(cwd);
            }
            if let Some(config_dir) = dirs::config_dir() {
                paths.push(config_dir.join("relay"));
            }
            paths
        } else {
            self.search_paths.clone()
        }
    }

    /// Searches `search_paths × base_names`, merging a profile-specific
    /// variant before its base file. Stops at the first base file found.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for search_path in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path =
                    search_path.join(format!("{stem}.{}.{ext}", self.profile.as_str()));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = merge_fn(figment, &profile_path);
                }

                let base_path = search_path.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    figment = merge_fn(figment, &base_path);
                    return (figment, true);
                }
            }
        }
        (figment, false)
    }

    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["relay.toml", "config.toml"],
                |fig, path| fig.merge(Toml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["relay.yaml", "relay.yml", "config.yaml", "config.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            warn!(paths = ?search_paths, "No configuration file found, using defaults");
        }
        figment
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<RelayConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from `path`, with environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<RelayConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;
    use crate::config::schema::LogLevel;

    fn load(loader: ConfigLoader) -> figment::error::Result<RelayConfig> {
        loader.load().map_err(|e| e.to_string().into())
    }

    #[test]
    fn test_default_config() {
        Jail::expect_with(|jail| {
            let config = load(ConfigLoader::new().search_path(jail.directory()).without_env())?;
            assert_eq!(config, RelayConfig::default());
            assert_eq!(config.logging.level.as_str(), "info");
            assert_eq!(config.bot.threadpool_num_workers, 10);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides() {
        Jail::expect_with(|jail| {
            jail.set_env("RELAY_LOGGING__LEVEL", "debug");
            jail.set_env("RELAY_BOT__THREADPOOL_NUM_WORKERS", "4");
            jail.set_env("RELAY_BOT__RESPOND_CHANNEL_HELP", "true");

            let config = load(ConfigLoader::new().search_path(jail.directory()))?;
            assert_eq!(config.logging.level, LogLevel::Debug);
            assert_eq!(config.bot.threadpool_num_workers, 4);
            assert!(config.bot.respond_channel_help);
            Ok(())
        });
    }

    #[test]
    fn test_programmatic_merge_wins() {
        Jail::expect_with(|jail| {
            jail.set_env("RELAY_BOT__THREADPOOL_NUM_WORKERS", "4");

            let mut overrides = RelayConfig::default();
            overrides.bot.threadpool_num_workers = 2;
            let config = load(
                ConfigLoader::new()
                    .search_path(jail.directory())
                    .merge(overrides),
            )?;
            assert_eq!(config.bot.threadpool_num_workers, 2);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("RELAY_BOT__THREADPOOL_NUM_WORKERS", "0");
            let result = ConfigLoader::new().search_path(jail.directory()).load();
            assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
            Ok(())
        });
    }

    #[test]
    fn test_missing_file() {
        Jail::expect_with(|jail| {
            let missing = jail.directory().join("nope.toml");
            let result = ConfigLoader::new().file(&missing).without_env().load();
            assert!(matches!(result, Err(ConfigError::FileNotFound(p)) if p == missing));
            Ok(())
        });
    }

    #[test]
    fn test_profile_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("RELAY_PROFILE", "prod");
            assert_eq!(Profile::from_env(), Profile::Production);
            jail.set_env("RELAY_PROFILE", "Staging");
            assert_eq!(Profile::from_env(), Profile::Custom("staging".into()));
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_toml_file_with_profile() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "relay.toml",
                r#"
                [bot]
                ignore_users = ["announcements"]

                [bot.plugins.Greeter]
                greeting = "ahoy"

                [logging]
                level = "warn"
                format = "pretty"
                "#,
            )?;
            jail.create_file(
                "relay.production.toml",
                r#"
                [bot]
                threadpool_num_workers = 32
                "#,
            )?;

            let config = load(
                ConfigLoader::new()
                    .profile("production")
                    .search_path(jail.directory())
                    .without_env(),
            )?;
            assert_eq!(config.bot.ignore_users, vec!["announcements".to_owned()]);
            assert_eq!(config.bot.threadpool_num_workers, 32);
            assert_eq!(
                config.bot.plugin_section("Greeter"),
                Some(&serde_json::json!({ "greeting": "ahoy" }))
            );
            assert_eq!(config.logging.level, LogLevel::Warn);
            Ok(())
        });
    }
}
