//! Engine configuration.
//!
//! [`QueryConfig`] is read from the `[query]` section of `config/config.toml` (optional)
//! layered with `PARTQUERY__QUERY__*` environment variables, e.g.
//! `PARTQUERY__QUERY__STRICT_SINGLE_RESULT=true`.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_CONFIG_FILE: &str = "config/config.toml";
const ENV_PREFIX: &str = "PARTQUERY";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryConfig {
    /// Log compiled SQL and the number of bound tags at `info` before dispatch
    #[serde(default)]
    pub log_statements: bool,
    /// Fail single-result methods that match more than one row instead of taking the first
    #[serde(default)]
    pub strict_single_result: bool,
    /// Maximum number of cached plans; further plans are compiled but not stored
    #[serde(default = "default_plan_cache_capacity")]
    pub plan_cache_capacity: usize,
}

fn default_plan_cache_capacity() -> usize {
    1024
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            log_statements: false,
            strict_single_result: false,
            plan_cache_capacity: default_plan_cache_capacity(),
        }
    }
}

impl QueryConfig {
    /// Load the configuration from `config/config.toml`, falling back to env vars.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load the configuration from `path` (optional) and environment variables.
    ///
    /// If the file exists but cannot be read or parsed, a warning is logged and the
    /// environment alone is used. A missing `[query]` section yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the environment cannot be read or a value has the
    /// wrong type.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(env_source());

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                if Path::new(path).exists() {
                    log::warn!("Failed to load config file {path}, falling back to env: {err}");
                }
                Config::builder()
                    .add_source(env_source())
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {err}, then env-only error: {env_err}"
                        ))
                    })?
            }
        };

        match settings.get::<QueryConfig>("query") {
            Ok(cfg) => Ok(cfg),
            Err(ConfigError::NotFound(_)) => Ok(QueryConfig::default()),
            Err(e) => Err(ConfigError::Message(format!(
                "Query configuration could not be loaded from file or environment: {e}"
            ))),
        }
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}
