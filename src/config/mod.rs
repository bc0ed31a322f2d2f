//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod preferences;
mod storage;

pub use preferences::PreferencesConfig;
pub use storage::{StorageConfig, IN_MEMORY_PATH};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "kanakku.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "KANAKKU_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "KANAKKU";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "KANAKKU_LOG";

use serde::Deserialize;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ledger store configuration.
    pub storage: StorageConfig,
    /// Scalar preference store configuration.
    pub preferences: PreferencesConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `kanakku.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        Ok(config)
    }

    /// Create config for testing: in-memory ledger, no debounce delay.
    pub fn for_test() -> Self {
        Self {
            storage: StorageConfig::in_memory(),
            preferences: PreferencesConfig {
                debounce_ms: 0,
                ..PreferencesConfig::default()
            },
        }
    }
}
