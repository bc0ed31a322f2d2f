//! Bootstrap utilities for embedding applications.
//!
//! Shared initialization code: tracing setup and wiring the stores
//! described by a loaded [`Config`].

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, LOG_ENV_VAR};
use crate::preferences::{self, DebouncedPreference, JsonFilePreferenceStore, INCOME_KEY};
use crate::storage::LedgerStore;

/// Initialize tracing with the KANAKKU_LOG environment variable.
///
/// Defaults to "info" level if KANAKKU_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Stores described by one [`Config`].
pub struct Stores {
    pub ledger: LedgerStore,
    pub preferences: Arc<JsonFilePreferenceStore>,
}

impl Stores {
    /// Build both stores. The ledger opens lazily; the preference file is
    /// read immediately.
    pub fn from_config(config: &Config) -> preferences::Result<Self> {
        let preferences = Arc::new(JsonFilePreferenceStore::open(&config.preferences.path)?);
        info!(
            ledger = %config.storage.path,
            preferences = %config.preferences.path,
            "Stores configured"
        );

        Ok(Self {
            ledger: LedgerStore::new(config.storage.clone()),
            preferences,
        })
    }

    /// Debounced writer for the income value, using the configured delay.
    /// Must be called within a tokio runtime.
    pub fn income_writer(&self, config: &Config) -> DebouncedPreference {
        DebouncedPreference::new(
            self.preferences.clone(),
            INCOME_KEY,
            config.preferences.debounce(),
        )
    }
}
