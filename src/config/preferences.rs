//! Scalar preference store configuration.

use std::time::Duration;

use serde::Deserialize;

/// Preference store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreferencesConfig {
    /// Path of the JSON file holding the key/value map.
    pub path: String,
    /// Quiet period after the last change before a debounced write lands.
    /// Default: 1000
    pub debounce_ms: u64,
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            path: "kanakku-preferences.json".to_string(),
            debounce_ms: 1000,
        }
    }
}

impl PreferencesConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
