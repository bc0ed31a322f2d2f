//! Scalar preference store.
//!
//! Durable key → string storage for small standalone values such as the
//! income figure. Synchronous, no transactions, no history.

mod debounce;
mod json_file;
mod memory;

pub use debounce::DebouncedPreference;
pub use json_file::JsonFilePreferenceStore;
pub use memory::MemoryPreferenceStore;

/// Key holding the income (வரவு) value.
pub const INCOME_KEY: &str = "kanakuValaku_varavu";

/// Result type for preference operations.
pub type Result<T> = std::result::Result<T, PreferenceError>;

/// Errors that can occur reading or writing preferences.
#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    #[error("Preference file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Preference file is not a valid key/value map: {0}")]
    Json(#[from] serde_json::Error),
}

/// Interface for scalar preference persistence.
///
/// Implementations:
/// - `JsonFilePreferenceStore`: JSON map on disk
/// - `MemoryPreferenceStore`: In-memory store for testing
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}
