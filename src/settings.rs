//! Dashboard settings
//!
//! Persisted through the state store like any other key.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_KEY_PREFIX, DEFAULT_RELOAD_DELAY_MS};
use crate::persistence::{Backend, StateManager};

/// Longest reload delay accepted from storage
const MAX_RELOAD_DELAY_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Namespace prepended to every dashboard key
    pub key_prefix: String,
    /// Delay suggested to callers before reloading after an import
    pub reload_delay_ms: u64,
    /// Keys (without prefix) included in a default export
    pub export_keys: Vec<String>,
    /// Display locale label; formatting is always en-US
    pub locale: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            reload_delay_ms: DEFAULT_RELOAD_DELAY_MS,
            export_keys: ["employees", "kpi_targets", "annual_goals", "payroll"]
                .into_iter()
                .map(String::from)
                .collect(),
            locale: "en-US".to_string(),
        }
    }
}

impl Settings {
    /// Storage key (not namespaced, so it can be found before the prefix is known)
    pub const STORAGE_KEY: &'static str = "kpi_board_settings";

    pub fn reload_delay(&self) -> Duration {
        Duration::from_millis(self.reload_delay_ms)
    }

    /// Full storage key for a dashboard key name
    pub fn key(&self, name: &str) -> String {
        format!("{}{}", self.key_prefix, name)
    }

    /// Namespaced keys of the default export set
    pub fn export_key_list(&self) -> Vec<String> {
        self.export_keys.iter().map(|name| self.key(name)).collect()
    }

    pub fn is_valid(&self) -> bool {
        !self.key_prefix.is_empty() && self.reload_delay_ms <= MAX_RELOAD_DELAY_MS
    }

    /// Load settings, falling back to defaults on any problem
    pub fn load<B: Backend>(store: &StateManager<B>) -> Self {
        let settings = store.load(Self::STORAGE_KEY, Self::default(), Some(&Self::is_valid));
        log::info!("Settings loaded (prefix '{}')", settings.key_prefix);
        settings
    }

    pub fn save<B: Backend>(&self, store: &StateManager<B>) -> bool {
        let saved = store.save(Self::STORAGE_KEY, self, Some(&Self::is_valid));
        if saved {
            log::info!("Settings saved");
        }
        saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryBackend;

    #[test]
    fn test_defaults_when_nothing_stored() {
        let store = StateManager::new(MemoryBackend::new());
        assert_eq!(Settings::load(&store), Settings::default());
    }

    #[test]
    fn test_save_and_reload() {
        let store = StateManager::new(MemoryBackend::new());
        let settings = Settings {
            key_prefix: "spa_".into(),
            reload_delay_ms: 500,
            ..Settings::default()
        };
        assert!(settings.save(&store));

        let loaded = Settings::load(&store);
        assert_eq!(loaded, settings);
        assert_eq!(loaded.key("payroll"), "spa_payroll");
        assert_eq!(loaded.reload_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_invalid_settings_are_not_saved() {
        let store = StateManager::new(MemoryBackend::new());
        let bad = Settings {
            key_prefix: String::new(),
            ..Settings::default()
        };
        assert!(!bad.save(&store));
        assert!(store.backend().is_empty());
    }

    #[test]
    fn test_partial_stored_settings_fill_defaults() {
        let store = StateManager::new(MemoryBackend::new());
        store
            .backend()
            .set(Settings::STORAGE_KEY, r#"{"keyPrefix":"west_"}"#)
            .unwrap();

        let loaded = Settings::load(&store);
        assert_eq!(loaded.key_prefix, "west_");
        assert_eq!(loaded.reload_delay_ms, DEFAULT_RELOAD_DELAY_MS);
    }

    #[test]
    fn test_export_key_list_is_namespaced() {
        let settings = Settings::default();
        assert!(settings.export_key_list().iter().all(|k| k.starts_with(DEFAULT_KEY_PREFIX)));
        assert_eq!(settings.export_key_list().len(), settings.export_keys.len());
    }
}
