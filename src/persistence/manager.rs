//! Versioned, validated state store
//!
//! `StateManager` is the only surface the dashboard talks to. It never
//! panics and never returns an error: backend failures, corrupt data and
//! validator rejections are logged and turned into `false` or the caller's
//! default. Rejections log at `warn`, storage failures at `error`.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use super::backend::{Backend, BackendError};
use super::envelope::{self, CURRENT_VERSION, StoredRecord};
use super::events::{ChangeBus, StorageChange};
use super::migration::{MigrationError, MigrationRegistry};
use super::value::StateValue;
use crate::consts::DEFAULT_RELOAD_DELAY_MS;

/// Caller-supplied acceptance check for a value
pub type Validator<'a, T> = &'a dyn Fn(&T) -> bool;

#[derive(Debug, Error)]
enum StoreError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("stored JSON is malformed: {0}")]
    Parse(serde_json::Error),
    #[error("stored payload has an unexpected shape: {0}")]
    Shape(serde_json::Error),
    #[error("value could not be serialized: {0}")]
    Serialize(serde_json::Error),
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

/// One write in a [`StateManager::save_batch`] call
pub struct BatchOperation<'a, T> {
    pub key: String,
    pub value: T,
    pub validator: Option<Validator<'a, T>>,
}

impl<'a, T> BatchOperation<'a, T> {
    pub fn new(key: impl Into<String>, value: T) -> Self {
        Self {
            key: key.into(),
            value,
            validator: None,
        }
    }

    pub fn validated(key: impl Into<String>, value: T, validator: Validator<'a, T>) -> Self {
        Self {
            key: key.into(),
            value,
            validator: Some(validator),
        }
    }
}

/// Per-key outcome of a batch; earlier successes stay committed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<(String, bool)>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|(_, ok)| *ok)
    }

    pub fn failed_keys(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, ok)| !*ok)
            .map(|(key, _)| key.as_str())
            .collect()
    }
}

/// Result of [`StateManager::import_configuration`]
///
/// The store never reloads anything itself; callers that want the
/// application to pick up imported keys act on `reload_after`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Every top-level entry was offered to `save`
    Applied {
        keys: Vec<String>,
        all_saved: bool,
        reload_after: Duration,
    },
    /// Nothing was written
    Rejected { reason: String },
}

impl ImportOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, ImportOutcome::Applied { all_saved: true, .. })
    }

    /// Suggested reload delay, present whenever anything was written
    pub fn reload_after(&self) -> Option<Duration> {
        match self {
            ImportOutcome::Applied { reload_after, .. } => Some(*reload_after),
            ImportOutcome::Rejected { .. } => None,
        }
    }
}

/// Versioned key/value store over a pluggable backend
#[derive(Debug)]
pub struct StateManager<B: Backend> {
    backend: B,
    bus: Rc<ChangeBus>,
    migrations: MigrationRegistry,
    reload_delay: Duration,
}

impl<B: Backend> StateManager<B> {
    /// Store with its own private change bus
    pub fn new(backend: B) -> Self {
        Self::with_bus(backend, Rc::new(ChangeBus::new()))
    }

    /// Store publishing to a shared bus
    pub fn with_bus(backend: B, bus: Rc<ChangeBus>) -> Self {
        Self {
            backend,
            bus,
            migrations: MigrationRegistry::new(),
            reload_delay: Duration::from_millis(DEFAULT_RELOAD_DELAY_MS),
        }
    }

    pub fn with_migrations(mut self, migrations: MigrationRegistry) -> Self {
        self.migrations = migrations;
        self
    }

    pub fn with_reload_delay(mut self, delay: Duration) -> Self {
        self.reload_delay = delay;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn bus(&self) -> &Rc<ChangeBus> {
        &self.bus
    }

    /// Wrap `value` in a versioned envelope and write it under `key`
    ///
    /// A rejecting validator aborts before anything is written. Returns
    /// false on rejection, an empty key, or any storage failure.
    pub fn save<T: Serialize>(&self, key: &str, value: &T, validator: Option<Validator<'_, T>>) -> bool {
        if key.is_empty() {
            log::warn!("Refusing to save under an empty key");
            return false;
        }
        if let Some(validator) = validator {
            if !Self::validate_data(value, validator) {
                log::warn!("Validation rejected value for '{}', nothing written", key);
                return false;
            }
        }

        match self.write_record(key, value) {
            Ok(()) => true,
            Err(err) => {
                log::error!("Failed to save '{}': {}", key, err);
                false
            }
        }
    }

    /// Read the payload under `key`, or `default` if it is absent, corrupt,
    /// the wrong shape, or rejected by `validator`
    pub fn load<T: DeserializeOwned>(&self, key: &str, default: T, validator: Option<Validator<'_, T>>) -> T {
        let value = match self.read_payload::<T>(key) {
            Ok(Some(value)) => value,
            Ok(None) => return default,
            Err(StoreError::Shape(err)) => {
                log::warn!("Stored value for '{}' has an unexpected shape, using default: {}", key, err);
                return default;
            }
            Err(err) => {
                log::error!("Failed to load '{}', using default: {}", key, err);
                return default;
            }
        };

        match validator {
            Some(validator) if !Self::validate_data(&value, validator) => {
                log::warn!("Validation rejected stored value for '{}', using default", key);
                default
            }
            _ => value,
        }
    }

    /// Remove `key`; clearing an absent key succeeds
    pub fn clear(&self, key: &str) -> bool {
        let old_value = match self.backend.get(key) {
            Ok(old) => old,
            Err(err) => {
                log::error!("Failed to clear '{}': {}", key, err);
                return false;
            }
        };
        if let Err(err) = self.backend.remove(key) {
            log::error!("Failed to clear '{}': {}", key, err);
            return false;
        }

        self.bus.publish(&StorageChange {
            key: key.to_string(),
            old_value,
            new_value: None,
        });
        true
    }

    /// Run a validator, treating a panic inside it as rejection
    pub fn validate_data<T>(value: &T, validator: Validator<'_, T>) -> bool {
        match panic::catch_unwind(AssertUnwindSafe(|| validator(value))) {
            Ok(valid) => valid,
            Err(cause) => {
                log::error!("Validator panicked: {}", panic_message(cause.as_ref()));
                false
            }
        }
    }

    /// Save every operation in order; true only if all of them succeeded
    ///
    /// Not atomic: a failure part-way leaves earlier writes in place.
    pub fn save_batch<T: Serialize>(&self, operations: Vec<BatchOperation<'_, T>>) -> bool {
        self.save_batch_report(operations).all_succeeded()
    }

    /// [`save_batch`](Self::save_batch) with the outcome of each operation
    pub fn save_batch_report<T: Serialize>(&self, operations: Vec<BatchOperation<'_, T>>) -> BatchReport {
        let outcomes: Vec<(String, bool)> = operations
            .into_iter()
            .map(|op| {
                let ok = self.save(&op.key, &op.value, op.validator);
                (op.key, ok)
            })
            .collect();

        let report = BatchReport { outcomes };
        if !report.all_succeeded() {
            log::warn!(
                "Batch save partially failed; committed writes remain. Failed: {:?}",
                report.failed_keys()
            );
        }
        report
    }

    /// Keys starting with `prefix`, in backend order
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        match self.backend.keys() {
            Ok(keys) => keys.into_iter().filter(|k| k.starts_with(prefix)).collect(),
            Err(err) => {
                log::error!("Failed to enumerate keys: {}", err);
                Vec::new()
            }
        }
    }

    /// Clear every key starting with `prefix`; true if every clear succeeded
    pub fn clear_all_with_prefix(&self, prefix: &str) -> bool {
        self.keys_with_prefix(prefix)
            .iter()
            .fold(true, |all_ok, key| self.clear(key) && all_ok)
    }

    /// Pretty JSON object of `{key: payload}` for every listed key that has
    /// a readable value. Keys come out sorted.
    pub fn export_configuration<I, S>(&self, keys: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut exported = BTreeMap::new();
        for key in keys {
            let key = key.as_ref();
            match self.read_payload::<StateValue>(key) {
                Ok(Some(payload)) => {
                    exported.insert(key.to_string(), payload);
                }
                Ok(None) => log::debug!("Export skipped '{}': no stored value", key),
                Err(err) => log::error!("Export skipped '{}': {}", key, err),
            }
        }

        serde_json::to_string_pretty(&exported).unwrap_or_else(|err| {
            log::error!("Failed to serialize export: {}", err);
            "{}".to_string()
        })
    }

    /// Save every top-level entry of an exported configuration
    ///
    /// Malformed JSON or a non-object document is rejected before any
    /// write. No validators run on import.
    pub fn import_configuration(&self, json: &str) -> ImportOutcome {
        let entries = match serde_json::from_str::<StateValue>(json) {
            Ok(StateValue::Object(entries)) => entries,
            Ok(_) => {
                log::error!("Import rejected: top-level value is not an object");
                return ImportOutcome::Rejected {
                    reason: "top-level value is not an object".to_string(),
                };
            }
            Err(err) => {
                log::error!("Import rejected: {}", err);
                return ImportOutcome::Rejected {
                    reason: err.to_string(),
                };
            }
        };

        let mut keys = Vec::with_capacity(entries.len());
        let mut all_saved = true;
        for (key, value) in &entries {
            all_saved &= self.save(key, value, None);
            keys.push(key.clone());
        }

        log::info!(
            "Imported {} key(s){}; reload suggested in {:?}",
            keys.len(),
            if all_saved { "" } else { " with failures" },
            self.reload_delay
        );
        ImportOutcome::Applied {
            keys,
            all_saved,
            reload_after: self.reload_delay,
        }
    }

    fn write_record<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(&StoredRecord::new(value)).map_err(StoreError::Serialize)?;
        // Old value only feeds the notification; an unreadable one is reported as absent
        let old_value = self.backend.get(key).unwrap_or_default();
        self.backend.set(key, &json)?;

        self.bus.publish(&StorageChange {
            key: key.to_string(),
            old_value,
            new_value: Some(json),
        });
        Ok(())
    }

    fn read_payload<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(raw) = self.backend.get(key)? else {
            return Ok(None);
        };
        let parsed: Value = serde_json::from_str(&raw).map_err(StoreError::Parse)?;
        let payload = self.extract_payload(key, parsed)?;
        serde_json::from_value(payload).map(Some).map_err(StoreError::Shape)
    }

    /// Unwrap a recognized envelope (migrating if needed); anything else is
    /// a legacy bare payload
    fn extract_payload(&self, key: &str, parsed: Value) -> Result<Value, StoreError> {
        let version = envelope::envelope_version(&parsed).map(str::to_owned);
        match version {
            Some(version) if version == CURRENT_VERSION => Ok(envelope::into_payload(parsed)),
            Some(version) => match self.migrations.check(&version) {
                Ok(()) => {
                    log::info!("Migrating '{}' from version {}", key, version);
                    Ok(self.migrations.migrate(&version, envelope::into_payload(parsed))?)
                }
                Err(MigrationError::NoPath { .. }) => {
                    log::warn!("'{}' has unrecognized version {}, reading it as a legacy value", key, version);
                    Ok(parsed)
                }
                Err(err) => Err(err.into()),
            },
            None => Ok(parsed),
        }
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> &str {
    if let Some(msg) = cause.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = cause.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}
