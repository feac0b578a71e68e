//! Payload migrations between envelope versions
//!
//! A registry holds at most one outgoing step per source version. Loading a
//! record stamped with an older version walks the steps until it reaches
//! [`CURRENT_VERSION`]. Migrated payloads are not written back; the next
//! save stamps the current version.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use thiserror::Error;

use super::envelope::CURRENT_VERSION;

/// A single upgrade step; the error string is carried into [`MigrationError::Step`]
pub type MigrationFn = fn(Value) -> Result<Value, String>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MigrationError {
    #[error("no migration path from version {from} to the current version")]
    NoPath { from: String },
    #[error("migration chain revisits version {0}")]
    Cycle(String),
    #[error("migration {from} -> {to} failed: {reason}")]
    Step {
        from: String,
        to: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
struct MigrationStep {
    to: String,
    apply: MigrationFn,
}

/// Registered upgrade steps keyed by source version
#[derive(Debug, Clone, Default)]
pub struct MigrationRegistry {
    steps: HashMap<String, MigrationStep>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the step `from -> to`, replacing any previous step from `from`
    pub fn register(&mut self, from: impl Into<String>, to: impl Into<String>, apply: MigrationFn) {
        self.steps.insert(
            from.into(),
            MigrationStep {
                to: to.into(),
                apply,
            },
        );
    }

    /// Builder form of [`register`](Self::register)
    pub fn with(mut self, from: impl Into<String>, to: impl Into<String>, apply: MigrationFn) -> Self {
        self.register(from, to, apply);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether payloads stamped `version` can be brought to the current version
    pub fn recognizes(&self, version: &str) -> bool {
        self.check(version).is_ok()
    }

    /// Resolve the chain from `version` without running it
    ///
    /// `NoPath` means the version is foreign to this registry; `Cycle` means
    /// the registered steps are broken.
    pub fn check(&self, version: &str) -> Result<(), MigrationError> {
        self.path_from(version).map(|_| ())
    }

    /// Upgrade a payload stamped `version` to the current version
    pub fn migrate(&self, version: &str, mut payload: Value) -> Result<Value, MigrationError> {
        for (from, step) in self.path_from(version)? {
            payload = (step.apply)(payload).map_err(|reason| MigrationError::Step {
                from: from.to_string(),
                to: step.to.clone(),
                reason,
            })?;
            log::debug!("Migrated payload {} -> {}", from, step.to);
        }
        Ok(payload)
    }

    fn path_from<'a>(&'a self, version: &'a str) -> Result<Vec<(&'a str, &'a MigrationStep)>, MigrationError> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = version;

        while current != CURRENT_VERSION {
            if !seen.insert(current) {
                return Err(MigrationError::Cycle(current.to_string()));
            }
            let step = self.steps.get(current).ok_or_else(|| MigrationError::NoPath {
                from: version.to_string(),
            })?;
            path.push((current, step));
            current = &step.to;
        }

        Ok(path)
    }
}
