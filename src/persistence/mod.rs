//! Save/load persistence with versioning and validation
//!
//! Features:
//! - Versioned JSON envelope (`version`, `payload`, `savedAt`)
//! - Legacy (pre-envelope) payloads read transparently
//! - Caller-supplied validators on save and load
//! - Migration chains for older envelope versions
//! - Change notification for every save/clear
//! - Configuration export/import

pub mod backend;
pub mod envelope;
pub mod events;
pub mod manager;
pub mod migration;
pub mod value;

pub use backend::{Backend, BackendError, FileBackend, MemoryBackend};
pub use envelope::{CURRENT_VERSION, StoredRecord};
pub use events::{ChangeBus, StorageChange, SubscriptionId};
pub use manager::{BatchOperation, BatchReport, ImportOutcome, StateManager, Validator};
pub use migration::{MigrationError, MigrationFn, MigrationRegistry};
pub use value::{StateValue, format_iso_datetime, parse_iso_datetime};
