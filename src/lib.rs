//! KPI Board - persistence and scoring engine for a business dashboard
//!
//! Core modules:
//! - `persistence`: Versioned, validated key/value state store
//! - `scoring`: Actual-vs-target levels, percentages and colors
//! - `format`: Currency/percentage/number display strings
//! - `metrics`: Record filtering and roll-up pipelines
//! - `platform`: Browser/native platform abstraction
//! - `settings`: Dashboard configuration

pub mod format;
pub mod metrics;
pub mod persistence;
pub mod platform;
pub mod scoring;
pub mod settings;

pub use persistence::{ImportOutcome, StateManager, StateValue};
pub use scoring::{ScoreLevel, score_color, score_level, score_percentage};
pub use settings::Settings;

/// Application-wide defaults
pub mod consts {
    /// Delay suggested before reloading after a configuration import
    pub const DEFAULT_RELOAD_DELAY_MS: u64 = 1500;
    /// Namespace for dashboard keys
    pub const DEFAULT_KEY_PREFIX: &str = "kpi_board_";
    /// Environment variable naming the native store file
    pub const STORE_PATH_ENV: &str = "KPI_BOARD_STORE";
    /// Store file used when nothing else is configured
    pub const DEFAULT_STORE_FILE: &str = "kpi-board.json";
}
