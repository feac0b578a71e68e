//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Storage (LocalStorage on web, a JSON file natively)
//! - Reloading after a configuration import

use std::time::Duration;

#[cfg(target_arch = "wasm32")]
pub mod web;

#[cfg(target_arch = "wasm32")]
pub use web::LocalStorageBackend;

/// Act on an import's reload suggestion. Returns whether a reload was scheduled.
#[cfg(target_arch = "wasm32")]
pub fn schedule_reload(delay: Duration) -> bool {
    web::schedule_reload(delay)
}

/// Native processes have nothing to reload; other readers of the store file
/// pick up changes the next time they open it
#[cfg(not(target_arch = "wasm32"))]
pub fn schedule_reload(delay: Duration) -> bool {
    log::info!(
        "Import applied; restart running dashboards within {:?} to pick it up",
        delay
    );
    false
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[test]
    fn test_native_reload_is_not_scheduled() {
        assert!(!schedule_reload(Duration::from_millis(10)));
    }
}
