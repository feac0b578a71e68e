//! Browser storage and reload (wasm32 only)

use std::time::Duration;

use wasm_bindgen::JsValue;

use crate::persistence::{Backend, BackendError};

fn js_error(context: &str, err: JsValue) -> BackendError {
    BackendError::Unavailable(format!("{}: {:?}", context, err))
}

/// `window.localStorage`
#[derive(Debug)]
pub struct LocalStorageBackend {
    storage: web_sys::Storage,
}

impl LocalStorageBackend {
    pub fn open() -> Result<Self, BackendError> {
        let window = web_sys::window().ok_or_else(|| BackendError::Unavailable("no window".into()))?;
        let storage = window
            .local_storage()
            .map_err(|e| js_error("localStorage access denied", e))?
            .ok_or_else(|| BackendError::Unavailable("localStorage disabled".into()))?;
        Ok(Self { storage })
    }
}

impl Backend for LocalStorageBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        self.storage
            .get_item(key)
            .map_err(|e| js_error("getItem failed", e))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        // Browsers throw QuotaExceededError here when full
        self.storage
            .set_item(key, value)
            .map_err(|e| js_error("setItem failed", e))
    }

    fn remove(&self, key: &str) -> Result<(), BackendError> {
        self.storage
            .remove_item(key)
            .map_err(|e| js_error("removeItem failed", e))
    }

    fn keys(&self) -> Result<Vec<String>, BackendError> {
        let len = self
            .storage
            .length()
            .map_err(|e| js_error("length failed", e))?;
        let mut keys = Vec::with_capacity(len as usize);
        for i in 0..len {
            if let Some(key) = self.storage.key(i).map_err(|e| js_error("key failed", e))? {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

/// Reload the page after `delay`
pub fn schedule_reload(delay: Duration) -> bool {
    let Some(window) = web_sys::window() else {
        return false;
    };
    let reload = js_sys::Function::new_no_args("window.location.reload()");
    let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
    match window.set_timeout_with_callback_and_timeout_and_arguments_0(&reload, millis) {
        Ok(_) => {
            log::info!("Reload scheduled in {:?}", delay);
            true
        }
        Err(e) => {
            log::warn!("Could not schedule reload: {:?}", e);
            false
        }
    }
}
