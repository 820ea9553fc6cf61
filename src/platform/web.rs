//! Browser platform: LocalStorage and `performance.now()`

use web_sys::Storage;

use crate::persistence::{KeyValueStore, StoreError};

/// `window.localStorage` as a [`KeyValueStore`]
pub struct LocalStorageStore {
    storage: Storage,
}

impl LocalStorageStore {
    pub fn open() -> Result<Self, StoreError> {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
            .ok_or(StoreError::Unavailable)?;
        Ok(Self { storage })
    }
}

fn backend_error(key: &str, err: wasm_bindgen::JsValue) -> StoreError {
    StoreError::Backend {
        key: key.to_string(),
        message: format!("{err:?}"),
    }
}

impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.storage.get_item(key).map_err(|e| backend_error(key, e))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        // Throws QuotaExceededError when full
        self.storage
            .set_item(key, value)
            .map_err(|e| backend_error(key, e))
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.storage.remove_item(key).map_err(|e| backend_error(key, e))
    }
}

/// High-resolution frame clock
pub fn now_ms() -> f64 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or_else(js_sys::Date::now)
}

pub fn wall_clock_ms() -> f64 {
    js_sys::Date::now()
}
