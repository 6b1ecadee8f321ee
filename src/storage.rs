use std::cell::RefCell;
use std::collections::HashMap;

use thiserror::Error;

use crate::bundle::SourceBundle;

/// Slot holding the saved bundle.
pub const STORAGE_KEY: &str = "savedCode";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage is unavailable")]
    Unavailable,
    #[error("nothing saved under '{0}'")]
    Missing(String),
    #[error("saved data is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),
    #[error("could not serialize: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("could not write to storage: {0}")]
    Write(String),
}

/// A string key-value slot store.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RefCell<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.slots.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.slots
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.slots.borrow_mut().remove(key);
        Ok(())
    }
}

/// `window.localStorage`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStore;

impl LocalStore {
    fn storage() -> Result<web_sys::Storage, StorageError> {
        web_sys::window()
            .and_then(|window| window.local_storage().ok().flatten())
            .ok_or(StorageError::Unavailable)
    }
}

fn js_message(err: wasm_bindgen::JsValue) -> String {
    err.as_string()
        .or_else(|| {
            js_sys::Reflect::get(&err, &wasm_bindgen::JsValue::from_str("message"))
                .ok()
                .and_then(|message| message.as_string())
        })
        .unwrap_or_else(|| "unknown error".to_string())
}

impl KeyValueStore for LocalStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Self::storage()?
            .get_item(key)
            .map_err(|_| StorageError::Unavailable)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|err| StorageError::Write(js_message(err)))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        Self::storage()?
            .remove_item(key)
            .map_err(|err| StorageError::Write(js_message(err)))
    }
}

/// Saves and loads the bundle under [`STORAGE_KEY`].
pub struct PersistenceStore<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> PersistenceStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn save(&self, bundle: &SourceBundle) -> Result<(), StorageError> {
        let raw = serde_json::to_string(bundle).map_err(StorageError::Serialize)?;
        self.store.set(STORAGE_KEY, &raw)?;
        log::info!("saved bundle ({} bytes)", raw.len());
        Ok(())
    }

    pub fn load(&self) -> Result<SourceBundle, StorageError> {
        let raw = self
            .store
            .get(STORAGE_KEY)?
            .ok_or_else(|| StorageError::Missing(STORAGE_KEY.to_string()))?;
        let bundle = serde_json::from_str(&raw).map_err(StorageError::Corrupt)?;
        log::info!("loaded bundle ({} bytes)", raw.len());
        Ok(bundle)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(STORAGE_KEY)
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PersistenceStore<MemoryStore> {
        PersistenceStore::new(MemoryStore::default())
    }

    #[test]
    fn round_trips_varied_content() {
        let bundles = [
            SourceBundle::default(),
            SourceBundle::new("<p>hi</p>", "p { color: red; }", "alert('x');"),
            SourceBundle::new(
                "<p title=\"q\\\"uote\">héllo → 世界</p>\r\n<br>",
                "/* ünïcode */\ncontent: \"\\201C\";",
                "const s = `line1\nline2`;\n// emoji 🎉\t\"done\"",
            ),
        ];
        let store = store();
        for bundle in bundles {
            store.save(&bundle).unwrap();
            assert_eq!(store.load().unwrap(), bundle);
        }
    }

    #[test]
    fn load_without_save_is_missing() {
        assert!(matches!(store().load(), Err(StorageError::Missing(_))));
    }

    #[test]
    fn corrupt_payloads_are_rejected() {
        let store = store();
        for raw in [
            "not json",
            "{\"html\":\"a\"}",
            "{\"html\":\"\",\"css\":\"\",\"js\":\"\",\"extra\":1}",
            "[1,2,3]",
        ] {
            store.store().set(STORAGE_KEY, raw).unwrap();
            assert!(
                matches!(store.load(), Err(StorageError::Corrupt(_))),
                "{raw} should be corrupt"
            );
        }
    }

    #[test]
    fn payload_has_exactly_three_fields() {
        let store = store();
        store.save(&SourceBundle::new("a", "b", "c")).unwrap();
        let raw = store.store().get(STORAGE_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert_eq!(object["html"], "a");
        assert_eq!(object["css"], "b");
        assert_eq!(object["js"], "c");
    }

    #[test]
    fn clear_removes_the_slot() {
        let store = store();
        store.save(&SourceBundle::default()).unwrap();
        store.clear().unwrap();
        assert!(matches!(store.load(), Err(StorageError::Missing(_))));
    }

    #[test]
    fn failed_write_keeps_the_previous_save() {
        let earlier = SourceBundle::new("<p>kept</p>", "p {}", "run();");
        let full = FullStore::default();
        full.inner
            .set(STORAGE_KEY, &serde_json::to_string(&earlier).unwrap())
            .unwrap();
        let store = PersistenceStore::new(full);

        let err = store
            .save(&SourceBundle::new("<p>lost</p>", "", ""))
            .unwrap_err();
        assert!(matches!(err, StorageError::Write(ref reason) if reason == "QuotaExceededError"));
        assert_eq!(store.load().unwrap(), earlier);
    }
}
