use serde::{Deserialize, Serialize};

use crate::storage::{KeyValueStore, StorageError};

pub const SETTINGS_KEY: &str = "playgroundSettings";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScriptCheck {
    /// Built-in lexer; the native fallback.
    #[cfg_attr(not(target_arch = "wasm32"), default)]
    Scanner,
    /// The page's own JavaScript engine.
    #[cfg_attr(target_arch = "wasm32", default)]
    Engine,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub preview_debounce_ms: u32,
    pub auto_preview: bool,
    pub indent_unit: usize,
    pub beautify_indent: usize,
    pub script_check: ScriptCheck,
    pub log_level: String,
    pub font_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            preview_debounce_ms: 500,
            auto_preview: true,
            indent_unit: 2,
            beautify_indent: 4,
            script_check: ScriptCheck::default(),
            log_level: "info".to_string(),
            font_size: 14,
        }
    }
}

impl Settings {
    /// Stored settings, or defaults when absent or unreadable.
    pub fn load(store: &impl KeyValueStore) -> Self {
        match store.get(SETTINGS_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                log::warn!("ignoring unreadable settings: {err}");
                Self::default()
            }),
            Ok(None) => Self::default(),
            Err(err) => {
                log::warn!("settings unavailable: {err}");
                Self::default()
            }
        }
    }

    pub fn save(&self, store: &impl KeyValueStore) -> Result<(), StorageError> {
        let raw = serde_json::to_string(self).map_err(StorageError::Serialize)?;
        store.set(SETTINGS_KEY, &raw)
    }

    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}
