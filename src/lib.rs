pub mod app;
pub mod beautify;
pub mod bundle;
pub mod check;
pub mod color;
pub mod debounce;
pub mod editor_core;
pub mod export;
pub mod hints;
pub mod logging;
pub mod preview;
pub mod settings;
pub mod storage;
