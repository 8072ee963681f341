pub mod clipboard_engine;
pub mod completion_engine;
pub mod hotkey_engine;
