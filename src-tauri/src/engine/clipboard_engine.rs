use log::{debug, error};
use tauri::{AppHandle, ClipboardManager};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClipboardError {
    #[error("Could not read the clipboard: {0}")]
    Read(String),
    #[error("Could not write to the clipboard: {0}")]
    Write(String),
}

/// Plain-text access to the system clipboard.
pub trait ClipboardBridge: Send {
    /// Current clipboard text; empty when the clipboard holds non-text content.
    fn read(&mut self) -> Result<String, ClipboardError>;
    fn write(&mut self, text: &str) -> Result<(), ClipboardError>;
}

pub struct TauriClipboard {
    app_handle: AppHandle,
}

impl TauriClipboard {
    pub fn new(app_handle: AppHandle) -> Self {
        Self { app_handle }
    }
}

impl ClipboardBridge for TauriClipboard {
    fn read(&mut self) -> Result<String, ClipboardError> {
        match self.app_handle.clipboard_manager().read_text() {
            Ok(Some(text)) => {
                debug!("Read {} characters from clipboard", text.len());
                Ok(text)
            }
            Ok(None) => Ok(String::new()),
            Err(e) => {
                error!("Error reading clipboard: {}", e);
                Err(ClipboardError::Read(e.to_string()))
            }
        }
    }

    fn write(&mut self, text: &str) -> Result<(), ClipboardError> {
        let mut manager = self.app_handle.clipboard_manager();
        manager.write_text(text.to_string()).map_err(|e| {
            error!("Error writing clipboard: {}", e);
            ClipboardError::Write(e.to_string())
        })
    }
}
