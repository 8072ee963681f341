use log::{info, warn};
use tauri::{AppHandle, Manager, Window, WindowBuilder, WindowUrl};
use tauri_plugin_positioner::{Position, WindowExt};

use crate::controller::SessionSnapshot;

pub const MAIN_WINDOW: &str = "main";
pub const SESSION_EVENT: &str = "session_state";

/// The one application window as seen by the controller.
pub trait WindowSurface: Send {
    /// Shows the window, creating it if it does not exist yet.
    fn open(&mut self) -> anyhow::Result<()>;
    fn focus(&mut self) -> anyhow::Result<()>;
    fn hide(&mut self) -> anyhow::Result<()>;
    fn publish(&mut self, snapshot: &SessionSnapshot);
}

pub struct TauriSurface {
    app_handle: AppHandle,
}

impl TauriSurface {
    pub fn new(app_handle: AppHandle) -> Self {
        Self { app_handle }
    }

    fn window(&self) -> anyhow::Result<Window> {
        if let Some(window) = self.app_handle.get_window(MAIN_WINDOW) {
            return Ok(window);
        }
        info!("Creating new window...");
        let window = WindowBuilder::new(
            &self.app_handle,
            MAIN_WINDOW,
            WindowUrl::App("index.html".into()),
        )
        .title("CtrlAI")
        .inner_size(800.0, 600.0)
        .visible(false)
        .build()?;
        Ok(window)
    }
}

impl WindowSurface for TauriSurface {
    fn open(&mut self) -> anyhow::Result<()> {
        let window = self.window()?;
        if let Err(e) = window.move_window(Position::Center) {
            warn!("Could not center window: {}", e);
        }
        window.show()?;
        window.unminimize()?;
        window.set_focus()?;
        Ok(())
    }

    fn focus(&mut self) -> anyhow::Result<()> {
        let window = self.window()?;
        window.show()?;
        window.unminimize()?;
        window.set_focus()?;
        Ok(())
    }

    fn hide(&mut self) -> anyhow::Result<()> {
        if let Some(window) = self.app_handle.get_window(MAIN_WINDOW) {
            window.hide()?;
        }
        Ok(())
    }

    fn publish(&mut self, snapshot: &SessionSnapshot) {
        if let Err(e) = self.app_handle.emit_all(SESSION_EVENT, snapshot) {
            warn!("Failed to emit session state: {}", e);
        }
    }
}
