use std::sync::{Mutex, MutexGuard};

use log::{info, warn};
use tauri::{AppHandle, Manager, Runtime};

use crate::controller::queue::{ControllerHandle, ControllerStopped, UiRequest};
use crate::engine::hotkey_engine::{rebind, Hotkey, HotkeyError, HotkeyListener, TauriShortcuts};

/// Process-wide state handed to Tauri: the way into the controller task and
/// the live hotkey registration.
pub struct AppState {
    pub controller: ControllerHandle,
    hotkey: Mutex<Option<HotkeyListener>>,
}

impl AppState {
    pub fn new(controller: ControllerHandle) -> Self {
        Self {
            controller,
            hotkey: Mutex::new(None),
        }
    }

    /// Registers `raw` as the launch hotkey, replacing the current binding only
    /// once the new one is in place.
    pub fn bind_hotkey(&self, app_handle: &AppHandle, raw: &str) -> Result<(), HotkeyError> {
        let hotkey = Hotkey::parse(raw)?;
        let controller = self.controller.clone();
        rebind(
            &mut self.hotkey_slot(),
            hotkey,
            Box::new(TauriShortcuts::new(app_handle.clone())),
            move || {
                if controller.request(UiRequest::Activate).is_err() {
                    warn!("Hotkey pressed but the window controller has stopped");
                }
            },
        )
    }

    /// Unregisters the hotkey; called once on the way out.
    pub fn release_hotkey(&self) {
        if let Some(listener) = self.hotkey_slot().take() {
            listener.stop();
            info!("Released launch hotkey");
        }
    }

    fn hotkey_slot(&self) -> MutexGuard<'_, Option<HotkeyListener>> {
        self.hotkey
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub trait ControllerAccess {
    fn controller(&self) -> Result<ControllerHandle, ControllerStopped>;

    fn submit(&self, request: UiRequest) -> Result<(), ControllerStopped> {
        self.controller()?.request(request)
    }
}

impl<R: Runtime> ControllerAccess for AppHandle<R> {
    fn controller(&self) -> Result<ControllerHandle, ControllerStopped> {
        self.try_state::<AppState>()
            .map(|state| state.controller.clone())
            .ok_or(ControllerStopped)
    }
}
