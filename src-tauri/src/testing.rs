//! In-memory stand-ins for the clipboard, window and shortcut manager.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::controller::surface::WindowSurface;
use crate::controller::SessionSnapshot;
use crate::engine::clipboard_engine::{ClipboardBridge, ClipboardError};
use crate::engine::hotkey_engine::ShortcutRegistrar;

#[derive(Default)]
struct ClipboardState {
    text: String,
    failing: bool,
}

#[derive(Clone, Default)]
pub struct MemoryClipboard {
    state: Arc<Mutex<ClipboardState>>,
}

impl MemoryClipboard {
    pub fn with_text(text: &str) -> Self {
        let clipboard = Self::default();
        clipboard.set(text);
        clipboard
    }

    pub fn set(&self, text: &str) {
        self.state.lock().unwrap().text = text.to_string();
    }

    pub fn contents(&self) -> String {
        self.state.lock().unwrap().text.clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }
}

impl ClipboardBridge for MemoryClipboard {
    fn read(&mut self) -> Result<String, ClipboardError> {
        let state = self.state.lock().unwrap();
        if state.failing {
            return Err(ClipboardError::Read("clipboard is locked".to_string()));
        }
        Ok(state.text.clone())
    }

    fn write(&mut self, text: &str) -> Result<(), ClipboardError> {
        let mut state = self.state.lock().unwrap();
        if state.failing {
            return Err(ClipboardError::Write("clipboard is locked".to_string()));
        }
        state.text = text.to_string();
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct SurfaceLog {
    pub windows_created: usize,
    pub focused: usize,
    pub hidden: usize,
    pub visible: bool,
    pub published: Vec<SessionSnapshot>,
}

/// Window stand-in that records what the controller asked of it.
#[derive(Clone, Default)]
pub struct RecordingSurface {
    log: Arc<Mutex<SurfaceLog>>,
    exists: Arc<Mutex<bool>>,
}

impl RecordingSurface {
    pub fn log(&self) -> SurfaceLog {
        self.log.lock().unwrap().clone()
    }
}

impl WindowSurface for RecordingSurface {
    fn open(&mut self) -> anyhow::Result<()> {
        let mut exists = self.exists.lock().unwrap();
        let mut log = self.log.lock().unwrap();
        if !*exists {
            *exists = true;
            log.windows_created += 1;
        }
        log.visible = true;
        Ok(())
    }

    fn focus(&mut self) -> anyhow::Result<()> {
        let mut log = self.log.lock().unwrap();
        log.focused += 1;
        log.visible = true;
        Ok(())
    }

    fn hide(&mut self) -> anyhow::Result<()> {
        let mut log = self.log.lock().unwrap();
        log.hidden += 1;
        log.visible = false;
        Ok(())
    }

    fn publish(&mut self, snapshot: &SessionSnapshot) {
        self.log.lock().unwrap().published.push(snapshot.clone());
    }
}

#[derive(Default)]
struct ShortcutState {
    registered: HashMap<String, Box<dyn Fn() + Send>>,
    claimed: HashSet<String>,
}

/// Shortcut manager stand-in; `press` plays the role of the OS.
#[derive(Clone, Default)]
pub struct FakeShortcuts {
    state: Arc<Mutex<ShortcutState>>,
}

impl FakeShortcuts {
    /// Marks an accelerator as owned by another application.
    pub fn claim(&self, accelerator: &str) {
        self.state.lock().unwrap().claimed.insert(accelerator.to_string());
    }

    pub fn is_registered(&self, accelerator: &str) -> bool {
        self.state.lock().unwrap().registered.contains_key(accelerator)
    }

    pub fn press(&self, accelerator: &str) {
        let state = self.state.lock().unwrap();
        if let Some(callback) = state.registered.get(accelerator) {
            callback();
        }
    }
}

impl ShortcutRegistrar for FakeShortcuts {
    fn register(
        &mut self,
        accelerator: &str,
        on_trigger: Box<dyn Fn() + Send + 'static>,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.claimed.contains(accelerator) || state.registered.contains_key(accelerator) {
            anyhow::bail!("{} is already registered", accelerator);
        }
        state.registered.insert(accelerator.to_string(), on_trigger);
        Ok(())
    }

    fn unregister(&mut self, accelerator: &str) -> anyhow::Result<()> {
        self.state.lock().unwrap().registered.remove(accelerator);
        Ok(())
    }
}
