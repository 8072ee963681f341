use std::fmt;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use tauri::{AppHandle, GlobalShortcutManager};
use thiserror::Error;

/// Triggers closer together than this are treated as key repeat. OS
/// autorepeat runs at roughly 30ms per event once it starts.
pub const REPEAT_WINDOW: Duration = Duration::from_millis(150);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HotkeyError {
    #[error("Invalid hotkey `{input}`: {reason}")]
    Parse { input: String, reason: String },
    #[error("Could not register hotkey {accelerator}: {reason}")]
    Registration { accelerator: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub super_key: bool,
    pub cmd_or_ctrl: bool,
}

impl Modifiers {
    fn any(&self) -> bool {
        self.ctrl || self.shift || self.alt || self.super_key || self.cmd_or_ctrl
    }
}

/// A parsed global key combination such as `ctrl+shift+t`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hotkey {
    modifiers: Modifiers,
    key: String,
}

impl Hotkey {
    pub fn parse(input: &str) -> Result<Hotkey, HotkeyError> {
        let fail = |reason: &str| HotkeyError::Parse {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let mut modifiers = Modifiers::default();
        let mut key: Option<String> = None;

        for token in input.split('+').map(|t| t.trim().to_ascii_lowercase()) {
            if token.is_empty() {
                return Err(fail("empty key in combination"));
            }
            let flag = match token.as_str() {
                "ctrl" | "control" => &mut modifiers.ctrl,
                "shift" => &mut modifiers.shift,
                "alt" | "option" => &mut modifiers.alt,
                "super" | "cmd" | "command" | "meta" | "win" => &mut modifiers.super_key,
                "cmdorctrl" | "commandorcontrol" => &mut modifiers.cmd_or_ctrl,
                _ => {
                    if key.is_some() {
                        return Err(fail("only one non-modifier key is allowed"));
                    }
                    key = Some(canonical_key(&token).ok_or_else(|| fail("unsupported key"))?);
                    continue;
                }
            };
            if *flag {
                return Err(fail("modifier repeated"));
            }
            *flag = true;
        }

        let key = key.ok_or_else(|| fail("missing a non-modifier key"))?;
        if !modifiers.any() {
            return Err(fail("a global hotkey needs at least one modifier"));
        }
        Ok(Hotkey { modifiers, key })
    }

    /// Accelerator string understood by the Tauri global shortcut manager.
    pub fn accelerator(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if self.modifiers.cmd_or_ctrl {
            parts.push("CmdOrCtrl".into());
        }
        if self.modifiers.ctrl {
            parts.push("Ctrl".into());
        }
        if self.modifiers.alt {
            parts.push("Alt".into());
        }
        if self.modifiers.shift {
            parts.push("Shift".into());
        }
        if self.modifiers.super_key {
            parts.push("Super".into());
        }
        parts.push(accelerator_key(&self.key));
        parts.join("+")
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.modifiers;
        for (on, name) in [
            (m.cmd_or_ctrl, "cmdorctrl"),
            (m.ctrl, "ctrl"),
            (m.alt, "alt"),
            (m.shift, "shift"),
            (m.super_key, "super"),
        ] {
            if on {
                write!(f, "{}+", name)?;
            }
        }
        write!(f, "{}", self.key)
    }
}

fn canonical_key(token: &str) -> Option<String> {
    let mut chars = token.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return c.is_ascii_alphanumeric().then(|| c.to_string());
    }
    if let Some(n) = token.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
        return (1..=24).contains(&n).then(|| token.to_string());
    }
    let named = match token {
        "space" => "space",
        "enter" | "return" => "enter",
        "tab" => "tab",
        "esc" | "escape" => "escape",
        "backspace" => "backspace",
        "delete" | "del" => "delete",
        "insert" => "insert",
        "home" => "home",
        "end" => "end",
        "pageup" => "pageup",
        "pagedown" => "pagedown",
        "up" => "up",
        "down" => "down",
        "left" => "left",
        "right" => "right",
        _ => return None,
    };
    Some(named.to_string())
}

fn accelerator_key(key: &str) -> String {
    match key {
        "space" => "Space".into(),
        "enter" => "Enter".into(),
        "tab" => "Tab".into(),
        "escape" => "Escape".into(),
        "backspace" => "Backspace".into(),
        "delete" => "Delete".into(),
        "insert" => "Insert".into(),
        "home" => "Home".into(),
        "end" => "End".into(),
        "pageup" => "PageUp".into(),
        "pagedown" => "PageDown".into(),
        "up" => "Up".into(),
        "down" => "Down".into(),
        "left" => "Left".into(),
        "right" => "Right".into(),
        other => other.to_ascii_uppercase(),
    }
}

/// Drops triggers produced by auto-repeat while the combination is held.
#[derive(Debug)]
pub struct RepeatFilter {
    window: Duration,
    last_seen: Option<Instant>,
}

impl RepeatFilter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_seen: None,
        }
    }

    /// Returns true when the trigger starts a new physical press.
    pub fn accept(&mut self, at: Instant) -> bool {
        let fresh = match self.last_seen {
            Some(previous) => at.saturating_duration_since(previous) >= self.window,
            None => true,
        };
        self.last_seen = Some(at);
        fresh
    }
}

/// OS-level registration of a global shortcut.
pub trait ShortcutRegistrar: Send {
    fn register(
        &mut self,
        accelerator: &str,
        on_trigger: Box<dyn Fn() + Send + 'static>,
    ) -> anyhow::Result<()>;
    fn unregister(&mut self, accelerator: &str) -> anyhow::Result<()>;
}

pub struct TauriShortcuts {
    app_handle: AppHandle,
}

impl TauriShortcuts {
    pub fn new(app_handle: AppHandle) -> Self {
        Self { app_handle }
    }
}

impl ShortcutRegistrar for TauriShortcuts {
    fn register(
        &mut self,
        accelerator: &str,
        on_trigger: Box<dyn Fn() + Send + 'static>,
    ) -> anyhow::Result<()> {
        let mut manager = self.app_handle.global_shortcut_manager();
        if manager.is_registered(accelerator)? {
            anyhow::bail!("{} is already registered", accelerator);
        }
        manager.register(accelerator, move || on_trigger())?;
        Ok(())
    }

    fn unregister(&mut self, accelerator: &str) -> anyhow::Result<()> {
        self.app_handle
            .global_shortcut_manager()
            .unregister(accelerator)?;
        Ok(())
    }
}

enum ListenerEvent {
    Triggered(Instant),
    Shutdown,
}

/// Owns one global shortcut registration and the thread that turns its
/// triggers into activation requests.
pub struct HotkeyListener {
    hotkey: Hotkey,
    registrar: Box<dyn ShortcutRegistrar>,
    events: Sender<ListenerEvent>,
    worker: Option<JoinHandle<()>>,
}

impl HotkeyListener {
    pub fn start(
        hotkey: Hotkey,
        mut registrar: Box<dyn ShortcutRegistrar>,
        on_activate: impl Fn() + Send + 'static,
    ) -> Result<HotkeyListener, HotkeyError> {
        let accelerator = hotkey.accelerator();
        let (events, receiver) = mpsc::channel();

        let trigger = events.clone();
        registrar
            .register(
                &accelerator,
                Box::new(move || {
                    let _ = trigger.send(ListenerEvent::Triggered(Instant::now()));
                }),
            )
            .map_err(|e| {
                error!("Failed to register hotkey {}: {}", accelerator, e);
                HotkeyError::Registration {
                    accelerator: accelerator.clone(),
                    reason: e.to_string(),
                }
            })?;

        let worker = thread::Builder::new()
            .name("hotkey-listener".into())
            .spawn(move || {
                let mut filter = RepeatFilter::new(REPEAT_WINDOW);
                while let Ok(event) = receiver.recv() {
                    match event {
                        ListenerEvent::Triggered(at) if filter.accept(at) => {
                            info!("Hotkey pressed");
                            on_activate();
                        }
                        ListenerEvent::Triggered(_) => debug!("Ignoring hotkey repeat"),
                        ListenerEvent::Shutdown => break,
                    }
                }
                debug!("Hotkey listener thread finished");
            });

        let worker = match worker {
            Ok(worker) => worker,
            Err(e) => {
                let _ = registrar.unregister(&accelerator);
                return Err(HotkeyError::Registration {
                    accelerator,
                    reason: format!("failed to spawn listener thread: {}", e),
                });
            }
        };

        info!("Registered hotkey {}", hotkey);
        Ok(HotkeyListener {
            hotkey,
            registrar,
            events,
            worker: Some(worker),
        })
    }

    pub fn hotkey(&self) -> &Hotkey {
        &self.hotkey
    }

    /// Unregisters the shortcut and waits for the listener thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        if let Err(e) = self.registrar.unregister(&self.hotkey.accelerator()) {
            warn!("Error removing hotkey {}: {}", self.hotkey, e);
        }
        let _ = self.events.send(ListenerEvent::Shutdown);
        if worker.join().is_err() {
            error!("Hotkey listener thread panicked");
        }
        info!("Stopped listening for {}", self.hotkey);
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Swaps `current` for a listener on `hotkey`. The previous binding is only
/// released once the new one is registered, so a failed rebind leaves the
/// old hotkey working.
pub fn rebind(
    current: &mut Option<HotkeyListener>,
    hotkey: Hotkey,
    registrar: Box<dyn ShortcutRegistrar>,
    on_activate: impl Fn() + Send + 'static,
) -> Result<(), HotkeyError> {
    if current.as_ref().map(HotkeyListener::hotkey) == Some(&hotkey) {
        debug!("Hotkey {} unchanged", hotkey);
        return Ok(());
    }
    let listener = HotkeyListener::start(hotkey, registrar, on_activate)?;
    if let Some(previous) = current.replace(listener) {
        previous.stop();
    }
    Ok(())
}
