use log::{debug, error, info, warn};
use serde_derive::Serialize;

use crate::configuration::settings::Settings;
use crate::configuration::store::SettingsStore;
use crate::engine::clipboard_engine::ClipboardBridge;
use crate::engine::completion_engine::CompletionError;

pub mod queue;
pub mod surface;


use surface::WindowSurface;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WindowState {
    Hidden,
    EditingInput,
    AwaitingResponse,
    EditingOutput,
}

impl WindowState {
    pub fn is_visible(self) -> bool {
        self != WindowState::Hidden
    }

    fn is_editing(self) -> bool {
        matches!(self, WindowState::EditingInput | WindowState::EditingOutput)
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// What the web view renders after every change.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: WindowState,
    pub input_text: String,
    pub output_text: String,
    pub notice: Option<Notice>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SessionText {
    input_text: String,
    output_text: String,
}

/// A completion the controller wants run off its own task.
#[derive(Debug, Clone)]
pub struct CompletionJob {
    pub ticket: u64,
    pub prompt: String,
    pub settings: Settings,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SettingsUpdate {
    pub auto_start_changed: bool,
    pub saved: bool,
}

/// Owns the window lifecycle and the session text. Only the controller task
/// touches it; everything else talks to it through [`queue::ControllerHandle`].
pub struct WindowController {
    state: WindowState,
    session: SessionText,
    notice: Option<Notice>,
    settings: Settings,
    store: SettingsStore,
    clipboard: Box<dyn ClipboardBridge>,
    surface: Box<dyn WindowSurface>,
    next_ticket: u64,
    pending: Option<u64>,
}

impl WindowController {
    pub fn new(
        settings: Settings,
        store: SettingsStore,
        clipboard: Box<dyn ClipboardBridge>,
        surface: Box<dyn WindowSurface>,
    ) -> Self {
        Self {
            state: WindowState::Hidden,
            session: SessionText::default(),
            notice: None,
            settings,
            store,
            clipboard,
            surface,
            next_ticket: 0,
            pending: None,
        }
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            input_text: self.session.input_text.clone(),
            output_text: self.session.output_text.clone(),
            notice: self.notice.clone(),
        }
    }

    pub fn publish(&mut self) {
        let snapshot = self.snapshot();
        self.surface.publish(&snapshot);
    }

    /// Shows the window with the clipboard pre-filled, or focuses it when it
    /// is already open.
    pub fn activate(&mut self) {
        if self.state.is_visible() {
            debug!("Window already open, bringing it to front");
            if let Err(e) = self.surface.focus() {
                warn!("Could not focus window: {}", e);
            }
            return;
        }

        info!("Opening window");
        if let Err(e) = self.surface.open() {
            error!("Could not open window: {}", e);
            return;
        }
        self.session = SessionText::default();
        self.notice = None;
        match self.clipboard.read() {
            Ok(text) => self.session.input_text = text,
            Err(e) => self.notice = Some(Notice::warning(e.to_string())),
        }
        self.state = WindowState::EditingInput;
    }

    pub fn paste_from_clipboard(&mut self) {
        if !self.state.is_editing() {
            debug!("Ignoring paste while {:?}", self.state);
            return;
        }
        match self.clipboard.read() {
            Ok(text) if text.is_empty() => {
                self.notice = Some(Notice::info("The clipboard does not contain any text"));
            }
            Ok(text) => {
                self.session.input_text = text;
                self.notice = None;
            }
            Err(e) => self.notice = Some(Notice::warning(e.to_string())),
        }
    }

    pub fn edit_input(&mut self, text: String) {
        if self.state.is_editing() {
            self.session.input_text = text;
        } else {
            debug!("Input is frozen while {:?}", self.state);
        }
    }

    pub fn edit_output(&mut self, text: String) {
        if self.state == WindowState::EditingOutput {
            self.session.output_text = text;
        } else {
            debug!("Output is read-only while {:?}", self.state);
        }
    }

    /// Freezes the input and hands back the job to run, unless a request is
    /// already outstanding or there is nothing to send.
    pub fn send(&mut self) -> Option<CompletionJob> {
        if !self.state.is_editing() {
            debug!("Ignoring send while {:?}", self.state);
            return None;
        }
        let prompt = self.session.input_text.trim();
        if prompt.is_empty() {
            self.notice = Some(Notice::info("Nothing to send. Type or paste some text first."));
            return None;
        }

        self.next_ticket += 1;
        let job = CompletionJob {
            ticket: self.next_ticket,
            prompt: prompt.to_string(),
            settings: self.settings.clone(),
        };
        self.pending = Some(job.ticket);
        self.state = WindowState::AwaitingResponse;
        self.notice = Some(Notice::info("Processing request..."));
        info!("Sending {} characters for completion", job.prompt.len());
        Some(job)
    }

    pub fn finish(&mut self, ticket: u64, result: Result<String, CompletionError>) {
        if self.pending != Some(ticket) {
            debug!("Discarding stale completion {}", ticket);
            return;
        }
        self.pending = None;
        match result {
            Ok(text) => {
                info!("Successfully received completion");
                self.session.output_text = text;
                self.notice = None;
                self.state = WindowState::EditingOutput;
            }
            Err(e) => {
                error!("Completion error: {}", e);
                self.notice = Some(Notice::error(e.to_string()));
                self.state = WindowState::EditingInput;
            }
        }
    }

    /// Puts the response on the clipboard exactly as shown, even when empty,
    /// and hides the window.
    pub fn copy_response(&mut self) {
        if self.state != WindowState::EditingOutput {
            debug!("Nothing to copy while {:?}", self.state);
            return;
        }
        match self.clipboard.write(&self.session.output_text) {
            Ok(()) => {
                info!("Copied response to clipboard");
                self.close();
            }
            Err(e) => self.notice = Some(Notice::error(e.to_string())),
        }
    }

    pub fn clear(&mut self) {
        if self.state == WindowState::AwaitingResponse {
            debug!("Ignoring clear while a request is outstanding");
            return;
        }
        self.session = SessionText::default();
        self.notice = None;
        if self.state == WindowState::EditingOutput {
            self.state = WindowState::EditingInput;
        }
    }

    pub fn close(&mut self) {
        if self.pending.take().is_some() {
            info!("Abandoning outstanding completion");
        }
        if let Err(e) = self.surface.hide() {
            warn!("Could not hide window: {}", e);
        }
        self.state = WindowState::Hidden;
    }

    pub fn notify(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    pub fn complete_first_run(&mut self) {
        if !self.settings.first_run {
            return;
        }
        self.settings.first_run = false;
        if let Err(e) = self.store.save(&self.settings) {
            warn!("Could not record first run: {}", e);
        }
    }

    /// Applies settings edited in the UI. `first_run` is owned by the app and
    /// never taken from the form.
    pub fn update_settings(&mut self, mut settings: Settings) -> SettingsUpdate {
        settings.first_run = self.settings.first_run;
        let mut update = SettingsUpdate {
            auto_start_changed: settings.auto_start != self.settings.auto_start,
            saved: true,
        };
        self.settings = settings;

        match self.store.save(&self.settings) {
            Ok(()) => self.notice = Some(Notice::info("Settings saved")),
            Err(e) => {
                warn!("Error saving configuration: {}", e);
                update.saved = false;
                self.notice = Some(Notice::warning(format!(
                    "Settings apply to this session but could not be saved: {}",
                    e
                )));
            }
        }
        update
    }
}
