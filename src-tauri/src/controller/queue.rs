use std::sync::Arc;

use log::debug;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::sync::oneshot;

use crate::configuration::settings::Settings;
use crate::controller::{CompletionJob, Notice, SessionSnapshot, SettingsUpdate, WindowController};
use crate::engine::completion_engine::{Completer, CompletionError};

/// Everything that can happen to the window, in the order it happened.
pub enum UiRequest {
    Activate,
    PasteFromClipboard,
    EditInput(String),
    EditOutput(String),
    Send,
    CompletionFinished {
        ticket: u64,
        result: Result<String, CompletionError>,
    },
    CopyResponse,
    Clear,
    Close,
    Notify(Notice),
    CompleteFirstRun,
    Snapshot(oneshot::Sender<SessionSnapshot>),
    GetSettings(oneshot::Sender<Settings>),
    UpdateSettings(Settings, oneshot::Sender<SettingsUpdate>),
}

impl UiRequest {
    fn changes_view(&self) -> bool {
        !matches!(
            self,
            UiRequest::Snapshot(_) | UiRequest::GetSettings(_) | UiRequest::CompleteFirstRun
        )
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("the window controller is no longer running")]
pub struct ControllerStopped;

/// Cheap, cloneable way into the controller task.
#[derive(Clone)]
pub struct ControllerHandle {
    requests: UnboundedSender<UiRequest>,
}

impl ControllerHandle {
    pub fn request(&self, request: UiRequest) -> Result<(), ControllerStopped> {
        self.requests.send(request).map_err(|_| ControllerStopped)
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, ControllerStopped> {
        let (reply, response) = oneshot::channel();
        self.request(UiRequest::Snapshot(reply))?;
        response.await.map_err(|_| ControllerStopped)
    }

    pub async fn settings(&self) -> Result<Settings, ControllerStopped> {
        let (reply, response) = oneshot::channel();
        self.request(UiRequest::GetSettings(reply))?;
        response.await.map_err(|_| ControllerStopped)
    }

    pub async fn update_settings(
        &self,
        settings: Settings,
    ) -> Result<SettingsUpdate, ControllerStopped> {
        let (reply, response) = oneshot::channel();
        self.request(UiRequest::UpdateSettings(settings, reply))?;
        response.await.map_err(|_| ControllerStopped)
    }
}

impl WindowController {
    /// Applies one request and returns a completion to run, if any.
    pub fn handle(&mut self, request: UiRequest) -> Option<CompletionJob> {
        match request {
            UiRequest::Activate => self.activate(),
            UiRequest::PasteFromClipboard => self.paste_from_clipboard(),
            UiRequest::EditInput(text) => self.edit_input(text),
            UiRequest::EditOutput(text) => self.edit_output(text),
            UiRequest::Send => return self.send(),
            UiRequest::CompletionFinished { ticket, result } => self.finish(ticket, result),
            UiRequest::CopyResponse => self.copy_response(),
            UiRequest::Clear => self.clear(),
            UiRequest::Close => self.close(),
            UiRequest::Notify(notice) => self.notify(notice),
            UiRequest::CompleteFirstRun => self.complete_first_run(),
            UiRequest::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            UiRequest::GetSettings(reply) => {
                let _ = reply.send(self.settings().clone());
            }
            UiRequest::UpdateSettings(settings, reply) => {
                let update = self.update_settings(settings);
                let _ = reply.send(update);
            }
        }
        None
    }
}

/// Moves the controller onto its own task and returns the handle used to
/// reach it. Must be called from within a tokio runtime.
pub fn spawn_controller(
    controller: WindowController,
    completer: Arc<dyn Completer>,
) -> ControllerHandle {
    let (requests, inbox) = mpsc::unbounded_channel();
    let feedback = requests.downgrade();
    tokio::spawn(run_controller(controller, inbox, feedback, completer));
    ControllerHandle { requests }
}

async fn run_controller(
    mut controller: WindowController,
    mut inbox: UnboundedReceiver<UiRequest>,
    feedback: WeakUnboundedSender<UiRequest>,
    completer: Arc<dyn Completer>,
) {
    while let Some(request) = inbox.recv().await {
        let publish = request.changes_view();
        if let Some(job) = controller.handle(request) {
            dispatch(job, completer.clone(), &feedback);
        }
        if publish {
            controller.publish();
        }
    }
    debug!("Window controller stopped");
}

fn dispatch(job: CompletionJob, completer: Arc<dyn Completer>, feedback: &WeakUnboundedSender<UiRequest>) {
    let Some(results) = feedback.upgrade() else {
        return;
    };
    tokio::spawn(async move {
        let result = completer.complete(&job.prompt, &job.settings).await;
        let finished = UiRequest::CompletionFinished {
            ticket: job.ticket,
            result,
        };
        if results.send(finished).is_err() {
            debug!("Controller gone, dropping completion {}", job.ticket);
        }
    });
}
