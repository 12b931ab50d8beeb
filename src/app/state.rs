use std::sync::{Arc, OnceLock};
use std::time::Duration;

use gtk4::prelude::*;

use voice_tasks::extractor::ExtractionResult;
use voice_tasks::speech::{WhisperEngine, WhisperModelSlot};
use voice_tasks::{
    Config, ExtractError, GeminiClient, RecognitionEvent, SpeechSession, Task, TaskExtractor,
    TaskHub, TaskId,
};

use crate::ui::window::WindowWidgets;

/// Events sent from background tasks and widgets to the GTK main thread.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    ListenToggled,
    Recognition(RecognitionEvent),
    RunText(String),
    ExtractionComplete(Result<ExtractionResult, ExtractError>),
    AddTask(String),
    DeleteTask(TaskId),
    ToggleTask(TaskId),
    TasksChanged(Vec<Task>),
    TasksPageShown,
    RetryPermission,
    OpenSettings,
    ModelDownloadProgress(u64, u64),
    ModelDownloadComplete,
    ModelReady,
    ProcessingError(String),
}

/// Application status.
#[derive(Debug, Clone, PartialEq)]
pub enum AppStatus {
    ModelLoading,
    Idle,
    Listening,
    Extracting,
}

/// What a press of the listen button should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenAction {
    Start,
    Stop,
    /// The speech model is not ready; only report it.
    Wait,
}

impl AppStatus {
    /// Decide how to react to the listen button in this status.
    pub fn listen_action(&self, recognizing: bool) -> ListenAction {
        if recognizing {
            ListenAction::Stop
        } else if *self == AppStatus::ModelLoading {
            ListenAction::Wait
        } else {
            ListenAction::Start
        }
    }
}

/// Central application state. Lives on the GTK main thread inside Rc<RefCell<>>.
pub struct AppState {
    pub status: AppStatus,
    pub config: Config,
    pub hub: TaskHub,
    pub extractor: TaskExtractor,
    pub speech: SpeechSession,
    pub whisper_model: WhisperModelSlot,
    pub tokio_rt: tokio::runtime::Runtime,
    pub backend_sender: async_channel::Sender<BackendEvent>,

    // UI handles
    pub window: Option<WindowWidgets>,
}

impl AppState {
    pub fn new(
        config: Config,
        hub: TaskHub,
        sender: async_channel::Sender<BackendEvent>,
        speech_events: async_channel::Sender<RecognitionEvent>,
    ) -> std::io::Result<Self> {
        let tokio_rt = tokio::runtime::Runtime::new()?;

        let model = GeminiClient::new(config.gemini_api_key.clone(), config.gemini_model.clone());
        let extractor = TaskExtractor::new(Arc::new(model));

        let whisper_model: WhisperModelSlot = Arc::new(OnceLock::new());
        let engine = WhisperEngine::new(
            whisper_model.clone(),
            tokio_rt.handle().clone(),
            Duration::from_millis(config.silence_timeout_ms),
        );
        let speech = SpeechSession::new(Box::new(engine), config.speech.clone(), speech_events);

        Ok(Self {
            status: AppStatus::ModelLoading,
            config,
            hub,
            extractor,
            speech,
            whisper_model,
            tokio_rt,
            backend_sender: sender,
            window: None,
        })
    }
}

/// Helper to update status label and state.
pub fn update_status(
    state: &std::rc::Rc<std::cell::RefCell<AppState>>,
    status: AppStatus,
    label_text: &str,
) {
    let mut s = state.borrow_mut();
    s.status = status;
    if let Some(ref window) = s.window {
        window.home.status_label.set_text(label_text);
    }
}
