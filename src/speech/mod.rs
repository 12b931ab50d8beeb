//! Speech capture: recognition options, engine events and the session
//! state machine that turns one recording into at most one transcript.

mod session;
mod whisper;

use serde::{Deserialize, Serialize};

pub use session::{SessionState, SessionUpdate, SpeechSession};
pub use whisper::{WhisperEngine, WhisperModelSlot};

/// Options handed to the engine when a session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionOptions {
    /// Locale such as `en-US`.
    pub lang: String,
    pub interim_results: bool,
    pub max_alternatives: u32,
    /// Keep listening through pauses until stopped explicitly.
    pub continuous: bool,
    pub requires_on_device_recognition: bool,
    pub adds_punctuation: bool,
    /// Phrases that bias recognition, e.g. names used in tasks.
    pub contextual_strings: Vec<String>,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            lang: "en-US".into(),
            interim_results: true,
            max_alternatives: 1,
            continuous: false,
            requires_on_device_recognition: false,
            adds_punctuation: true,
            contextual_strings: Vec::new(),
        }
    }
}

/// Events emitted by a recognition engine during a session.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    Start,
    /// Latest transcript of everything heard so far.
    Result { transcript: String, is_final: bool },
    End,
    Error(String),
}

/// Outcome of a microphone permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionStatus {
    pub granted: bool,
    /// Whether asking again may succeed; `false` means only the system
    /// settings can grant access.
    pub can_ask_again: bool,
}

impl PermissionStatus {
    pub const GRANTED: Self = Self {
        granted: true,
        can_ask_again: true,
    };
}

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("microphone permission denied")]
    PermissionDenied { can_ask_again: bool },
    #[error("speech model is not loaded yet")]
    ModelNotReady,
    #[error("recognition engine error: {0}")]
    Engine(String),
}

/// A device speech recognizer.
///
/// `start` begins capturing and reports progress through `events`; every
/// started session ends with exactly one `RecognitionEvent::End`. `stop`
/// must be idempotent.
pub trait RecognitionEngine {
    fn request_permissions(&mut self) -> PermissionStatus;

    fn start(
        &mut self,
        options: &RecognitionOptions,
        events: async_channel::Sender<RecognitionEvent>,
    ) -> Result<(), SpeechError>;

    fn stop(&mut self);
}
