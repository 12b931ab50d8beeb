use std::cell::RefCell;
use std::rc::Rc;

use gtk4::prelude::*;

use voice_tasks::{RecognitionEvent, SessionUpdate, SpeechError};

use super::pipeline::dispatch_extraction;
use super::state::{AppState, AppStatus, update_status};
use crate::ui::dialogs;

/// Start a speech session, asking for microphone access first.
pub fn start_listening(state: &Rc<RefCell<AppState>>) {
    log::info!("Starting speech session");

    let result = state.borrow_mut().speech.start();
    match result {
        Ok(()) => {
            update_status(state, AppStatus::Listening, "Listening...");
            let s = state.borrow();
            if let Some(ref window) = s.window {
                window.home.listen_button.set_label("Stop");
                window.home.transcript_label.set_text("");
            }
        }
        Err(SpeechError::PermissionDenied { can_ask_again }) => {
            let s = state.borrow();
            if let Some(ref window) = s.window {
                dialogs::show_permission_dialog(
                    &window.window,
                    can_ask_again,
                    s.config.settings_uri.is_some(),
                    s.backend_sender.clone(),
                );
            }
        }
        Err(SpeechError::ModelNotReady) => {
            update_status(state, AppStatus::ModelLoading, "Speech model is still loading...");
        }
        Err(e) => {
            log::error!("Failed to start speech session: {e}");
            update_status(state, AppStatus::Idle, &format!("Mic error: {e}"));
        }
    }
}

/// End the current session; the engine delivers the final transcript.
pub fn stop_listening(state: &Rc<RefCell<AppState>>) {
    state.borrow_mut().speech.stop();
    update_status(state, AppStatus::Listening, "Finishing...");
}

/// Feed one engine event through the session state machine.
pub fn handle_recognition_event(state: &Rc<RefCell<AppState>>, event: RecognitionEvent) {
    let update = state.borrow_mut().speech.handle_event(event);
    match update {
        SessionUpdate::Started | SessionUpdate::Ignored => {}
        SessionUpdate::Transcript(text) => {
            if let Some(ref window) = state.borrow().window {
                window.home.transcript_label.set_text(&text);
            }
        }
        SessionUpdate::Completed => {
            reset_listen_button(state);
            let transcript = state.borrow_mut().speech.take_transcript();
            if let Some(transcript) = transcript {
                dispatch_extraction(state, transcript);
            }
        }
        SessionUpdate::Ended => {
            reset_listen_button(state);
            update_status(state, AppStatus::Idle, "Nothing heard");
        }
        SessionUpdate::Error(message) => {
            if let Some(ref window) = state.borrow().window {
                window.home.status_label.set_text(&format!("Recognition error: {message}"));
            }
        }
    }
}

fn reset_listen_button(state: &Rc<RefCell<AppState>>) {
    if let Some(ref window) = state.borrow().window {
        window.home.listen_button.set_label("Start");
    }
}
