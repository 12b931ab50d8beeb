use std::cell::RefCell;
use std::rc::Rc;

use gtk4::prelude::*;

use voice_tasks::StoreError;

use super::model::load_whisper_model;
use super::pipeline::{dispatch_extraction, on_extraction_complete};
use super::recording::{handle_recognition_event, start_listening, stop_listening};
use super::state::{AppState, AppStatus, BackendEvent, ListenAction, update_status};
use crate::ui::{dialogs, tasks};

/// Handle a backend event. This is the core state machine.
pub fn handle_backend_event(state: &Rc<RefCell<AppState>>, event: BackendEvent) {
    match event {
        BackendEvent::ListenToggled | BackendEvent::RetryPermission => {
            let action = {
                let s = state.borrow();
                s.status.listen_action(s.speech.is_recognizing())
            };
            match action {
                ListenAction::Start => start_listening(state),
                ListenAction::Stop => stop_listening(state),
                ListenAction::Wait => {
                    log::info!("Listen ignored: speech model not ready");
                    if let Some(ref window) = state.borrow().window {
                        window
                            .home
                            .status_label
                            .set_text("Speech model is still loading...");
                    }
                }
            }
        }
        BackendEvent::Recognition(event) => handle_recognition_event(state, event),
        BackendEvent::RunText(text) => {
            if let Some(ref window) = state.borrow().window {
                window.home.entry.set_text("");
            }
            dispatch_extraction(state, text);
        }
        BackendEvent::ExtractionComplete(result) => on_extraction_complete(state, result),
        BackendEvent::AddTask(text) => {
            let added = state.borrow().hub.add_task(&text);
            match added {
                Ok(Some(_)) => {
                    if let Some(ref window) = state.borrow().window {
                        window.tasks.entry.set_text("");
                    }
                }
                Ok(None) => {}
                Err(e) => report_store_error(state, &e),
            }
        }
        BackendEvent::DeleteTask(id) => {
            let result = state.borrow().hub.delete_task(&id);
            if let Err(e) = result {
                report_store_error(state, &e);
            }
        }
        BackendEvent::ToggleTask(id) => {
            let result = state.borrow().hub.toggle_completion(&id);
            if let Err(e) = result {
                report_store_error(state, &e);
            }
        }
        BackendEvent::TasksChanged(task_list) => {
            let s = state.borrow();
            if let Some(ref window) = s.window {
                tasks::render_tasks(&window.tasks, &task_list, &s.backend_sender);
            }
        }
        BackendEvent::TasksPageShown => {
            let (hub, policy) = {
                let s = state.borrow();
                (s.hub.clone(), s.config.corrupt_store_policy)
            };
            if let Err(e) = hub.reload(policy) {
                log::error!("Task store reload failed: {e}");
                show_store_error(state, &store_error_message(StoreAction::Load, &e));
            }
        }
        BackendEvent::OpenSettings => {
            let uri = state.borrow().config.settings_uri.clone();
            if let Some(uri) = uri {
                if let Err(e) = gtk4::gio::AppInfo::launch_default_for_uri(
                    &uri,
                    None::<&gtk4::gio::AppLaunchContext>,
                ) {
                    log::warn!("Failed to open settings: {e}");
                }
            }
        }
        BackendEvent::ModelDownloadProgress(downloaded, total) => {
            if let Some(ref window) = state.borrow().window {
                let progress = &window.home.progress_bar;
                progress.set_visible(true);
                if total > 0 {
                    progress.set_fraction(downloaded as f64 / total as f64);
                    let mb_done = downloaded as f64 / 1_048_576.0;
                    let mb_total = total as f64 / 1_048_576.0;
                    progress.set_text(Some(&format!(
                        "Downloading speech model: {mb_done:.1} / {mb_total:.1} MB"
                    )));
                } else {
                    progress.pulse();
                }
            }
        }
        BackendEvent::ModelDownloadComplete => {
            if let Some(ref window) = state.borrow().window {
                window.home.progress_bar.set_visible(false);
            }
            load_whisper_model(state);
        }
        BackendEvent::ModelReady => {
            log::info!("Whisper model ready");
            update_status(state, AppStatus::Idle, "Idle");
        }
        BackendEvent::ProcessingError(err) => {
            log::error!("Processing error: {err}");
            if let Some(ref window) = state.borrow().window {
                window.home.progress_bar.set_visible(false);
            }
            update_status(state, AppStatus::Idle, &format!("Error: {err}"));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreAction {
    Load,
    Save,
}

fn store_error_message(action: StoreAction, error: &StoreError) -> String {
    match action {
        StoreAction::Load => format!("Failed to load tasks: {error}"),
        StoreAction::Save => format!("Failed to save tasks: {error}"),
    }
}

fn report_store_error(state: &Rc<RefCell<AppState>>, error: &StoreError) {
    log::error!("Task store error: {error}");
    show_store_error(state, &store_error_message(StoreAction::Save, error));
}

fn show_store_error(state: &Rc<RefCell<AppState>>, message: &str) {
    if let Some(ref window) = state.borrow().window {
        dialogs::show_alert(&window.window, "Error", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corrupt() -> StoreError {
        StoreError::Corrupt {
            key: "tasks".into(),
            reason: "expected value".into(),
        }
    }

    #[test]
    fn reload_failures_say_load() {
        let message = store_error_message(StoreAction::Load, &corrupt());
        assert!(message.starts_with("Failed to load tasks:"), "{message}");
    }

    #[test]
    fn write_failures_say_save() {
        let message = store_error_message(StoreAction::Save, &corrupt());
        assert!(message.starts_with("Failed to save tasks:"), "{message}");
    }
}
