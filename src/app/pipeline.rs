use std::cell::RefCell;
use std::rc::Rc;

use gtk4::prelude::*;

use voice_tasks::extractor::ExtractionResult;
use voice_tasks::ExtractError;

use super::state::{AppState, AppStatus, BackendEvent, update_status};
use crate::ui::dialogs;

/// Dispatch task extraction on the tokio runtime.
///
/// Blank text is rejected here, without a network call.
pub fn dispatch_extraction(state: &Rc<RefCell<AppState>>, text: String) {
    if text.trim().is_empty() {
        show_extract_error(state, &ExtractError::EmptyInput);
        return;
    }

    update_status(state, AppStatus::Extracting, "Finding tasks...");

    let s = state.borrow();
    let extractor = s.extractor.clone();
    let sender = s.backend_sender.clone();

    s.tokio_rt.spawn(async move {
        let result = extractor.extract(&text).await;
        let _ = sender.send(BackendEvent::ExtractionComplete(result)).await;
    });
}

/// Apply a finished extraction: append tasks through the hub and show the
/// model's message.
pub fn on_extraction_complete(
    state: &Rc<RefCell<AppState>>,
    result: Result<ExtractionResult, ExtractError>,
) {
    let result = match result {
        Ok(result) => result,
        Err(e) => {
            log::error!("Extraction failed: {e}");
            update_status(state, AppStatus::Idle, "Idle");
            show_extract_error(state, &e);
            return;
        }
    };

    let appended = state.borrow().hub.append_extracted(&result);
    match appended {
        Ok(ids) => {
            log::info!("Added {} task(s) from speech", ids.len());
            update_status(state, AppStatus::Idle, "Idle");
            if let Some(ref window) = state.borrow().window {
                window.home.message_label.set_text(&result.message);
                window.home.message_label.set_visible(!result.message.is_empty());
            }
        }
        Err(e) => {
            log::error!("Failed to save extracted tasks: {e}");
            update_status(state, AppStatus::Idle, "Idle");
            if let Some(ref window) = state.borrow().window {
                dialogs::show_alert(&window.window, "Error", &format!("Failed to save tasks: {e}"));
            }
        }
    }
}

fn show_extract_error(state: &Rc<RefCell<AppState>>, error: &ExtractError) {
    if let Some(ref window) = state.borrow().window {
        dialogs::show_alert(&window.window, error.title(), error.user_message());
    }
}
