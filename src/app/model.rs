use std::cell::RefCell;
use std::rc::Rc;

use voice_tasks::transcriber;

use super::state::{AppState, AppStatus, BackendEvent, update_status};

/// Attempt to download and/or load the whisper model.
pub fn ensure_whisper_model(state: &Rc<RefCell<AppState>>) {
    if transcriber::model_exists() {
        load_whisper_model(state);
    } else {
        log::info!("Whisper model not found, starting download");
        update_status(state, AppStatus::ModelLoading, "Downloading speech model...");
        let sender = state.borrow().backend_sender.clone();
        let progress_sender = sender.clone();

        state.borrow().tokio_rt.spawn(async move {
            let result = transcriber::download_model(move |downloaded, total| {
                let _ = progress_sender.try_send(BackendEvent::ModelDownloadProgress(downloaded, total));
            })
            .await;

            match result {
                Ok(()) => {
                    let _ = sender.send(BackendEvent::ModelDownloadComplete).await;
                }
                Err(e) => {
                    let _ = sender
                        .send(BackendEvent::ProcessingError(format!(
                            "Model download failed: {e}"
                        )))
                        .await;
                }
            }
        });
    }
}

/// Load the whisper model in a blocking task and fill the shared slot.
pub fn load_whisper_model(state: &Rc<RefCell<AppState>>) {
    log::info!("Loading whisper model...");
    update_status(state, AppStatus::ModelLoading, "Loading speech model...");

    let sender = state.borrow().backend_sender.clone();
    let slot = state.borrow().whisper_model.clone();

    state.borrow().tokio_rt.spawn(async move {
        let result = tokio::task::spawn_blocking(transcriber::load_model).await;

        let event = match result {
            Ok(Ok(ctx)) => {
                if slot.set(ctx).is_err() {
                    log::warn!("Whisper model was already loaded");
                }
                BackendEvent::ModelReady
            }
            Ok(Err(e)) => BackendEvent::ProcessingError(format!("Failed to load model: {e}")),
            Err(e) => BackendEvent::ProcessingError(format!("Model load panicked: {e}")),
        };
        let _ = sender.send(event).await;
    });
}
