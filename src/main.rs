mod app;
mod ui;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use gtk4::prelude::*;

use app::{AppState, BackendEvent};
use voice_tasks::{Config, FileStorage, TaskHub, TaskStore};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Voice Tasks starting");

    let config = Config::load();
    if let Err(e) = config.require_api_key() {
        log::error!("{e}");
        eprintln!("voice-tasks: {e}");
        std::process::exit(1);
    }

    let storage = Arc::new(FileStorage::new(FileStorage::default_dir()));
    let store = TaskStore::new(storage, config.storage_key.clone());
    let hub = match TaskHub::open(store, config.corrupt_store_policy) {
        Ok(hub) => hub,
        Err(e) => {
            log::error!("Failed to open task store: {e}");
            eprintln!("voice-tasks: {e}");
            std::process::exit(1);
        }
    };

    let application = libadwaita::Application::builder()
        .application_id("com.github.voice-tasks")
        .build();

    application.connect_activate(move |app| on_activate(app, config.clone(), hub.clone()));
    application.run();
}

fn on_activate(app: &libadwaita::Application, config: Config, hub: TaskHub) {
    // Create async channels for backend → UI communication
    let (backend_tx, backend_rx) = async_channel::unbounded::<BackendEvent>();
    let (speech_tx, speech_rx) = async_channel::unbounded();

    let state = match AppState::new(config, hub, backend_tx, speech_tx) {
        Ok(state) => Rc::new(RefCell::new(state)),
        Err(e) => {
            log::error!("Failed to initialize: {e}");
            app.quit();
            return;
        }
    };

    let window = ui::window::build_window(app, state.borrow().backend_sender.clone());
    window.window.present();
    state.borrow_mut().window = Some(window);

    // Forward engine events to the backend event channel
    {
        let sender = state.borrow().backend_sender.clone();
        gtk4::glib::spawn_future_local(async move {
            while let Ok(event) = speech_rx.recv().await {
                let _ = sender.send(BackendEvent::Recognition(event)).await;
            }
        });
    }

    // Forward task snapshots so both pages render the same collection
    {
        let tasks_rx = state.borrow().hub.subscribe();
        let sender = state.borrow().backend_sender.clone();
        gtk4::glib::spawn_future_local(async move {
            while let Ok(tasks) = tasks_rx.recv().await {
                let _ = sender.send(BackendEvent::TasksChanged(tasks)).await;
            }
        });
    }

    // Attach backend event handler
    {
        let state_clone = state.clone();
        gtk4::glib::spawn_future_local(async move {
            while let Ok(event) = backend_rx.recv().await {
                app::handle_backend_event(&state_clone, event);
            }
        });
    }

    // Start whisper model download/load
    app::ensure_whisper_model(&state);
}
