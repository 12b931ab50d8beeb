use gtk4::prelude::*;
use libadwaita::prelude::*;

use crate::app::BackendEvent;

/// Show a dismissable message.
pub fn show_alert(parent: &libadwaita::ApplicationWindow, heading: &str, body: &str) {
    let dialog = libadwaita::AlertDialog::builder()
        .heading(heading)
        .body(body)
        .build();
    dialog.add_response("ok", "OK");

    let parent_widget: Option<&gtk4::Widget> = Some(parent.upcast_ref());
    dialog.choose(parent_widget, None::<&gtk4::gio::Cancellable>, |_response_id| {});
}

/// Explain a denied microphone permission.
///
/// When access may be requested again the dialog offers a retry; otherwise
/// it links to the system settings if a settings URI is configured.
pub fn show_permission_dialog(
    parent: &libadwaita::ApplicationWindow,
    can_ask_again: bool,
    has_settings_link: bool,
    backend_sender: async_channel::Sender<BackendEvent>,
) {
    let dialog = if can_ask_again {
        let dialog = libadwaita::AlertDialog::builder()
            .heading("Permission Required")
            .body("We need access to the microphone to use speech recognition.")
            .build();
        dialog.add_response("cancel", "Cancel");
        dialog.add_response("retry", "Try Again");
        dialog.set_default_response(Some("retry"));
        dialog
    } else {
        let dialog = libadwaita::AlertDialog::builder()
            .heading("Permission Denied")
            .body("Microphone access has been denied. Please enable it in your device settings.")
            .build();
        dialog.add_response("cancel", "Cancel");
        if has_settings_link {
            dialog.add_response("settings", "Open Settings");
            dialog.set_default_response(Some("settings"));
        }
        dialog
    };
    dialog.set_close_response("cancel");

    let parent_widget: Option<&gtk4::Widget> = Some(parent.upcast_ref());
    dialog.choose(
        parent_widget,
        None::<&gtk4::gio::Cancellable>,
        move |response_id| match response_id.as_str() {
            "retry" => {
                let _ = backend_sender.try_send(BackendEvent::RetryPermission);
            }
            "settings" => {
                let _ = backend_sender.try_send(BackendEvent::OpenSettings);
            }
            _ => {}
        },
    );
}
