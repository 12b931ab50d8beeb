use gtk4::prelude::*;
use libadwaita::prelude::*;

use crate::app::BackendEvent;

/// Handles for the Home page: dictation and free-text extraction.
pub struct HomeWidgets {
    pub root: gtk4::Box,
    pub status_label: gtk4::Label,
    pub listen_button: gtk4::Button,
    pub transcript_label: gtk4::Label,
    pub entry: gtk4::Entry,
    pub message_label: gtk4::Label,
    pub progress_bar: gtk4::ProgressBar,
}

pub fn build_home_page(backend_sender: async_channel::Sender<BackendEvent>) -> HomeWidgets {
    let root = gtk4::Box::new(gtk4::Orientation::Vertical, 12);
    root.set_margin_start(16);
    root.set_margin_end(16);
    root.set_margin_top(12);
    root.set_margin_bottom(12);

    // --- Status group ---
    let status_group = libadwaita::PreferencesGroup::new();
    status_group.set_title("Status");

    let status_row = libadwaita::ActionRow::builder()
        .title("Current State")
        .build();
    let status_label = gtk4::Label::new(Some("Starting..."));
    status_label.add_css_class("dim-label");
    status_row.add_suffix(&status_label);
    status_group.add(&status_row);
    root.append(&status_group);

    let progress_bar = gtk4::ProgressBar::new();
    progress_bar.set_visible(false);
    progress_bar.set_show_text(true);
    root.append(&progress_bar);

    // --- Dictation ---
    let listen_button = gtk4::Button::builder()
        .label("Start")
        .halign(gtk4::Align::Center)
        .build();
    listen_button.add_css_class("suggested-action");
    listen_button.add_css_class("pill");
    {
        let sender = backend_sender.clone();
        listen_button.connect_clicked(move |_| {
            let _ = sender.try_send(BackendEvent::ListenToggled);
        });
    }
    root.append(&listen_button);

    let transcript_label = gtk4::Label::new(None);
    transcript_label.set_wrap(true);
    transcript_label.set_selectable(true);
    let transcript_scroll = gtk4::ScrolledWindow::builder()
        .hscrollbar_policy(gtk4::PolicyType::Never)
        .min_content_height(120)
        .vexpand(true)
        .child(&transcript_label)
        .build();
    root.append(&transcript_scroll);

    // --- Typed input ---
    let entry = gtk4::Entry::builder()
        .placeholder_text("Type your message here...")
        .build();
    let run_button = gtk4::Button::with_label("Run");

    let send_run = {
        let sender = backend_sender;
        let entry = entry.clone();
        move || {
            let _ = sender.try_send(BackendEvent::RunText(entry.text().to_string()));
        }
    };
    {
        let send_run = send_run.clone();
        entry.connect_activate(move |_| send_run());
    }
    run_button.connect_clicked(move |_| send_run());

    let input_row = gtk4::Box::new(gtk4::Orientation::Horizontal, 6);
    entry.set_hexpand(true);
    input_row.append(&entry);
    input_row.append(&run_button);
    root.append(&input_row);

    let message_label = gtk4::Label::new(None);
    message_label.set_wrap(true);
    message_label.set_justify(gtk4::Justification::Center);
    message_label.add_css_class("dim-label");
    message_label.set_visible(false);
    root.append(&message_label);

    HomeWidgets {
        root,
        status_label,
        listen_button,
        transcript_label,
        entry,
        message_label,
        progress_bar,
    }
}
