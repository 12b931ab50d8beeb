use gtk4::prelude::*;
use libadwaita::prelude::*;

use voice_tasks::Task;

use crate::app::BackendEvent;

/// Handles for the Tasks page.
pub struct TasksWidgets {
    pub root: gtk4::Box,
    pub entry: gtk4::Entry,
    pub list: gtk4::ListBox,
    pub empty_label: gtk4::Label,
}

pub fn build_tasks_page(backend_sender: async_channel::Sender<BackendEvent>) -> TasksWidgets {
    let root = gtk4::Box::new(gtk4::Orientation::Vertical, 12);
    root.set_margin_start(16);
    root.set_margin_end(16);
    root.set_margin_top(12);
    root.set_margin_bottom(12);

    let entry = gtk4::Entry::builder()
        .placeholder_text("Enter task")
        .hexpand(true)
        .build();
    let add_button = gtk4::Button::with_label("Add Task");
    add_button.add_css_class("suggested-action");

    let send_add = {
        let entry = entry.clone();
        move || {
            let _ = backend_sender.try_send(BackendEvent::AddTask(entry.text().to_string()));
        }
    };
    {
        let send_add = send_add.clone();
        entry.connect_activate(move |_| send_add());
    }
    add_button.connect_clicked(move |_| send_add());

    let input_row = gtk4::Box::new(gtk4::Orientation::Horizontal, 6);
    input_row.append(&entry);
    input_row.append(&add_button);
    root.append(&input_row);

    let list = gtk4::ListBox::new();
    list.set_selection_mode(gtk4::SelectionMode::None);
    list.add_css_class("boxed-list");

    let empty_label = gtk4::Label::new(Some("No tasks yet."));
    empty_label.add_css_class("dim-label");

    let content = gtk4::Box::new(gtk4::Orientation::Vertical, 12);
    content.append(&empty_label);
    content.append(&list);

    let scrolled = gtk4::ScrolledWindow::builder()
        .hscrollbar_policy(gtk4::PolicyType::Never)
        .vexpand(true)
        .child(&content)
        .build();
    root.append(&scrolled);

    TasksWidgets {
        root,
        entry,
        list,
        empty_label,
    }
}

/// Replace the list contents with `tasks`, in collection order.
pub fn render_tasks(
    widgets: &TasksWidgets,
    tasks: &[Task],
    backend_sender: &async_channel::Sender<BackendEvent>,
) {
    widgets.list.remove_all();
    widgets.empty_label.set_visible(tasks.is_empty());
    widgets.list.set_visible(!tasks.is_empty());

    for task in tasks {
        widgets.list.append(&build_task_row(task, backend_sender));
    }
}

fn build_task_row(
    task: &Task,
    backend_sender: &async_channel::Sender<BackendEvent>,
) -> libadwaita::ActionRow {
    let row = libadwaita::ActionRow::builder()
        .title(glib_escape(&task.text))
        .build();

    let check = gtk4::CheckButton::new();
    check.set_active(task.completed);
    check.set_valign(gtk4::Align::Center);
    {
        let sender = backend_sender.clone();
        let id = task.id.clone();
        check.connect_toggled(move |_| {
            let _ = sender.try_send(BackendEvent::ToggleTask(id.clone()));
        });
    }
    row.add_prefix(&check);
    row.set_activatable_widget(Some(&check));

    if task.completed {
        row.add_css_class("dim-label");
    }

    let delete_btn = gtk4::Button::from_icon_name("user-trash-symbolic");
    delete_btn.set_valign(gtk4::Align::Center);
    delete_btn.set_tooltip_text(Some("Delete"));
    delete_btn.add_css_class("flat");
    {
        let sender = backend_sender.clone();
        let id = task.id.clone();
        delete_btn.connect_clicked(move |_| {
            let _ = sender.try_send(BackendEvent::DeleteTask(id.clone()));
        });
    }
    row.add_suffix(&delete_btn);

    row
}

/// Row titles are Pango markup; show the task text literally.
fn glib_escape(text: &str) -> String {
    gtk4::glib::markup_escape_text(text).to_string()
}
