use gtk4::prelude::*;
use libadwaita::prelude::*;

use super::home::{self, HomeWidgets};
use super::tasks::{self, TasksWidgets};
use crate::app::BackendEvent;

const TASKS_PAGE: &str = "tasks";

/// Handles returned from building the main window.
pub struct WindowWidgets {
    pub window: libadwaita::ApplicationWindow,
    pub home: HomeWidgets,
    pub tasks: TasksWidgets,
}

/// Build the main window with the Home and Tasks pages.
pub fn build_window(
    app: &libadwaita::Application,
    backend_sender: async_channel::Sender<BackendEvent>,
) -> WindowWidgets {
    let window = libadwaita::ApplicationWindow::builder()
        .application(app)
        .title("Voice Tasks")
        .default_width(420)
        .default_height(640)
        .build();

    let toolbar_view = libadwaita::ToolbarView::new();
    let header = libadwaita::HeaderBar::new();
    toolbar_view.add_top_bar(&header);

    let home = home::build_home_page(backend_sender.clone());
    let tasks = tasks::build_tasks_page(backend_sender.clone());

    let stack = libadwaita::ViewStack::new();
    stack.add_titled_with_icon(&home.root, Some("home"), "Home", "go-home-symbolic");
    stack.add_titled_with_icon(
        &tasks.root,
        Some(TASKS_PAGE),
        "Tasks",
        "object-select-symbolic",
    );

    // Tasks page re-reads the store whenever it is shown
    let sender_for_switch = backend_sender;
    stack.connect_visible_child_name_notify(move |stack| {
        if stack.visible_child_name().as_deref() == Some(TASKS_PAGE) {
            let _ = sender_for_switch.try_send(BackendEvent::TasksPageShown);
        }
    });

    let switcher_bar = libadwaita::ViewSwitcherBar::builder()
        .stack(&stack)
        .reveal(true)
        .build();

    toolbar_view.set_content(Some(&stack));
    toolbar_view.add_bottom_bar(&switcher_bar);
    window.set_content(Some(&toolbar_view));

    WindowWidgets {
        window,
        home,
        tasks,
    }
}
