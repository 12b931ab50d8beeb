pub mod dialogs;
pub mod home;
pub mod tasks;
pub mod window;
