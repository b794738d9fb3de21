//! Linux/Wayland adapters for the collaborator traits.

pub mod command_wallpaper;
pub mod file_access;
pub mod power;
pub mod process_video;
pub mod shell;
pub mod wlr_displays;
