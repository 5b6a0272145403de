pub mod accent;
pub mod audio;
pub mod download;
pub mod setup;
