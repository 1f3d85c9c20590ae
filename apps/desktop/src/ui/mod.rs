//! Text UI: the event loop on the UI thread and screen rendering.

pub mod app;
pub mod render;

pub use app::DesktopApp;
