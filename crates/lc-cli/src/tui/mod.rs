//! Terminal User Interface module using ratatui.
//!
//! Renders the chat shell, the prompt input and the model-management modal.

mod app;
pub mod events;
pub mod scroll;
mod ui;
mod widgets;

pub use app::run_tui;
