//! TUI Widget components.

pub mod alert;
pub mod content_area;
pub mod input_area;
pub mod model_modal;
pub mod notice;
pub mod status_bar;

pub use alert::AlertPopup;
pub use content_area::{content_inner, ContentArea};
pub use input_area::{input_height, InputArea};
pub use model_modal::ModelModal;
pub use notice::ServerNotice;
pub use status_bar::StatusBar;
