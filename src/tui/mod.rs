//! Terminal front-end for the optimization wizard.
//!
//! Raw-mode crossterm rendering, no TUI framework: the four wizard screens
//! are fixed layouts redrawn when the model changes. `app` owns the event
//! loop and terminal lifecycle; `render` is the stateless draw layer.

pub mod app;
pub mod render;

pub use app::run;
