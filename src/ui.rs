//! Ratatui front-end for the journal. `app` owns navigation and drawing,
//! `screens` holds the per-view state loaded from the store, `forms` the
//! popup editors, and `terminal` the raw-mode event loop.

mod app;
mod forms;
mod helpers;
mod screens;
mod terminal;

pub use app::App;
pub use terminal::run_app;
