//! Binary entry point: resolve the data directory, start the log file, open
//! the journal, and hand control to the Ratatui event loop until the user
//! quits.
use chrono::Local;
use day_rater::logging::init_tracing;
use day_rater::{open_database, run_app, App, AppConfig};

/// Returning a `Result` sends fatal start-up problems (an unwritable data
/// directory, a corrupt database) to the terminal instead of a blank screen.
fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config)?;
    tracing::info!(data_dir = %config.data_dir().display(), "starting day rater");

    let conn = open_database(&config.db_path())?;
    let mut app = App::new(conn, config, Local::now().date_naive())?;
    let result = run_app(&mut app);

    if let Err(err) = &result {
        tracing::error!(error = %err, "day rater exited with an error");
    }
    result
}
