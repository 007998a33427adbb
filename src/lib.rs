//! Core library surface for the Day Rater journal.
//!
//! The binary only wires configuration, logging, and the terminal UI together;
//! everything that touches data lives here so it can be exercised without a
//! terminal.
pub mod calendar;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod insights;
pub mod logging;
pub mod models;
pub mod ui;

/// Settings resolved from the environment at start-up.
pub use config::AppConfig;

/// Opening the store runs the schema setup and seeds the built-in rows.
pub use db::{open_database, open_in_memory};

pub use error::StoreError;

/// The domain types other layers pass around.
pub use models::{Category, DailyRating, FamilyMember, RatingValue, RelationshipType};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
