//! Domain failures raised by the persistence layer. SQL plumbing errors still
//! travel as `anyhow::Error` with context attached; the variants here are the
//! root causes the UI (and tests) care to tell apart.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// An update or lookup addressed a row that does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    /// A uniqueness or business rule would be broken by the write.
    #[error("{0}")]
    Constraint(String),
    /// User input rejected before touching the database.
    #[error("{0}")]
    Invalid(String),
    /// A stored enum name we do not recognize.
    #[error("unrecognized {kind} value '{value}'")]
    Decode { kind: &'static str, value: String },
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        StoreError::NotFound { entity, id }
    }
}
