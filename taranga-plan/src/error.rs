//! Error types for taranga-plan

use thiserror::Error;

/// Planning library error type
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Map I/O failed: {0}")]
    MapIo(#[from] std::io::Error),

    #[error("Malformed map file: {0}")]
    MapFormat(String),

    #[error("Unsupported map source: {0}")]
    UnsupportedMap(String),

    #[error("Planner precondition violated: {0}")]
    Precondition(String),
}

pub type Result<T> = std::result::Result<T, PlanError>;
