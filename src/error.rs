use thiserror::Error;

use crate::io::store::EntryId;

#[derive(Error, Debug)]
pub enum DftuError {
    /// Unsupported or missing structural metadata.
    #[error("Configuration Error: {0}")]
    Configuration(String),

    /// Matrix or array dimensions inconsistent with the expected shape.
    #[error("Shape Error: {0}")]
    Shape(String),

    /// A value breaks a population constraint.
    #[error("Constraint Error: {0}")]
    Constraint(String),

    #[error("Entry {0} not found in the population store")]
    EntryNotFound(EntryId),

    #[error("Input Deck Error: {0}")]
    Abinit(#[from] abinit::AbinitError),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type DftuResult<T> = Result<T, DftuError>;
