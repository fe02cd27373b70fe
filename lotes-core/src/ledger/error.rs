//! Ledger error types.

use thiserror::Error;

use crate::models::MAX_VARIETIES;

/// Errors raised while decoding, validating or editing the ledger.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Lot {lot} would hold {count} varieties (max {max})", max = MAX_VARIETIES)]
    TooManyVarieties { lot: String, count: usize },

    #[error("Variety name cannot be empty")]
    EmptyVarietyName,

    #[error("Variety '{name}' not found in lot {lot}")]
    VarietyNotFound { lot: String, name: String },

    #[error("Row {row}: invalid {column} '{value}': {reason}")]
    InvalidField {
        row: usize,
        column: &'static str,
        value: String,
        reason: String,
    },

    #[error("Lot not found: {0}")]
    LotNotFound(String),

    #[error("Lot {id} already exists at {location}")]
    DuplicateLot { id: String, location: String },

    #[error("Week {0} is out of range (1-22)")]
    InvalidWeek(u8),

    #[error("Lot number must be positive")]
    InvalidLotNumber,

    #[error("Malformed ledger: {0}")]
    Csv(#[from] csv::Error),
}
