//! Error types for the override engine.

use crate::path::FieldPath;
use crate::record::RecordId;

use thiserror::Error;

/// Errors raised by hierarchy and field operations.
///
/// Every variant is reported before any mutation is applied, so a failed call
/// leaves the session exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A record names itself as its own prototype.
    #[error("record '{0}' cannot be its own prototype")]
    SelfReference(RecordId),

    /// Following the candidate prototype's chain leads back to the record.
    #[error("prototype cycle detected for '{record}': {}", format_chain(chain))]
    CycleDetected {
        record: RecordId,
        /// Chain walked from the candidate prototype, ending at the repeated record.
        chain: Vec<RecordId>,
    },

    /// An instance was named as a prototype while instances skip the cycle
    /// check.
    #[error("record '{record}' cannot inherit from instance '{prototype}'")]
    InstancePrototype { record: RecordId, prototype: RecordId },

    /// Two records (or a record and a value) disagree on shape.
    #[error("schema mismatch for '{record}': {detail}")]
    SchemaMismatch { record: RecordId, detail: String },

    /// The record is not present in the hierarchy index.
    #[error("unknown record '{0}'")]
    UnknownRecord(RecordId),

    /// The address does not exist in the record's schema.
    #[error("record '{record}' has no field '{path}'")]
    UnknownField { record: RecordId, path: FieldPath },

    /// A textual field path could not be parsed.
    #[error("invalid field path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// A rebuild enumeration listed the same record twice.
    #[error("record '{0}' listed more than once")]
    DuplicateRecord(RecordId),
}

fn format_chain(chain: &[RecordId]) -> String {
    chain
        .iter()
        .map(RecordId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
