// Engine Errors
//
// The four failure kinds the engine distinguishes. Contract violations
// are programming bugs and carry the offending detail; cancellation is a
// cooperative signal, not a failure of the previous Analysis.

use flint_core::format::FormatError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A broken internal contract, e.g. a callback finalized twice or a
    /// recorded class with no API entry.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// The persisted Analysis does not match the expected shape. Callers
    /// should treat this as "no previous Analysis".
    #[error(transparent)]
    Format(#[from] FormatError),

    /// The compiler signaled cooperative cancellation.
    #[error("compilation cancelled")]
    Cancelled,

    /// Any other failure reported by the compile function.
    #[error("compiler failure")]
    Compiler(#[source] anyhow::Error),
}

impl EngineError {
    pub fn contract(message: impl Into<String>) -> EngineError {
        EngineError::ContractViolation(message.into())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
