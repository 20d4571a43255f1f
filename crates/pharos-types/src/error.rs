//! Error types for pharos-types crate.
//!
//! Covers conversion failures from raw platform state codes.

use thiserror::Error;

/// Errors raised when decoding raw platform state codes.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StateCodeError {
    /// Code does not map to any known connection state.
    #[error("unknown connection state code: {0}")]
    UnknownConnectionState(u8),

    /// Code does not map to any known application state.
    #[error("unknown application state code: {0}")]
    UnknownApplicationState(u8),
}

/// Result type for state code conversions.
pub type TypesResult<T> = Result<T, StateCodeError>;
