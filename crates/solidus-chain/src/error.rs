//! Chain error types.

use thiserror::Error;

/// Chain errors.
#[derive(Error, Debug)]
pub enum ChainError {
    /// Malformed hash string.
    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    /// Malformed or wrong-version address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Unparseable amount string.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Compact target that expands to zero or carries the sign bit.
    #[error("Invalid compact target: {0:#010x}")]
    InvalidTarget(u32),

    /// Referenced block is not in the index.
    #[error("Unknown block: {0}")]
    UnknownBlock(String),
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;
