//! Mempool error types.

use thiserror::Error;

/// Mempool errors.
#[derive(Error, Debug)]
pub enum MempoolError {
    /// Transaction already pooled.
    #[error("Transaction already in mempool: {0}")]
    AlreadyExists(String),

    /// Transaction not found.
    #[error("Transaction not in mempool: {0}")]
    NotFound(String),

    /// Coinbase or coinstake offered to the pool.
    #[error("Generated transaction not accepted: {0}")]
    GeneratedTransaction(String),

    /// An input is already spent by a pooled transaction.
    #[error("Input already spent in mempool: {0}")]
    DoubleSpend(String),

    /// Fee below the relay floor.
    #[error("Fee too low: {fee} < {min}")]
    FeeTooLow {
        /// Offered fee.
        fee: i64,
        /// Required minimum.
        min: i64,
    },

    /// Pool at capacity.
    #[error("Mempool is full")]
    Full,
}

/// Result type for mempool operations.
pub type MempoolResult<T> = Result<T, MempoolError>;
