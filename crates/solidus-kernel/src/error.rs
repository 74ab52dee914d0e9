//! Kernel error types.

use thiserror::Error;

/// Kernel errors.
#[derive(Error, Debug)]
pub enum KernelError {
    /// Output value unusable for staking.
    #[error("Invalid stake value: {0}")]
    InvalidValue(i64),

    /// Chain-level error (bad compact target).
    #[error("Chain error: {0}")]
    Chain(#[from] solidus_chain::ChainError),
}

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;
