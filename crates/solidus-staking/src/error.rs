//! Staking error types.
//!
//! The staking loop treats the two variants very differently: retryable
//! failures are swallowed and the next tick tries again; fatal failures
//! stop the worker and leave a persistent warning.

use thiserror::Error;

/// Staking errors.
#[derive(Error, Debug)]
pub enum StakingError {
    /// Transient condition: stale tip, mempool race, wallet briefly
    /// locked. Retried on the next tick.
    #[error("Retryable: {0}")]
    Retryable(String),

    /// Invariant violation or signing failure. Stops the worker.
    #[error("Fatal: {0}")]
    Fatal(String),
}

impl StakingError {
    /// Whether the loop may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StakingError::Retryable(_))
    }
}

impl From<solidus_wallet::WalletError> for StakingError {
    fn from(err: solidus_wallet::WalletError) -> Self {
        match err {
            // A lock can appear between the gate check and signing.
            solidus_wallet::WalletError::Locked | solidus_wallet::WalletError::MintOnly => {
                StakingError::Retryable(err.to_string())
            }
            other => StakingError::Fatal(other.to_string()),
        }
    }
}

impl From<solidus_kernel::KernelError> for StakingError {
    fn from(err: solidus_kernel::KernelError) -> Self {
        StakingError::Fatal(err.to_string())
    }
}

/// Result type for staking operations.
pub type StakingResult<T> = Result<T, StakingError>;
