//! Wallet error types.
//!
//! The variants mirror the stable RPC error taxonomy: invalid input,
//! authorization, funds, encryption state, backend, and the transient
//! kind the staking loop swallows.

use thiserror::Error;

/// Wallet errors.
#[derive(Error, Debug)]
pub enum WalletError {
    /// Malformed address, key or parameter.
    #[error("Invalid address or key: {0}")]
    InvalidAddress(String),

    /// Structurally valid but unacceptable parameter.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// `*` used where a specific account is required.
    #[error("Invalid account name")]
    InvalidAccountName,

    /// Wallet is locked.
    #[error("Wallet is locked, unlock it with walletpassphrase first")]
    Locked,

    /// Wallet unlocked for block minting only.
    #[error("Wallet is unlocked for block minting only")]
    MintOnly,

    /// Passphrase did not match.
    #[error("The wallet passphrase entered was incorrect")]
    IncorrectPassphrase,

    /// Encrypt/decrypt called in the wrong encryption state.
    #[error("Wrong wallet encryption state: {0}")]
    WrongEncState(String),

    /// Not enough spendable funds.
    #[error("Insufficient funds")]
    InsufficientFunds,

    /// Amount below the dust floor.
    #[error("Send amount too small")]
    AmountTooSmall,

    /// Key pool exhausted while locked.
    #[error("Keypool ran out, refill it first")]
    KeypoolRanOut,

    /// Backend failure.
    #[error("Database error: {0}")]
    Database(String),

    /// Generic wallet failure.
    #[error("Wallet error: {0}")]
    Other(String),

    /// Chain-level error.
    #[error("Chain error: {0}")]
    Chain(#[from] solidus_chain::ChainError),

    /// Mempool rejection while committing a transaction.
    #[error("Mempool error: {0}")]
    Mempool(#[from] solidus_mempool::MempoolError),
}

/// Result type for wallet operations.
pub type WalletResult<T> = Result<T, WalletError>;
