//! RPC error codes.
//!
//! The integer codes are a stable contract with wallet tooling; wallet
//! errors map onto them here and nowhere else.

use serde_json::{json, Value};
use solidus_wallet::WalletError;
use thiserror::Error;

/// Miscellaneous failure.
pub const RPC_MISC_ERROR: i32 = -1;
/// Parameter has the wrong type.
pub const RPC_TYPE_ERROR: i32 = -3;
/// Invalid address or key.
pub const RPC_INVALID_ADDRESS_OR_KEY: i32 = -5;
/// Unknown method.
pub const RPC_METHOD_NOT_FOUND: i32 = -32601;
/// Invalid parameter value.
pub const RPC_INVALID_PARAMETER: i32 = -8;
/// Generic wallet failure.
pub const RPC_WALLET_ERROR: i32 = -4;
/// Not enough funds.
pub const RPC_WALLET_INSUFFICIENT_FUNDS: i32 = -6;
/// `*` where a specific account is required.
pub const RPC_WALLET_INVALID_ACCOUNT_NAME: i32 = -11;
/// Key pool exhausted.
pub const RPC_WALLET_KEYPOOL_RAN_OUT: i32 = -12;
/// Wallet locked or unlocked for minting only.
pub const RPC_WALLET_UNLOCK_NEEDED: i32 = -13;
/// Wrong passphrase.
pub const RPC_WALLET_PASSPHRASE_INCORRECT: i32 = -14;
/// Encrypt/decrypt called in the wrong state.
pub const RPC_WALLET_WRONG_ENC_STATE: i32 = -15;
/// Unlock called while already unlocked.
pub const RPC_WALLET_ALREADY_UNLOCKED: i32 = -17;
/// Backend failure.
pub const RPC_DATABASE_ERROR: i32 = -20;
/// Amount below the dust floor.
pub const RPC_AMOUNT_TOO_SMALL: i32 = -101;

/// An RPC failure: stable code plus message.
#[derive(Error, Debug, Clone)]
#[error("{message} (code {code})")]
pub struct RpcError {
    /// Stable error code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
}

impl RpcError {
    /// Error with an explicit code.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Miscellaneous error.
    pub fn misc(message: impl Into<String>) -> Self {
        Self::new(RPC_MISC_ERROR, message)
    }

    /// Type error for a malformed parameter.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(RPC_TYPE_ERROR, message)
    }

    /// Invalid parameter value.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(RPC_INVALID_PARAMETER, message)
    }

    /// The wire representation.
    pub fn to_value(&self) -> Value {
        json!({ "code": self.code, "message": self.message })
    }
}

impl From<WalletError> for RpcError {
    fn from(err: WalletError) -> Self {
        let message = err.to_string();
        let code = match err {
            WalletError::InvalidAddress(_) => RPC_INVALID_ADDRESS_OR_KEY,
            WalletError::InvalidParameter(_) => RPC_INVALID_PARAMETER,
            WalletError::InvalidAccountName => RPC_WALLET_INVALID_ACCOUNT_NAME,
            WalletError::Locked | WalletError::MintOnly => RPC_WALLET_UNLOCK_NEEDED,
            WalletError::IncorrectPassphrase => RPC_WALLET_PASSPHRASE_INCORRECT,
            WalletError::WrongEncState(_) => RPC_WALLET_WRONG_ENC_STATE,
            WalletError::InsufficientFunds => RPC_WALLET_INSUFFICIENT_FUNDS,
            WalletError::AmountTooSmall => RPC_AMOUNT_TOO_SMALL,
            WalletError::KeypoolRanOut => RPC_WALLET_KEYPOOL_RAN_OUT,
            WalletError::Database(_) => RPC_DATABASE_ERROR,
            WalletError::Chain(_) => RPC_INVALID_ADDRESS_OR_KEY,
            WalletError::Mempool(_) | WalletError::Other(_) => RPC_WALLET_ERROR,
        };
        Self::new(code, message)
    }
}

impl From<solidus_chain::ChainError> for RpcError {
    fn from(err: solidus_chain::ChainError) -> Self {
        Self::new(RPC_INVALID_ADDRESS_OR_KEY, err.to_string())
    }
}

/// Result type for RPC handlers.
pub type RpcResult<T> = Result<T, RpcError>;
