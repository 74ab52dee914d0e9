//! # solidus-wallet
//!
//! Wallet for the Solidus proof-of-stake node.
//!
//! This crate provides:
//! - Key management: generation, key pool, passphrase encryption with a
//!   minting-only unlock mode, and the single re-locking worker
//! - The ownership-filtered UTXO view the staking loop draws from,
//!   including the reserve-balance floor
//! - Account bookkeeping: the monotone accounting ledger, balance
//!   tallies with confirmation-depth and watch-only filters, and the
//!   merged transaction stream behind the list RPCs
//! - Transaction building: send, send-many, coin merging, rebroadcast
//! - Kernel-record decomposition for staking probability estimates

mod accounts;
mod builder;
mod error;
mod keystore;
mod relock;
mod reporting;
mod tx;
mod wallet;

pub use accounts::{AccountLedger, AccountingEntry};
pub use error::{WalletError, WalletResult};
pub use keystore::{verify_signature, KeyStore, WalletKey};
pub use relock::Relocker;
pub use reporting::{OrderedItem, TransactionRecord};
pub use tx::{MineFilter, MineType, OwnedOutput, WalletTx};
pub use wallet::{Wallet, WalletBalances};
