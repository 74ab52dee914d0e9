//! # solidus-chain
//!
//! Chain-side foundations for the Solidus proof-of-stake node.
//!
//! This crate provides:
//! - Network parameters (monetary units, stake age bounds, maturity)
//! - Primitive chain types (hashes, outpoints, transactions, blocks)
//! - Compact difficulty encoding and conversion
//! - Network-adjusted time from peer and NTP offsets
//! - The block index and the lock-free chain tip snapshot
//! - The `BlockSink` ingress trait consumed by the staking loop

mod block;
mod difficulty;
mod error;
mod index;
mod params;
mod timedata;
mod types;

pub use block::{Block, BlockHeader, OutPoint, Transaction, TxIn, TxOut};
pub use difficulty::{bits_to_difficulty, bits_to_target, target_to_bits};
pub use error::{ChainError, ChainResult};
pub use index::{BlockAccept, BlockIndex, BlockSink, ChainTip, ChainView};
pub use params::{ChainParams, CENT, COIN, ONE_DAY};
pub use types::{
    extract_destination, format_coin, parse_coin, script_for_address, sha256d, Address, Hash256,
};
pub use timedata::{TimeData, TIME_OFFSET_UNKNOWN};
