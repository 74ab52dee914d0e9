//! # solidus-mempool
//!
//! Transaction memory pool.
//!
//! This crate provides:
//! - A concurrent pool keyed by txid
//! - Double-spend rejection through an input-to-transaction map
//! - Priority and fee metadata consumed by the block assembler

mod error;
mod ordering;
mod pool;

pub use error::{MempoolError, MempoolResult};
pub use ordering::TxPriority;
pub use pool::{Mempool, MempoolConfig, PooledTransaction};

/// Default maximum number of pooled transactions.
pub const DEFAULT_MAX_TXS: usize = 10_000;

/// Default transaction expiry in seconds.
pub const DEFAULT_TX_EXPIRY_SECS: i64 = 24 * 60 * 60;
