//! Wallet-side transaction records and ownership filters.

use serde::{Deserialize, Serialize};
use solidus_chain::{Hash256, Transaction};
use std::collections::BTreeMap;

/// Ownership class of an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MineType {
    /// Not ours.
    No,
    /// Address imported without the private key.
    WatchOnly,
    /// We hold the key.
    Spendable,
}

/// Ownership filter for tallies and enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MineFilter {
    /// Count spendable outputs.
    pub spendable: bool,
    /// Count watch-only outputs.
    pub watch_only: bool,
}

impl MineFilter {
    /// Spendable outputs only.
    pub const SPENDABLE: MineFilter = MineFilter {
        spendable: true,
        watch_only: false,
    };

    /// Watch-only outputs only.
    pub const WATCH_ONLY: MineFilter = MineFilter {
        spendable: false,
        watch_only: true,
    };

    /// Spendable, plus watch-only when the flag is set.
    pub fn with_watch_only(watch_only: bool) -> MineFilter {
        MineFilter {
            spendable: true,
            watch_only,
        }
    }

    /// Whether an ownership class passes this filter.
    pub fn matches(&self, mine: MineType) -> bool {
        match mine {
            MineType::No => false,
            MineType::WatchOnly => self.watch_only,
            MineType::Spendable => self.spendable,
        }
    }
}

/// A transaction as the wallet tracks it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTx {
    /// The transaction itself.
    pub tx: Transaction,
    /// Cached id.
    pub txid: Hash256,
    /// Block containing the transaction, if confirmed.
    pub block_hash: Option<Hash256>,
    /// Height of that block.
    pub block_height: Option<u32>,
    /// Timestamp of that block; zero while unconfirmed.
    pub block_time: i64,
    /// Byte offset of the transaction inside its block, for the kernel.
    pub tx_offset: u32,
    /// When the wallet first saw the transaction.
    pub time_received: i64,
    /// Whether any input is ours.
    pub from_me: bool,
    /// Account debited by this transaction.
    pub from_account: String,
    /// Free-form metadata; known keys are `comment`, `to`, `from`, `n`,
    /// but the set is open.
    pub map_value: BTreeMap<String, String>,
    /// Position in the wallet's global ordering.
    pub order_pos: u64,
    /// Per-output spent markers.
    pub spent: Vec<bool>,
}

impl WalletTx {
    /// Track a new transaction.
    pub fn new(tx: Transaction, time_received: i64, order_pos: u64) -> Self {
        let txid = tx.txid();
        let spent = vec![false; tx.vout.len()];
        Self {
            tx,
            txid,
            block_hash: None,
            block_height: None,
            block_time: 0,
            tx_offset: 0,
            time_received,
            from_me: false,
            from_account: String::new(),
            map_value: BTreeMap::new(),
            order_pos,
            spent,
        }
    }

    /// Confirmation depth against the given best height; zero while
    /// unconfirmed.
    pub fn depth(&self, best_height: u32) -> i32 {
        match self.block_height {
            Some(height) => (best_height as i64 - height as i64 + 1).max(0) as i32,
            None => 0,
        }
    }

    /// Blocks left before a generated transaction matures; zero for
    /// regular transactions.
    pub fn blocks_to_maturity(&self, best_height: u32, maturity: i32) -> i32 {
        if !self.tx.is_coinbase() && !self.tx.is_coinstake() {
            return 0;
        }
        (maturity - self.depth(best_height)).max(0)
    }

    /// Effective timestamp used for ordering and coin age.
    pub fn tx_time(&self) -> i64 {
        self.tx.n_time as i64
    }

    /// Whether the output at `vout` is marked spent.
    pub fn is_spent(&self, vout: usize) -> bool {
        self.spent.get(vout).copied().unwrap_or(true)
    }
}

/// A confirmed, owned, unspent output as the staking loop sees it.
#[derive(Debug, Clone)]
pub struct OwnedOutput {
    /// Transaction carrying the output.
    pub txid: Hash256,
    /// Output index.
    pub vout: u32,
    /// Value in sub-units.
    pub value: i64,
    /// Locking script.
    pub script_pub_key: Vec<u8>,
    /// Hash of the containing block.
    pub block_hash: Hash256,
    /// Timestamp of the containing block.
    pub block_time: u32,
    /// Timestamp of the transaction.
    pub tx_time: u32,
    /// Byte offset of the transaction inside its block.
    pub tx_offset: u32,
    /// Confirmation depth.
    pub depth: i32,
    /// Whether the source transaction is a coinbase.
    pub is_coinbase: bool,
    /// Whether the source transaction is a coinstake.
    pub is_coinstake: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use solidus_chain::{OutPoint, TxIn, TxOut};

    fn tracked() -> WalletTx {
        let mut tx = Transaction::new(900);
        tx.vin
            .push(TxIn::from_outpoint(OutPoint::new(Hash256([9u8; 32]), 1)));
        tx.vout.push(TxOut::new(5, vec![1]));
        tx.vout.push(TxOut::new(7, vec![2]));
        WalletTx::new(tx, 1_000, 3)
    }

    #[test]
    fn test_depth() {
        let mut wtx = tracked();
        assert_eq!(wtx.depth(100), 0);

        wtx.block_height = Some(98);
        assert_eq!(wtx.depth(100), 3);
        assert_eq!(wtx.depth(97), 0);
    }

    #[test]
    fn test_maturity_only_for_generated() {
        let mut wtx = tracked();
        wtx.block_height = Some(10);
        assert_eq!(wtx.blocks_to_maturity(12, 100), 0);

        wtx.tx.vin[0].prevout = OutPoint::null();
        assert!(wtx.tx.is_coinbase());
        assert_eq!(wtx.blocks_to_maturity(12, 100), 97);
    }

    #[test]
    fn test_filter_matching() {
        assert!(MineFilter::SPENDABLE.matches(MineType::Spendable));
        assert!(!MineFilter::SPENDABLE.matches(MineType::WatchOnly));
        assert!(MineFilter::with_watch_only(true).matches(MineType::WatchOnly));
        assert!(!MineFilter::with_watch_only(true).matches(MineType::No));
    }

    #[test]
    fn test_spent_flags_sized_to_outputs() {
        let wtx = tracked();
        assert_eq!(wtx.spent.len(), 2);
        assert!(!wtx.is_spent(0));
        assert!(wtx.is_spent(99));
    }
}
