//! Transaction pool implementation.

use crate::{MempoolError, MempoolResult, DEFAULT_MAX_TXS, DEFAULT_TX_EXPIRY_SECS};
use dashmap::DashMap;
use solidus_chain::{Hash256, OutPoint, Transaction};
use tracing::{debug, warn};

/// Mempool configuration.
#[derive(Debug, Clone)]
pub struct MempoolConfig {
    /// Maximum number of transactions.
    pub max_transactions: usize,
    /// Transaction expiry in seconds.
    pub tx_expiry_secs: i64,
    /// Minimum fee per kilobyte.
    pub min_fee_per_kb: i64,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_transactions: DEFAULT_MAX_TXS,
            tx_expiry_secs: DEFAULT_TX_EXPIRY_SECS,
            min_fee_per_kb: solidus_chain::CENT,
        }
    }
}

/// Stored transaction with the metadata the assembler needs.
#[derive(Debug, Clone)]
pub struct PooledTransaction {
    /// The transaction.
    pub tx: Transaction,
    /// Fee paid (inputs minus outputs), as computed on admission.
    pub fee: i64,
    /// Coin-depth priority, `sum(value_in × depth) / size`.
    pub priority: f64,
    /// Arrival timestamp in seconds.
    pub arrival_time: i64,
}

impl PooledTransaction {
    /// Fee per kilobyte at the serialized size.
    pub fn fee_per_kb(&self) -> f64 {
        let size = self.tx.size();
        if size == 0 {
            return 0.0;
        }
        self.fee as f64 / (size as f64 / 1000.0)
    }
}

/// Transaction memory pool.
pub struct Mempool {
    config: MempoolConfig,
    /// Transactions by id.
    transactions: DashMap<Hash256, PooledTransaction>,
    /// Spent-outpoint to spender mapping for double-spend rejection.
    input_to_tx: DashMap<OutPoint, Hash256>,
}

impl Mempool {
    /// New pool with the given configuration.
    pub fn new(config: MempoolConfig) -> Self {
        Self {
            config,
            transactions: DashMap::new(),
            input_to_tx: DashMap::new(),
        }
    }

    /// New pool with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(MempoolConfig::default())
    }

    /// Admit a transaction.
    pub fn add(&self, pooled: PooledTransaction) -> MempoolResult<()> {
        let txid = pooled.tx.txid();
        if self.transactions.contains_key(&txid) {
            return Err(MempoolError::AlreadyExists(txid.to_string()));
        }
        if pooled.tx.is_coinbase() || pooled.tx.is_coinstake() {
            return Err(MempoolError::GeneratedTransaction(txid.to_string()));
        }
        if self.transactions.len() >= self.config.max_transactions {
            return Err(MempoolError::Full);
        }

        let size = pooled.tx.size().max(1);
        let min_fee = self.config.min_fee_per_kb * ((size as i64 + 999) / 1000);
        if pooled.fee < min_fee {
            return Err(MempoolError::FeeTooLow {
                fee: pooled.fee,
                min: min_fee,
            });
        }

        for txin in &pooled.tx.vin {
            if self.input_to_tx.contains_key(&txin.prevout) {
                return Err(MempoolError::DoubleSpend(format!(
                    "{}:{}",
                    txin.prevout.txid, txin.prevout.vout
                )));
            }
        }

        for txin in &pooled.tx.vin {
            self.input_to_tx.insert(txin.prevout, txid);
        }
        self.transactions.insert(txid, pooled);
        debug!(count = self.transactions.len(), txid = %txid, "Transaction admitted");
        Ok(())
    }

    /// Remove a transaction by id.
    pub fn remove(&self, txid: &Hash256) -> MempoolResult<PooledTransaction> {
        let (_, pooled) = self
            .transactions
            .remove(txid)
            .ok_or_else(|| MempoolError::NotFound(txid.to_string()))?;
        for txin in &pooled.tx.vin {
            self.input_to_tx.remove(&txin.prevout);
        }
        debug!(count = self.transactions.len(), txid = %txid, "Transaction removed");
        Ok(pooled)
    }

    /// Drop every transaction included in a connected block.
    pub fn remove_confirmed(&self, txs: &[Transaction]) {
        for tx in txs {
            let _ = self.remove(&tx.txid());
        }
    }

    /// Drop transactions older than the expiry.
    pub fn expire(&self, now: i64) -> usize {
        let expired: Vec<Hash256> = self
            .transactions
            .iter()
            .filter(|entry| now - entry.arrival_time > self.config.tx_expiry_secs)
            .map(|entry| *entry.key())
            .collect();
        let count = expired.len();
        for txid in expired {
            let _ = self.remove(&txid);
        }
        if count > 0 {
            warn!(count, "Expired stale mempool transactions");
        }
        count
    }

    /// Look up a transaction.
    pub fn get(&self, txid: &Hash256) -> Option<PooledTransaction> {
        self.transactions.get(txid).map(|r| r.clone())
    }

    /// Whether a transaction is pooled.
    pub fn contains(&self, txid: &Hash256) -> bool {
        self.transactions.contains_key(txid)
    }

    /// Whether an outpoint is already spent by a pooled transaction.
    pub fn is_input_spent(&self, outpoint: &OutPoint) -> bool {
        self.input_to_tx.contains_key(outpoint)
    }

    /// Number of pooled transactions.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Snapshot of every pooled transaction, in no particular order.
    pub fn snapshot(&self) -> Vec<PooledTransaction> {
        self.transactions.iter().map(|e| e.clone()).collect()
    }
}
