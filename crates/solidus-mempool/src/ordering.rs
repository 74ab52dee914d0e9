//! Transaction ordering by priority and fee.

use std::cmp::Ordering;

/// Selection key for a pooled transaction.
///
/// Priority is `sum(input value × input depth) / size`; fee is per
/// kilobyte. The assembler starts in priority order and switches to fee
/// order once the high-priority budget is spent.
#[derive(Debug, Clone)]
pub struct TxPriority {
    /// Transaction id bytes.
    pub txid: [u8; 32],
    /// Coin-depth priority.
    pub priority: f64,
    /// Fee per kilobyte.
    pub fee_per_kb: f64,
    /// When true, fee-per-KB is the primary key.
    pub by_fee: bool,
}

impl TxPriority {
    /// New key in priority-first mode.
    pub fn new(txid: [u8; 32], priority: f64, fee_per_kb: f64) -> Self {
        Self {
            txid,
            priority,
            fee_per_kb,
            by_fee: false,
        }
    }

    /// Flip the primary key to fee-per-KB.
    pub fn with_by_fee(mut self, by_fee: bool) -> Self {
        self.by_fee = by_fee;
        self
    }
}

impl PartialEq for TxPriority {
    fn eq(&self, other: &Self) -> bool {
        self.txid == other.txid
    }
}

impl Eq for TxPriority {}

impl PartialOrd for TxPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TxPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        let (primary, secondary) = if self.by_fee {
            (
                self.fee_per_kb.total_cmp(&other.fee_per_kb),
                self.priority.total_cmp(&other.priority),
            )
        } else {
            (
                self.priority.total_cmp(&other.priority),
                self.fee_per_kb.total_cmp(&other.fee_per_kb),
            )
        };
        primary.then(secondary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    fn id(byte: u8) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[0] = byte;
        out
    }

    #[test]
    fn test_priority_order() {
        let mut heap = BinaryHeap::new();
        heap.push(TxPriority::new(id(1), 10.0, 100.0));
        heap.push(TxPriority::new(id(2), 30.0, 1.0));
        heap.push(TxPriority::new(id(3), 20.0, 50.0));

        assert_eq!(heap.pop().unwrap().txid, id(2));
        assert_eq!(heap.pop().unwrap().txid, id(3));
        assert_eq!(heap.pop().unwrap().txid, id(1));
    }

    #[test]
    fn test_fee_order() {
        let mut heap = BinaryHeap::new();
        heap.push(TxPriority::new(id(1), 10.0, 100.0).with_by_fee(true));
        heap.push(TxPriority::new(id(2), 30.0, 1.0).with_by_fee(true));
        heap.push(TxPriority::new(id(3), 20.0, 50.0).with_by_fee(true));

        assert_eq!(heap.pop().unwrap().txid, id(1));
        assert_eq!(heap.pop().unwrap().txid, id(3));
        assert_eq!(heap.pop().unwrap().txid, id(2));
    }

    #[test]
    fn test_ties_fall_through_to_secondary() {
        let a = TxPriority::new(id(1), 10.0, 5.0);
        let b = TxPriority::new(id(2), 10.0, 7.0);
        assert!(b > a);
    }
}
