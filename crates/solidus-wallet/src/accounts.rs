//! Account ledger.
//!
//! Accounts are wallet-local labels with an internal double-entry
//! ledger. Every entry and every wallet transaction takes a position
//! from one monotone counter, so the merged history has a total order.

use crate::{WalletError, WalletResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// One signed ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountingEntry {
    /// Position in the wallet's global ordering.
    pub order_pos: u64,
    /// Account the entry applies to.
    pub account: String,
    /// Signed amount: credit positive, debit negative.
    pub credit_debit: i64,
    /// Entry timestamp.
    pub time: i64,
    /// Counterpart account.
    pub other_account: String,
    /// Free-form comment.
    pub comment: String,
}

/// The in-wallet accounting ledger.
pub struct AccountLedger {
    entries: RwLock<Vec<AccountingEntry>>,
    next_order_pos: AtomicU64,
}

impl AccountLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_order_pos: AtomicU64::new(0),
        }
    }

    /// Take the next global order position.
    pub fn next_order_pos(&self) -> u64 {
        self.next_order_pos.fetch_add(1, Ordering::SeqCst)
    }

    /// Append an entry with a fresh order position.
    fn write_entry(
        &self,
        account: &str,
        credit_debit: i64,
        time: i64,
        other_account: &str,
        comment: &str,
    ) {
        let entry = AccountingEntry {
            order_pos: self.next_order_pos(),
            account: account.to_string(),
            credit_debit,
            time,
            other_account: other_account.to_string(),
            comment: comment.to_string(),
        };
        self.entries.write().push(entry);
    }

    /// Move an amount between two accounts as a debit/credit pair.
    ///
    /// Both entries are appended under one write or not at all; the net
    /// ledger sum stays zero.
    pub fn move_between(
        &self,
        from: &str,
        to: &str,
        amount: i64,
        time: i64,
        comment: &str,
    ) -> WalletResult<()> {
        if from == "*" || to == "*" {
            return Err(WalletError::InvalidAccountName);
        }
        if amount <= 0 {
            return Err(WalletError::AmountTooSmall);
        }
        self.write_entry(from, -amount, time, to, comment);
        self.write_entry(to, amount, time, from, comment);
        debug!(from, to, amount, "Accounting move recorded");
        Ok(())
    }

    /// Signed sum of entries for one account.
    pub fn credit_debit(&self, account: &str) -> i64 {
        self.entries
            .read()
            .iter()
            .filter(|e| e.account == account)
            .map(|e| e.credit_debit)
            .sum()
    }

    /// Signed sum across every account; zero when the ledger only holds
    /// balanced moves.
    pub fn total(&self) -> i64 {
        self.entries.read().iter().map(|e| e.credit_debit).sum()
    }

    /// Entries for one account, or every entry for `*`.
    pub fn entries_for(&self, account: &str) -> Vec<AccountingEntry> {
        let all = account == "*";
        self.entries
            .read()
            .iter()
            .filter(|e| all || e.account == account)
            .cloned()
            .collect()
    }

    /// Every account name mentioned by the ledger.
    pub fn account_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .iter()
            .map(|e| e.account.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

impl Default for AccountLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_writes_balanced_pair() {
        let ledger = AccountLedger::new();
        ledger.move_between("A", "B", 20, 1_000, "rent").unwrap();

        assert_eq!(ledger.credit_debit("A"), -20);
        assert_eq!(ledger.credit_debit("B"), 20);
        assert_eq!(ledger.total(), 0);
    }

    #[test]
    fn test_move_round_trip_restores_balances() {
        let ledger = AccountLedger::new();
        ledger.move_between("A", "B", 20, 1_000, "").unwrap();
        ledger.move_between("B", "A", 20, 1_001, "").unwrap();

        assert_eq!(ledger.credit_debit("A"), 0);
        assert_eq!(ledger.credit_debit("B"), 0);
        assert_eq!(ledger.total(), 0);
        assert_eq!(ledger.entries_for("*").len(), 4);
    }

    #[test]
    fn test_order_positions_monotone() {
        let ledger = AccountLedger::new();
        ledger.move_between("A", "B", 5, 1_000, "").unwrap();
        ledger.move_between("B", "C", 5, 1_001, "").unwrap();

        let entries = ledger.entries_for("*");
        for pair in entries.windows(2) {
            assert!(pair[0].order_pos < pair[1].order_pos);
        }
    }

    #[test]
    fn test_wildcard_account_rejected() {
        let ledger = AccountLedger::new();
        assert!(matches!(
            ledger.move_between("*", "B", 5, 0, ""),
            Err(WalletError::InvalidAccountName)
        ));
        assert!(matches!(
            ledger.move_between("A", "*", 5, 0, ""),
            Err(WalletError::InvalidAccountName)
        ));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let ledger = AccountLedger::new();
        assert!(ledger.move_between("A", "B", 0, 0, "").is_err());
        assert!(ledger.move_between("A", "B", -3, 0, "").is_err());
    }

    #[test]
    fn test_account_names() {
        let ledger = AccountLedger::new();
        ledger.move_between("savings", "checking", 5, 0, "").unwrap();
        let names = ledger.account_names();
        assert_eq!(names, vec!["checking".to_string(), "savings".to_string()]);
    }
}
