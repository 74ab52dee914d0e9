//! Rows behind the list RPCs, and kernel-record decomposition.
//!
//! `listtransactions` walks the merged stream of wallet transactions and
//! accounting entries in reverse global order; `listsinceblock` filters
//! by depth against a starting block. Both produce [`TransactionRecord`]
//! rows that the RPC layer serializes as-is.

use crate::tx::{MineFilter, MineType, WalletTx};
use crate::wallet::Wallet;
use crate::AccountingEntry;
use solidus_chain::Hash256;
use solidus_kernel::KernelRecord;

/// One row of a transaction listing.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    /// Account the row belongs to.
    pub account: String,
    /// Destination address, when one decodes.
    pub address: Option<String>,
    /// Category: `send`, `receive`, `generate`, `immature`, `orphan`,
    /// `conflicted` or `move`.
    pub category: String,
    /// Signed amount.
    pub amount: i64,
    /// Fee, present on send rows.
    pub fee: Option<i64>,
    /// Confirmation count; absent for moves.
    pub confirmations: Option<i32>,
    /// Whether the source is a coinbase/coinstake.
    pub generated: bool,
    /// Transaction id; absent for moves.
    pub txid: Option<Hash256>,
    /// Containing block.
    pub block_hash: Option<Hash256>,
    /// Row timestamp.
    pub time: i64,
    /// Counterpart account of a move.
    pub other_account: Option<String>,
    /// Free-form comment.
    pub comment: Option<String>,
    /// Whether a watch-only address is involved.
    pub involves_watch_only: bool,
    /// Position in the wallet's global ordering.
    pub order_pos: u64,
}

/// One element of the merged history stream.
pub enum OrderedItem {
    /// A tracked wallet transaction.
    Tx(WalletTx),
    /// An accounting entry.
    Entry(AccountingEntry),
}

impl OrderedItem {
    fn order_pos(&self) -> u64 {
        match self {
            OrderedItem::Tx(wtx) => wtx.order_pos,
            OrderedItem::Entry(entry) => entry.order_pos,
        }
    }
}

impl Wallet {
    /// Rows for one wallet transaction under an account filter, in the
    /// generated / sent / received order.
    pub fn tx_records(
        &self,
        wtx: &WalletTx,
        account: &str,
        min_depth: i32,
        filter: MineFilter,
    ) -> Vec<TransactionRecord> {
        let all_accounts = account == "*";
        let best_height = self.chain().height();
        let amounts = self.get_amounts(wtx, filter);
        let depth = wtx.depth(best_height);
        let involves_watch_only = wtx.tx.vout.iter().any(|out| {
            self.is_mine_script(&out.script_pub_key) == MineType::WatchOnly
        });
        let comment = wtx.map_value.get("comment").cloned();
        let mut rows = Vec::new();

        // Generated value is attributed to the default account.
        let generated_total = amounts.generated_immature + amounts.generated_mature;
        if generated_total != 0 && (all_accounts || account.is_empty()) {
            let (category, amount) = if amounts.generated_immature != 0 {
                if depth > 0 {
                    ("immature", amounts.generated_immature)
                } else {
                    ("orphan", amounts.generated_immature)
                }
            } else {
                ("generate", amounts.generated_mature)
            };
            rows.push(TransactionRecord {
                account: String::new(),
                address: None,
                category: category.to_string(),
                amount,
                fee: None,
                confirmations: Some(depth),
                generated: true,
                txid: Some(wtx.txid),
                block_hash: wtx.block_hash,
                time: wtx.tx_time(),
                other_account: None,
                comment: comment.clone(),
                involves_watch_only,
                order_pos: wtx.order_pos,
            });
        }

        if (!amounts.sent.is_empty() || amounts.fee != 0)
            && (all_accounts || account == wtx.from_account)
        {
            for (address, value) in &amounts.sent {
                rows.push(TransactionRecord {
                    account: wtx.from_account.clone(),
                    address: address.as_ref().map(|a| a.to_string()),
                    category: "send".to_string(),
                    amount: -value,
                    fee: Some(-amounts.fee),
                    confirmations: Some(depth),
                    generated: false,
                    txid: Some(wtx.txid),
                    block_hash: wtx.block_hash,
                    time: wtx.tx_time(),
                    other_account: None,
                    comment: comment.clone(),
                    involves_watch_only,
                    order_pos: wtx.order_pos,
                });
            }
        }

        if depth >= min_depth {
            for (address, value) in &amounts.received {
                let owner = address
                    .as_ref()
                    .and_then(|a| self.account_of(a))
                    .unwrap_or_default();
                if !(all_accounts || owner == account) {
                    continue;
                }
                rows.push(TransactionRecord {
                    account: owner,
                    address: address.as_ref().map(|a| a.to_string()),
                    category: "receive".to_string(),
                    amount: *value,
                    fee: None,
                    confirmations: Some(depth),
                    generated: false,
                    txid: Some(wtx.txid),
                    block_hash: wtx.block_hash,
                    time: wtx.tx_time(),
                    other_account: None,
                    comment: comment.clone(),
                    involves_watch_only,
                    order_pos: wtx.order_pos,
                });
            }
        }
        rows
    }

    fn entry_record(&self, entry: &AccountingEntry) -> TransactionRecord {
        TransactionRecord {
            account: entry.account.clone(),
            address: None,
            category: "move".to_string(),
            amount: entry.credit_debit,
            fee: None,
            confirmations: None,
            generated: false,
            txid: None,
            block_hash: None,
            time: entry.time,
            other_account: Some(entry.other_account.clone()),
            comment: Some(entry.comment.clone()),
            involves_watch_only: false,
            order_pos: entry.order_pos,
        }
    }

    /// The merged history: up to `count` rows for `account` after
    /// skipping `from`, oldest first.
    pub fn list_transactions(
        &self,
        account: &str,
        count: usize,
        from: usize,
        watch_only: bool,
    ) -> Vec<TransactionRecord> {
        let filter = MineFilter::with_watch_only(watch_only);

        let mut items: Vec<OrderedItem> = self
            .all_txs()
            .into_iter()
            .map(OrderedItem::Tx)
            .chain(
                self.ledger()
                    .entries_for(if account == "*" { "*" } else { account })
                    .into_iter()
                    .map(OrderedItem::Entry),
            )
            .collect();
        // Newest first.
        items.sort_by(|a, b| b.order_pos().cmp(&a.order_pos()));

        let mut rows = Vec::new();
        for item in items {
            match item {
                OrderedItem::Tx(wtx) => {
                    rows.extend(self.tx_records(&wtx, account, 0, filter))
                }
                OrderedItem::Entry(entry) => {
                    if account == "*" || entry.account == account {
                        rows.push(self.entry_record(&entry));
                    }
                }
            }
            if rows.len() >= count + from {
                break;
            }
        }

        let from = from.min(rows.len());
        let until = (from + count).min(rows.len());
        let mut page: Vec<TransactionRecord> = rows[from..until].to_vec();
        page.reverse();
        page
    }

    /// Transactions since a block at `since_height`, plus the rows for
    /// everything unconfirmed. `None` lists the whole history.
    pub fn list_since_block(
        &self,
        since_height: Option<u32>,
        watch_only: bool,
    ) -> Vec<TransactionRecord> {
        let filter = MineFilter::with_watch_only(watch_only);
        let best_height = self.chain().height();
        let cutoff_depth = since_height.map(|h| (best_height as i64 - h as i64 + 1) as i32);

        let mut rows = Vec::new();
        for wtx in self.all_txs() {
            let include = match cutoff_depth {
                Some(cutoff) => wtx.depth(best_height) < cutoff,
                None => true,
            };
            if include {
                rows.extend(self.tx_records(&wtx, "*", 0, filter));
            }
        }
        rows.sort_by_key(|row| row.order_pos);
        rows
    }

    /// Hash reported as `lastblock` for a target confirmation count.
    pub fn last_block_for_confirms(&self, target_confirms: u32) -> Option<Hash256> {
        let chain = self.chain();
        let best = chain.best_index()?;
        if target_confirms <= 1 {
            return Some(best.hash);
        }
        let target_height = (best.height as i64 + 1 - target_confirms as i64).max(0) as u32;
        let mut cursor = best;
        while cursor.height > target_height {
            cursor = chain.get(&cursor.prev_hash)?;
        }
        Some(cursor.hash)
    }

    /// Decompose the wallet's transactions into kernel records for
    /// staking probability estimates.
    ///
    /// Shallow coinbases and untrusted transactions are hidden, matching
    /// what the staking overview shows.
    pub fn kernel_records(&self) -> Vec<KernelRecord> {
        let best_height = self.chain().height();
        let mut records = Vec::new();
        for wtx in self.all_txs() {
            if wtx.tx.is_coinbase() && wtx.depth(best_height) < 2 {
                continue;
            }
            if !self.is_trusted(&wtx) {
                continue;
            }
            for (idx, out) in wtx.tx.vout.iter().enumerate() {
                if self.is_mine_script(&out.script_pub_key) == MineType::No {
                    continue;
                }
                let address = solidus_chain::extract_destination(&out.script_pub_key)
                    .map(|a| a.to_string())
                    .or_else(|| wtx.map_value.get("to").cloned())
                    .unwrap_or_default();
                records.push(KernelRecord::new(
                    wtx.txid,
                    wtx.tx_time(),
                    address,
                    out.value,
                    idx as u32,
                    wtx.is_spent(idx),
                ));
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::testutil::*;
    use solidus_chain::{Address, COIN};

    #[test]
    fn test_list_transactions_order_and_paging() {
        let wallet = wallet_with_chain(10);
        let address = wallet.new_address("A").unwrap();
        credit_output(&wallet, &address, 10 * COIN, 3);
        credit_output(&wallet, &address, 20 * COIN, 5);
        wallet
            .ledger()
            .move_between("A", "B", COIN, 9_000, "m")
            .unwrap();

        let rows = wallet.list_transactions("*", 10, 0, false);
        // Two receives plus two move legs, oldest first.
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].category, "receive");
        assert_eq!(rows[0].amount, 10 * COIN);
        assert_eq!(rows[3].category, "move");
        for pair in rows.windows(2) {
            assert!(pair[0].order_pos <= pair[1].order_pos);
        }

        // Paging: skip the newest row, take one.
        let page = wallet.list_transactions("*", 1, 1, false);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].category, "move");

        // count limits the result.
        let limited = wallet.list_transactions("*", 2, 0, false);
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_list_transactions_account_filter() {
        let wallet = wallet_with_chain(10);
        let a = wallet.new_address("A").unwrap();
        let b = wallet.new_address("B").unwrap();
        credit_output(&wallet, &a, 10 * COIN, 3);
        credit_output(&wallet, &b, 20 * COIN, 5);

        let rows = wallet.list_transactions("A", 10, 0, false);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].account, "A");
        assert_eq!(rows[0].amount, 10 * COIN);
    }

    #[test]
    fn test_send_row_carries_fee() {
        let wallet = wallet_with_chain(10);
        let address = wallet.new_address("").unwrap();
        credit_output(&wallet, &address, 50 * COIN, 5);
        let dest = Address::from_pubkey(&[0xcc; 32]);
        wallet.send_money(&dest, 10 * COIN, "", None, None).unwrap();

        let rows = wallet.list_transactions("*", 10, 0, false);
        let send = rows.iter().find(|r| r.category == "send").unwrap();
        assert_eq!(send.amount, -10 * COIN);
        assert!(send.fee.unwrap() < 0);
        assert_eq!(send.address, Some(dest.to_string()));
    }

    #[test]
    fn test_list_since_block() {
        let wallet = wallet_with_chain(10);
        let address = wallet.new_address("").unwrap();
        credit_output(&wallet, &address, 10 * COIN, 3);
        credit_output(&wallet, &address, 20 * COIN, 8);

        // Since height 5: depth cutoff 10-5+1 = 6, so only the height-8
        // credit (depth 3) qualifies.
        let rows = wallet.list_since_block(Some(5), false);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, 20 * COIN);

        let all = wallet.list_since_block(None, false);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_last_block_for_confirms() {
        let wallet = wallet_with_chain(10);
        let best = wallet.chain().best_index().unwrap();
        assert_eq!(wallet.last_block_for_confirms(1), Some(best.hash));

        let deeper = wallet.last_block_for_confirms(4).unwrap();
        let entry = wallet.chain().get(&deeper).unwrap();
        assert_eq!(entry.height, 7);
    }

    #[test]
    fn test_kernel_records_decomposition() {
        let wallet = wallet_with_chain(10);
        let address = wallet.new_address("").unwrap();
        let txid = credit_output(&wallet, &address, 10 * COIN, 5);

        let records = wallet.kernel_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].txid, txid);
        assert_eq!(records[0].value, 10 * COIN);
        assert_eq!(records[0].address, address.to_string());
        assert!(!records[0].spent);
    }

    #[test]
    fn test_kernel_records_skip_foreign_outputs() {
        let wallet = wallet_with_chain(10);
        let ours = wallet.new_address("").unwrap();
        credit_output(&wallet, &ours, 10 * COIN, 5);

        // A spend creates a foreign output in a tracked transaction.
        let dest = Address::from_pubkey(&[0xcc; 32]);
        wallet.send_money(&dest, 2 * COIN, "", None, None).unwrap();

        let records = wallet.kernel_records();
        assert!(records.iter().all(|r| r.address != dest.to_string()));
    }
}
