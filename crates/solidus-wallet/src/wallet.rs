//! Main wallet implementation.
//!
//! The wallet tracks every transaction that touches its keys, keeps
//! per-output spent markers, and projects three things out of that map:
//! balances (with confirmation-depth and watch-only filters), the
//! ownership-filtered UTXO view the staking loop draws from, and the
//! account tallies behind the list RPCs.
//!
//! Lock discipline: chain state is read first, wallet maps second; no
//! wallet lock is ever held while calling back into the chain view.

use crate::accounts::AccountLedger;
use crate::keystore::KeyStore;
use crate::relock::Relocker;
use crate::tx::{MineFilter, MineType, OwnedOutput, WalletTx};
use crate::{WalletError, WalletResult};
use parking_lot::RwLock;
use solidus_chain::{
    extract_destination, Address, ChainParams, ChainView, Hash256, Transaction, CENT,
};
use solidus_mempool::Mempool;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Amount breakdown of one wallet transaction under a filter.
#[derive(Debug, Clone, Default)]
pub struct TxAmounts {
    /// Immature generated value (coinbase/coinstake under maturity).
    pub generated_immature: i64,
    /// Mature generated value.
    pub generated_mature: i64,
    /// Outputs credited to us, per address.
    pub received: Vec<(Option<Address>, i64)>,
    /// Outputs leaving the wallet, per address.
    pub sent: Vec<(Option<Address>, i64)>,
    /// Fee paid, when the transaction is ours.
    pub fee: i64,
}

/// Top-level balance figures for `getinfo`.
#[derive(Debug, Clone, Default)]
pub struct WalletBalances {
    /// Spendable balance over trusted transactions.
    pub balance: i64,
    /// Watch-only observed balance.
    pub watch_only: i64,
    /// Immature coinstake value.
    pub stake: i64,
    /// Immature coinbase value.
    pub new_mint: i64,
}

/// The wallet.
pub struct Wallet {
    params: ChainParams,
    chain: Arc<ChainView>,
    mempool: Arc<Mempool>,
    keystore: Arc<KeyStore>,
    ledger: AccountLedger,
    relocker: Relocker,
    txs: RwLock<HashMap<Hash256, WalletTx>>,
    address_book: RwLock<BTreeMap<Address, String>>,
    watch_only: RwLock<BTreeSet<Address>>,
    reserve_balance: AtomicI64,
}

impl Wallet {
    /// New wallet bound to a chain view and mempool.
    pub fn new(params: ChainParams, chain: Arc<ChainView>, mempool: Arc<Mempool>) -> Self {
        Self {
            params,
            chain,
            mempool,
            keystore: Arc::new(KeyStore::new()),
            ledger: AccountLedger::new(),
            relocker: Relocker::new(),
            txs: RwLock::new(HashMap::new()),
            address_book: RwLock::new(BTreeMap::new()),
            watch_only: RwLock::new(BTreeSet::new()),
            reserve_balance: AtomicI64::new(0),
        }
    }

    /// Network parameters.
    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Chain view this wallet follows.
    pub fn chain(&self) -> &Arc<ChainView> {
        &self.chain
    }

    /// Mempool used for trust checks and commits.
    pub fn mempool(&self) -> &Arc<Mempool> {
        &self.mempool
    }

    /// Key store.
    pub fn keystore(&self) -> &Arc<KeyStore> {
        &self.keystore
    }

    /// Accounting ledger.
    pub fn ledger(&self) -> &AccountLedger {
        &self.ledger
    }

    /// Relocker worker handle.
    pub fn relocker(&self) -> &Relocker {
        &self.relocker
    }

    // --- Lock state ---

    /// Whether keys are unusable.
    pub fn is_locked(&self) -> bool {
        self.keystore.is_locked()
    }

    /// Whether the wallet is encrypted.
    pub fn is_crypted(&self) -> bool {
        self.keystore.is_crypted()
    }

    /// Whether the current unlock allows minting only.
    pub fn is_mint_only(&self) -> bool {
        self.keystore.is_mint_only()
    }

    /// Fail unless the wallet can sign spends right now.
    pub fn ensure_unlocked(&self) -> WalletResult<()> {
        if self.is_locked() {
            return Err(WalletError::Locked);
        }
        if self.is_mint_only() {
            return Err(WalletError::MintOnly);
        }
        Ok(())
    }

    // --- Addresses and ownership ---

    /// Hand out a new address from the key pool, registering the
    /// account label.
    pub fn new_address(&self, account: &str) -> WalletResult<Address> {
        if !self.is_locked() {
            let _ = self.keystore.top_up_pool(self.params.keypool_size);
        }
        let address = self.keystore.key_from_pool()?;
        self.set_account(&address, account);
        Ok(address)
    }

    /// Set the account label of an address.
    pub fn set_account(&self, address: &Address, account: &str) {
        self.address_book
            .write()
            .insert(address.clone(), account.to_string());
    }

    /// Account label of an address, if known.
    pub fn account_of(&self, address: &Address) -> Option<String> {
        self.address_book.read().get(address).cloned()
    }

    /// Addresses registered under an account.
    pub fn addresses_of_account(&self, account: &str) -> Vec<Address> {
        self.address_book
            .read()
            .iter()
            .filter(|(_, name)| name.as_str() == account)
            .map(|(address, _)| address.clone())
            .collect()
    }

    /// Import an address without its key.
    pub fn add_watch_only(&self, address: Address) {
        self.watch_only.write().insert(address.clone());
        self.address_book.write().entry(address).or_default();
    }

    /// Ownership class of an address.
    pub fn is_mine_address(&self, address: &Address) -> MineType {
        if self.keystore.have_key(address) {
            MineType::Spendable
        } else if self.watch_only.read().contains(address) {
            MineType::WatchOnly
        } else {
            MineType::No
        }
    }

    /// Ownership class of an output script.
    pub fn is_mine_script(&self, script: &[u8]) -> MineType {
        match extract_destination(script) {
            Some(address) => self.is_mine_address(&address),
            None => MineType::No,
        }
    }

    // --- Transaction tracking ---

    /// Observe a transaction, confirmed or not.
    ///
    /// Tracks it when it credits or debits the wallet, updates the
    /// confirmation context, and marks spent flags on the outputs it
    /// consumes. `block_info` is `(block_hash, height, block_time,
    /// tx_offset)` for confirmed transactions.
    pub fn sync_transaction(
        &self,
        tx: &Transaction,
        block_info: Option<(Hash256, u32, i64, u32)>,
    ) {
        let txid = tx.txid();
        let relevant = {
            let txs = self.txs.read();
            tx.vout
                .iter()
                .any(|out| self.is_mine_script(&out.script_pub_key) != MineType::No)
                || tx.vin.iter().any(|txin| {
                    txs.get(&txin.prevout.txid)
                        .map(|prev| {
                            prev.tx
                                .vout
                                .get(txin.prevout.vout as usize)
                                .map(|out| {
                                    self.is_mine_script(&out.script_pub_key) != MineType::No
                                })
                                .unwrap_or(false)
                        })
                        .unwrap_or(false)
                })
                || txs.contains_key(&txid)
        };
        if !relevant {
            return;
        }

        let now = self.chain.adjusted_time();
        let mut txs = self.txs.write();
        let entry = txs.entry(txid).or_insert_with(|| {
            debug!(txid = %txid, "Tracking wallet transaction");
            WalletTx::new(tx.clone(), now, self.ledger.next_order_pos())
        });
        if let Some((block_hash, height, block_time, tx_offset)) = block_info {
            entry.block_hash = Some(block_hash);
            entry.block_height = Some(height);
            entry.block_time = block_time;
            entry.tx_offset = tx_offset;
        }

        // Spent markers and the from-me flag come from our own inputs.
        let mut from_me = false;
        for txin in &tx.vin {
            if txin.prevout.is_null() {
                continue;
            }
            let prevout = txin.prevout;
            if let Some(prev) = txs.get_mut(&prevout.txid) {
                let idx = prevout.vout as usize;
                let mine = prev
                    .tx
                    .vout
                    .get(idx)
                    .map(|out| self.is_mine_script(&out.script_pub_key))
                    .unwrap_or(MineType::No);
                if mine != MineType::No && idx < prev.spent.len() {
                    prev.spent[idx] = true;
                    if mine == MineType::Spendable {
                        from_me = true;
                    }
                }
            }
        }
        if from_me {
            if let Some(entry) = txs.get_mut(&txid) {
                entry.from_me = true;
            }
        }
    }

    /// Look up a tracked transaction.
    pub fn get_tx(&self, txid: &Hash256) -> Option<WalletTx> {
        self.txs.read().get(txid).cloned()
    }

    /// Insert a fully formed wallet transaction (used by the builder).
    pub fn register_tx(&self, wtx: WalletTx) {
        self.txs.write().insert(wtx.txid, wtx);
    }

    /// Mutate a tracked transaction in place.
    pub fn with_tx_mut<F: FnOnce(&mut WalletTx)>(&self, txid: &Hash256, f: F) {
        if let Some(wtx) = self.txs.write().get_mut(txid) {
            f(wtx);
        }
    }

    /// Snapshot of every tracked transaction.
    pub fn all_txs(&self) -> Vec<WalletTx> {
        self.txs.read().values().cloned().collect()
    }

    // --- Amount decomposition ---

    /// Value of an input when it spends one of our outputs.
    fn input_value(&self, txid: &Hash256, vout: u32, filter: MineFilter) -> i64 {
        let txs = self.txs.read();
        txs.get(txid)
            .and_then(|prev| prev.tx.vout.get(vout as usize))
            .filter(|out| filter.matches(self.is_mine_script(&out.script_pub_key)))
            .map(|out| out.value)
            .unwrap_or(0)
    }

    /// Sum of our inputs under a filter.
    pub fn debit(&self, wtx: &WalletTx, filter: MineFilter) -> i64 {
        wtx.tx
            .vin
            .iter()
            .filter(|txin| !txin.prevout.is_null())
            .map(|txin| self.input_value(&txin.prevout.txid, txin.prevout.vout, filter))
            .sum()
    }

    /// Sum of our outputs under a filter.
    pub fn credit(&self, wtx: &WalletTx, filter: MineFilter) -> i64 {
        wtx.tx
            .vout
            .iter()
            .filter(|out| filter.matches(self.is_mine_script(&out.script_pub_key)))
            .map(|out| out.value)
            .sum()
    }

    /// Decompose a transaction into generated / received / sent / fee.
    pub fn get_amounts(&self, wtx: &WalletTx, filter: MineFilter) -> TxAmounts {
        let mut amounts = TxAmounts::default();
        let best_height = self.chain.height();

        if wtx.tx.is_coinbase() || wtx.tx.is_coinstake() {
            let net = self.credit(wtx, filter) - self.debit(wtx, filter);
            if wtx.blocks_to_maturity(best_height, self.params.coinbase_maturity) > 0 {
                amounts.generated_immature = net;
            } else {
                amounts.generated_mature = net;
            }
            return amounts;
        }

        let debit = self.debit(wtx, filter);
        if debit > 0 {
            amounts.fee = (debit - wtx.tx.value_out()).max(0);
        }
        for out in &wtx.tx.vout {
            let mine = self.is_mine_script(&out.script_pub_key);
            let address = extract_destination(&out.script_pub_key);
            if filter.matches(mine) {
                amounts.received.push((address, out.value));
            } else if debit > 0 {
                amounts.sent.push((address, out.value));
            }
        }
        amounts
    }

    /// Trusted: confirmed, or our own self-consistent mempool
    /// transaction.
    pub fn is_trusted(&self, wtx: &WalletTx) -> bool {
        let best_height = self.chain.height();
        if wtx.depth(best_height) >= 1 {
            return true;
        }
        if !wtx.from_me {
            return false;
        }
        if !self.mempool.contains(&wtx.txid) {
            return false;
        }
        // Every input must spend one of our own tracked outputs.
        let txs = self.txs.read();
        wtx.tx.vin.iter().all(|txin| {
            txs.get(&txin.prevout.txid)
                .and_then(|prev| prev.tx.vout.get(txin.prevout.vout as usize))
                .map(|out| self.is_mine_script(&out.script_pub_key) == MineType::Spendable)
                .unwrap_or(false)
        })
    }

    // --- Balances ---

    /// Spendable balance: unspent, mature outputs of trusted
    /// transactions.
    pub fn balance(&self) -> i64 {
        self.balance_with_filter(MineFilter::SPENDABLE)
    }

    /// Observed balance of watch-only addresses.
    pub fn watch_only_balance(&self) -> i64 {
        self.balance_with_filter(MineFilter::WATCH_ONLY)
    }

    fn balance_with_filter(&self, filter: MineFilter) -> i64 {
        let best_height = self.chain.height();
        let mut total = 0;
        for wtx in self.all_txs() {
            if !self.is_trusted(&wtx) {
                continue;
            }
            if wtx.blocks_to_maturity(best_height, self.params.coinbase_maturity) > 0 {
                continue;
            }
            for (idx, out) in wtx.tx.vout.iter().enumerate() {
                if wtx.is_spent(idx) {
                    continue;
                }
                if filter.matches(self.is_mine_script(&out.script_pub_key)) {
                    total += out.value;
                }
            }
        }
        total
    }

    fn immature_generated(&self, coinstake: bool) -> i64 {
        let best_height = self.chain.height();
        self.all_txs()
            .iter()
            .filter(|wtx| {
                let generated = if coinstake {
                    wtx.tx.is_coinstake()
                } else {
                    wtx.tx.is_coinbase()
                };
                generated
                    && wtx.depth(best_height) > 0
                    && wtx.blocks_to_maturity(best_height, self.params.coinbase_maturity) > 0
            })
            .map(|wtx| self.credit(wtx, MineFilter::SPENDABLE))
            .sum()
    }

    /// Value staked and still maturing.
    pub fn stake(&self) -> i64 {
        self.immature_generated(true)
    }

    /// Freshly minted coinbase value still maturing.
    pub fn new_mint(&self) -> i64 {
        self.immature_generated(false)
    }

    /// All top-level balances in one scan.
    pub fn balances(&self) -> WalletBalances {
        WalletBalances {
            balance: self.balance(),
            watch_only: self.watch_only_balance(),
            stake: self.stake(),
            new_mint: self.new_mint(),
        }
    }

    /// The `getbalance "*"` tally: trusted transactions only, received
    /// counted above `min_depth`, sends and fees always subtracted.
    pub fn balance_all(&self, min_depth: i32, filter: MineFilter) -> i64 {
        let best_height = self.chain.height();
        let mut total = 0;
        for wtx in self.all_txs() {
            if !self.is_trusted(&wtx) {
                continue;
            }
            let amounts = self.get_amounts(&wtx, filter);
            if wtx.depth(best_height) >= min_depth {
                for (_, value) in &amounts.received {
                    total += value;
                }
            }
            for (_, value) in &amounts.sent {
                total -= value;
            }
            total -= amounts.fee;
            total += amounts.generated_mature;
        }
        total
    }

    /// Balance of one account: qualifying receipts, minus sends and
    /// fees, plus ledger entries.
    pub fn account_balance(&self, account: &str, min_depth: i32, filter: MineFilter) -> i64 {
        let best_height = self.chain.height();
        let best_time = self.chain.adjusted_time();
        let mut total = 0;
        for wtx in self.all_txs() {
            if !wtx.tx.is_final(best_height, best_time) {
                continue;
            }
            let amounts = self.get_amounts(&wtx, filter);

            if wtx.depth(best_height) >= min_depth {
                for (address, value) in &amounts.received {
                    let owner = address
                        .as_ref()
                        .and_then(|a| self.account_of(a))
                        .unwrap_or_default();
                    if owner == account {
                        total += value;
                    }
                }
                if account.is_empty() {
                    total += amounts.generated_mature;
                }
            }
            if wtx.from_account == account {
                for (_, value) in &amounts.sent {
                    total -= value;
                }
                total -= amounts.fee;
            }
        }
        total + self.ledger.credit_debit(account)
    }

    /// Balances of every account, for `listaccounts`.
    pub fn account_balances(&self, min_depth: i32, filter: MineFilter) -> BTreeMap<String, i64> {
        let best_height = self.chain.height();
        let mut balances: BTreeMap<String, i64> = BTreeMap::new();

        for (address, account) in self.address_book.read().iter() {
            if self.is_mine_address(address) != MineType::No {
                balances.entry(account.clone()).or_insert(0);
            }
        }

        for wtx in self.all_txs() {
            let amounts = self.get_amounts(&wtx, filter);
            let sender = balances.entry(wtx.from_account.clone()).or_insert(0);
            *sender -= amounts.fee;
            for (_, value) in &amounts.sent {
                *balances.entry(wtx.from_account.clone()).or_insert(0) -= value;
            }
            if wtx.depth(best_height) >= min_depth {
                *balances.entry(String::new()).or_insert(0) += amounts.generated_mature;
                for (address, value) in &amounts.received {
                    let owner = address
                        .as_ref()
                        .and_then(|a| self.account_of(a))
                        .unwrap_or_default();
                    *balances.entry(owner).or_insert(0) += value;
                }
            }
        }

        for entry in self.ledger.entries_for("*") {
            *balances.entry(entry.account).or_insert(0) += entry.credit_debit;
        }
        balances
    }

    // --- UTXO views ---

    /// Every confirmed, owned, unspent, mature output, smallest value
    /// first. No reserve filter; this is the send-side view.
    pub fn available_outputs(&self, min_depth: i32, filter: MineFilter) -> Vec<OwnedOutput> {
        let best_height = self.chain.height();
        let best_time = self.chain.adjusted_time();
        let mut outputs = Vec::new();
        for wtx in self.all_txs() {
            if !wtx.tx.is_final(best_height, best_time) {
                continue;
            }
            if !self.is_trusted(&wtx) {
                continue;
            }
            let depth = wtx.depth(best_height);
            if depth < min_depth {
                continue;
            }
            let generated = wtx.tx.is_coinbase() || wtx.tx.is_coinstake();
            if generated && wtx.blocks_to_maturity(best_height, self.params.coinbase_maturity) > 0
            {
                continue;
            }
            for (idx, out) in wtx.tx.vout.iter().enumerate() {
                if wtx.is_spent(idx) || out.is_empty() {
                    continue;
                }
                if out.value < self.params.min_input_value {
                    continue;
                }
                if !filter.matches(self.is_mine_script(&out.script_pub_key)) {
                    continue;
                }
                // Outputs with no recoverable destination are skipped.
                if extract_destination(&out.script_pub_key).is_none() {
                    continue;
                }
                outputs.push(OwnedOutput {
                    txid: wtx.txid,
                    vout: idx as u32,
                    value: out.value,
                    script_pub_key: out.script_pub_key.clone(),
                    block_hash: wtx.block_hash.unwrap_or(Hash256::ZERO),
                    block_time: wtx.block_time as u32,
                    tx_time: wtx.tx.n_time,
                    tx_offset: wtx.tx_offset,
                    depth,
                    is_coinbase: wtx.tx.is_coinbase(),
                    is_coinstake: wtx.tx.is_coinstake(),
                });
            }
        }
        outputs.sort_by_key(|o| o.value);
        outputs
    }

    /// The staking view: [`Wallet::available_outputs`] with the reserve
    /// floor applied. The smallest outputs whose cumulative value covers
    /// the reserve stay liquid and are withheld from staking.
    pub fn spendable(&self, min_depth: i32, watch_only: bool) -> Vec<OwnedOutput> {
        let filter = MineFilter::with_watch_only(watch_only);
        let outputs = self.available_outputs(min_depth, filter);
        let reserve = self.reserve_balance();
        if reserve <= 0 {
            return outputs;
        }
        let mut accumulated: i64 = 0;
        outputs
            .into_iter()
            .filter(|out| {
                if accumulated < reserve {
                    accumulated += out.value;
                    false
                } else {
                    true
                }
            })
            .collect()
    }

    // --- Reserve balance ---

    /// Current reserve floor.
    pub fn reserve_balance(&self) -> i64 {
        self.reserve_balance.load(Ordering::SeqCst)
    }

    /// Set the reserve floor. Rounded down to a whole cent; negative
    /// rejected.
    pub fn set_reserve_balance(&self, amount: i64) -> WalletResult<i64> {
        if amount < 0 {
            return Err(WalletError::InvalidParameter(
                "amount cannot be negative".into(),
            ));
        }
        let rounded = (amount / CENT) * CENT;
        self.reserve_balance.store(rounded, Ordering::SeqCst);
        info!(reserve = rounded, "Reserve balance updated");
        Ok(rounded)
    }

    // --- Integrity ---

    /// Compare stored spent markers against what the transaction graph
    /// implies. Returns `(mismatches, value in question)`; repairs the
    /// markers unless `check_only`.
    pub fn fix_spent_coins(&self, check_only: bool) -> (usize, i64) {
        let mut referenced: HashSet<(Hash256, u32)> = HashSet::new();
        {
            let txs = self.txs.read();
            for wtx in txs.values() {
                let confirmed = wtx.block_height.is_some();
                if !confirmed && !self.mempool.contains(&wtx.txid) {
                    continue;
                }
                for txin in &wtx.tx.vin {
                    if !txin.prevout.is_null() {
                        referenced.insert((txin.prevout.txid, txin.prevout.vout));
                    }
                }
            }
        }

        let mut mismatches = 0;
        let mut amount = 0;
        let mut txs = self.txs.write();
        for wtx in txs.values_mut() {
            for idx in 0..wtx.tx.vout.len() {
                let mine =
                    self.is_mine_script(&wtx.tx.vout[idx].script_pub_key) != MineType::No;
                if !mine {
                    continue;
                }
                let actual = referenced.contains(&(wtx.txid, idx as u32));
                if wtx.spent[idx] != actual {
                    mismatches += 1;
                    amount += wtx.tx.vout[idx].value;
                    if !check_only {
                        warn!(txid = %wtx.txid, vout = idx, actual, "Repairing spent marker");
                        wtx.spent[idx] = actual;
                    }
                }
            }
        }
        (mismatches, amount)
    }

    /// Rebroadcast unconfirmed own transactions. Returns their ids.
    pub fn resend_transactions(&self) -> Vec<Hash256> {
        let mut resent = Vec::new();
        for wtx in self.all_txs() {
            if wtx.block_height.is_some() || !wtx.from_me {
                continue;
            }
            if self.mempool.contains(&wtx.txid) {
                resent.push(wtx.txid);
                continue;
            }
            let fee = (self.debit(&wtx, MineFilter::SPENDABLE) - wtx.tx.value_out()).max(0);
            let pooled = solidus_mempool::PooledTransaction {
                tx: wtx.tx.clone(),
                fee,
                priority: 0.0,
                arrival_time: self.chain.adjusted_time(),
            };
            if self.mempool.add(pooled).is_ok() {
                resent.push(wtx.txid);
            }
        }
        if !resent.is_empty() {
            info!(count = resent.len(), "Rebroadcast wallet transactions");
        }
        resent
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use solidus_chain::{script_for_address, BlockIndex, TimeData, TxIn, TxOut};
    use solidus_chain::OutPoint;

    /// Wallet over a regtest chain with `blocks` empty PoW index entries.
    pub fn wallet_with_chain(blocks: u32) -> Arc<Wallet> {
        let params = ChainParams::regtest();
        let chain = Arc::new(ChainView::new(params.clone(), Arc::new(TimeData::new())));
        let mut prev = Hash256::ZERO;
        for height in 0..=blocks {
            let mut seed = [0u8; 4];
            seed.copy_from_slice(&height.to_le_bytes());
            let entry = BlockIndex {
                hash: Hash256::digest(&seed),
                prev_hash: prev,
                height,
                n_time: 1_000_000 + height * 60,
                bits: params.pos_limit_bits,
                proof_of_stake: false,
                money_supply: 0,
                stake_modifier: height as u64,
                stake_modifier_checksum: 0,
            };
            prev = entry.hash;
            chain.attach(entry);
        }
        let mempool = Arc::new(Mempool::with_defaults());
        Arc::new(Wallet::new(params, chain, mempool))
    }

    /// Credit `value` to `address` in a transaction confirmed at
    /// `height`, and return its id.
    pub fn credit_output(
        wallet: &Wallet,
        address: &Address,
        value: i64,
        height: u32,
    ) -> Hash256 {
        let mut tx = Transaction::new(1_000_000 + height * 60);
        tx.vin.push(TxIn::from_outpoint(OutPoint::new(
            Hash256::digest(&[height as u8, 0xee]),
            0,
        )));
        tx.vout.push(TxOut::new(value, script_for_address(address)));
        let txid = tx.txid();
        let block_hash = Hash256::digest(&height.to_le_bytes());
        wallet.sync_transaction(&tx, Some((block_hash, height, (1_000_000 + height * 60) as i64, 81)));
        txid
    }
}
