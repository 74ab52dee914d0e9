//! Transaction building and committing.
//!
//! Coin selection is smallest-first over the send-side output view; the
//! reserve floor never blocks a send. Inputs are signed with the owning
//! key: `script_sig = pubkey ‖ signature` over the unsigned
//! serialization.

use crate::tx::{MineFilter, WalletTx};
use crate::wallet::Wallet;
use crate::{WalletError, WalletResult};
use solidus_chain::{
    script_for_address, Address, Hash256, OutPoint, Transaction, TxIn, TxOut,
};
use solidus_mempool::PooledTransaction;
use std::collections::BTreeMap;
use tracing::{debug, info};

impl Wallet {
    /// Build and sign a transaction paying `outputs`, returning it with
    /// the fee taken.
    pub fn create_transaction(
        &self,
        outputs: &[(Address, i64)],
    ) -> WalletResult<(Transaction, i64)> {
        if outputs.is_empty() {
            return Err(WalletError::InvalidParameter("no outputs".into()));
        }
        let params = self.params().clone();
        for (_, amount) in outputs {
            if *amount < params.min_input_value {
                return Err(WalletError::AmountTooSmall);
            }
        }
        let total: i64 = outputs.iter().map(|(_, v)| v).sum();

        let available = self.available_outputs(1, MineFilter::SPENDABLE);
        let mut fee = params.min_tx_fee;
        loop {
            // Smallest-first selection until the target is covered.
            let mut selected = Vec::new();
            let mut value_in = 0;
            for out in &available {
                selected.push(out.clone());
                value_in += out.value;
                if value_in >= total + fee {
                    break;
                }
            }
            if value_in < total + fee {
                return Err(WalletError::InsufficientFunds);
            }

            let mut tx = Transaction::new(self.chain().adjusted_time() as u32);
            for out in &selected {
                tx.vin
                    .push(TxIn::from_outpoint(OutPoint::new(out.txid, out.vout)));
            }
            for (address, amount) in outputs {
                tx.vout
                    .push(TxOut::new(*amount, script_for_address(address)));
            }

            let mut change = value_in - total - fee;
            if change > 0 && change < params.min_input_value {
                // Dust change is surrendered to the fee.
                change = 0;
            }
            if change > 0 {
                let change_address = self.keystore().key_from_pool()?;
                tx.vout
                    .push(TxOut::new(change, script_for_address(&change_address)));
            }

            // Fee must cover the signed size; one growth round suffices
            // because signatures have a fixed length.
            let signed_size = tx.size() + tx.vin.len() * 96;
            let required = params.min_tx_fee * (1 + signed_size as i64 / 1000);
            if required > fee {
                fee = required;
                continue;
            }

            self.sign_inputs(&mut tx, &selected)?;
            let paid = value_in - tx.value_out();
            debug!(fee = paid, inputs = tx.vin.len(), "Transaction built");
            return Ok((tx, paid));
        }
    }

    /// Sign each input with the key of the output it spends.
    fn sign_inputs(
        &self,
        tx: &mut Transaction,
        sources: &[crate::tx::OwnedOutput],
    ) -> WalletResult<()> {
        let message = tx.serialize();
        let mut signatures = Vec::with_capacity(sources.len());
        for source in sources {
            let address = solidus_chain::extract_destination(&source.script_pub_key)
                .ok_or_else(|| WalletError::InvalidAddress("unspendable source".into()))?;
            let key = self.keystore().get_key(&address)?;
            let mut script_sig = key.public.to_vec();
            script_sig.extend_from_slice(&key.sign(&message));
            signatures.push(script_sig);
        }
        for (txin, script_sig) in tx.vin.iter_mut().zip(signatures) {
            txin.script_sig = script_sig;
        }
        Ok(())
    }

    /// Register a built transaction with the wallet and hand it to the
    /// mempool.
    pub fn commit_transaction(
        &self,
        tx: Transaction,
        fee: i64,
        from_account: &str,
        map_value: BTreeMap<String, String>,
    ) -> WalletResult<Hash256> {
        let txid = tx.txid();
        let now = self.chain().adjusted_time();

        let mut wtx = WalletTx::new(tx.clone(), now, self.ledger().next_order_pos());
        wtx.from_me = true;
        wtx.from_account = from_account.to_string();
        wtx.map_value = map_value;
        self.register_tx(wtx);

        // Mark the consumed outputs spent in their source records.
        for txin in &tx.vin {
            self.with_tx_mut(&txin.prevout.txid, |prev| {
                let idx = txin.prevout.vout as usize;
                if idx < prev.spent.len() {
                    prev.spent[idx] = true;
                }
            });
        }

        self.mempool().add(PooledTransaction {
            tx,
            fee,
            priority: 0.0,
            arrival_time: now,
        })?;

        info!(txid = %txid, "Transaction committed");
        Ok(txid)
    }

    /// Send to a single address. `comment` and `comment_to` land in the
    /// metadata bag.
    pub fn send_money(
        &self,
        address: &Address,
        amount: i64,
        from_account: &str,
        comment: Option<String>,
        comment_to: Option<String>,
    ) -> WalletResult<Hash256> {
        self.ensure_unlocked()?;
        let (tx, fee) = self.create_transaction(&[(address.clone(), amount)])?;

        let mut map_value = BTreeMap::new();
        if let Some(comment) = comment.filter(|c| !c.is_empty()) {
            map_value.insert("comment".to_string(), comment);
        }
        if let Some(to) = comment_to.filter(|c| !c.is_empty()) {
            map_value.insert("to".to_string(), to);
        }
        self.commit_transaction(tx, fee, from_account, map_value)
    }

    /// Send to several addresses at once. Duplicated addresses are
    /// rejected before anything is signed.
    pub fn send_many(
        &self,
        from_account: &str,
        recipients: &[(String, i64)],
        comment: Option<String>,
    ) -> WalletResult<Hash256> {
        let mut seen = std::collections::BTreeSet::new();
        let mut outputs = Vec::with_capacity(recipients.len());
        for (addr_str, amount) in recipients {
            let address = Address::parse(addr_str)
                .map_err(|_| WalletError::InvalidAddress(format!("Invalid address: {}", addr_str)))?;
            if !seen.insert(address.clone()) {
                return Err(WalletError::InvalidAddress(format!(
                    "duplicated address: {}",
                    addr_str
                )));
            }
            outputs.push((address, *amount));
        }

        self.ensure_unlocked()?;
        let (tx, fee) = self.create_transaction(&outputs)?;

        let mut map_value = BTreeMap::new();
        if let Some(comment) = comment.filter(|c| !c.is_empty()) {
            map_value.insert("comment".to_string(), comment);
        }
        self.commit_transaction(tx, fee, from_account, map_value)
    }

    /// Coalesce small inputs into outputs of roughly `output_value`,
    /// processing at most `amount` in total. Returns the ids of the
    /// merge transactions created.
    pub fn merge_coins(
        &self,
        amount: i64,
        min_value: i64,
        output_value: i64,
    ) -> WalletResult<Vec<Hash256>> {
        self.ensure_unlocked()?;
        let params = self.params().clone();
        if amount < params.min_input_value {
            return Err(WalletError::AmountTooSmall);
        }
        if min_value < params.min_input_value {
            return Err(WalletError::InvalidParameter("min value too small".into()));
        }
        if output_value < params.min_input_value {
            return Err(WalletError::InvalidParameter("output value too small".into()));
        }
        if output_value < min_value {
            return Err(WalletError::InvalidParameter(
                "output value is lower than min value".into(),
            ));
        }

        let eligible: Vec<_> = self
            .available_outputs(1, MineFilter::SPENDABLE)
            .into_iter()
            .filter(|out| out.value >= min_value && out.value < output_value)
            .collect();

        let mut txids = Vec::new();
        let mut processed = 0;
        let mut batch: Vec<crate::tx::OwnedOutput> = Vec::new();
        let mut batch_value = 0;

        for out in eligible {
            if processed + out.value > amount {
                break;
            }
            processed += out.value;
            batch_value += out.value;
            batch.push(out);
            if batch_value >= output_value {
                txids.push(self.commit_merge_batch(&batch, batch_value)?);
                batch.clear();
                batch_value = 0;
            }
        }
        if batch.len() > 1 {
            txids.push(self.commit_merge_batch(&batch, batch_value)?);
        }
        Ok(txids)
    }

    fn commit_merge_batch(
        &self,
        batch: &[crate::tx::OwnedOutput],
        batch_value: i64,
    ) -> WalletResult<Hash256> {
        let params = self.params().clone();
        let fee = params.min_tx_fee;
        if batch_value <= fee {
            return Err(WalletError::InsufficientFunds);
        }

        let mut tx = Transaction::new(self.chain().adjusted_time() as u32);
        for out in batch {
            tx.vin
                .push(TxIn::from_outpoint(OutPoint::new(out.txid, out.vout)));
        }
        let destination = self.keystore().key_from_pool()?;
        tx.vout.push(TxOut::new(
            batch_value - fee,
            script_for_address(&destination),
        ));
        self.sign_inputs(&mut tx, batch)?;
        self.commit_transaction(tx, fee, "", BTreeMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::testutil::*;
    use solidus_chain::{COIN, CENT};

    #[test]
    fn test_send_money_commits_and_pools() {
        let wallet = wallet_with_chain(10);
        let address = wallet.new_address("").unwrap();
        credit_output(&wallet, &address, 50 * COIN, 5);

        let dest = Address::from_pubkey(&[0xcc; 32]);
        let txid = wallet
            .send_money(&dest, 10 * COIN, "", Some("lunch".into()), None)
            .unwrap();

        let wtx = wallet.get_tx(&txid).unwrap();
        assert!(wtx.from_me);
        assert_eq!(wtx.map_value.get("comment").unwrap(), "lunch");
        assert!(wallet.mempool().contains(&txid));

        // Spent marker on the funding output.
        let outputs = wallet.available_outputs(1, MineFilter::SPENDABLE);
        assert!(outputs.iter().all(|o| o.txid != wtx.tx.vin[0].prevout.txid
            || o.vout != wtx.tx.vin[0].prevout.vout));
    }

    #[test]
    fn test_send_includes_change() {
        let wallet = wallet_with_chain(10);
        let address = wallet.new_address("").unwrap();
        credit_output(&wallet, &address, 50 * COIN, 5);

        let dest = Address::from_pubkey(&[0xcc; 32]);
        let txid = wallet.send_money(&dest, 10 * COIN, "", None, None).unwrap();
        let wtx = wallet.get_tx(&txid).unwrap();

        // Payment plus change.
        assert_eq!(wtx.tx.vout.len(), 2);
        let change = wtx.tx.vout[1].value;
        assert!(change > 0 && change < 40 * COIN);
        // Change returns to one of our keys.
        let change_addr = solidus_chain::extract_destination(&wtx.tx.vout[1].script_pub_key)
            .unwrap();
        assert!(wallet.keystore().have_key(&change_addr));
    }

    #[test]
    fn test_insufficient_funds() {
        let wallet = wallet_with_chain(10);
        let address = wallet.new_address("").unwrap();
        credit_output(&wallet, &address, 2 * COIN, 5);

        let dest = Address::from_pubkey(&[0xcc; 32]);
        assert!(matches!(
            wallet.send_money(&dest, 10 * COIN, "", None, None),
            Err(WalletError::InsufficientFunds)
        ));
    }

    #[test]
    fn test_dust_rejected() {
        let wallet = wallet_with_chain(10);
        let address = wallet.new_address("").unwrap();
        credit_output(&wallet, &address, 2 * COIN, 5);

        let dest = Address::from_pubkey(&[0xcc; 32]);
        assert!(matches!(
            wallet.send_money(&dest, 1, "", None, None),
            Err(WalletError::AmountTooSmall)
        ));
    }

    #[test]
    fn test_sendmany_duplicate_address_rejected() {
        let wallet = wallet_with_chain(10);
        let address = wallet.new_address("").unwrap();
        credit_output(&wallet, &address, 50 * COIN, 5);

        let dest = Address::from_pubkey(&[0xcc; 32]).to_string();
        let err = wallet
            .send_many("", &[(dest.clone(), COIN), (dest, COIN)], None)
            .unwrap_err();
        match err {
            WalletError::InvalidAddress(message) => {
                assert!(message.contains("duplicated address"), "{}", message)
            }
            other => panic!("expected InvalidAddress, got {:?}", other),
        }
    }

    #[test]
    fn test_sendmany_pays_every_recipient() {
        let wallet = wallet_with_chain(10);
        let address = wallet.new_address("").unwrap();
        credit_output(&wallet, &address, 50 * COIN, 5);

        let a = Address::from_pubkey(&[0xc1; 32]);
        let b = Address::from_pubkey(&[0xc2; 32]);
        let txid = wallet
            .send_many(
                "",
                &[(a.to_string(), 3 * COIN), (b.to_string(), 4 * COIN)],
                None,
            )
            .unwrap();
        let wtx = wallet.get_tx(&txid).unwrap();
        assert_eq!(wtx.tx.vout[0].value, 3 * COIN);
        assert_eq!(wtx.tx.vout[1].value, 4 * COIN);
    }

    #[test]
    fn test_send_blocked_while_locked_or_mint_only() {
        let wallet = wallet_with_chain(10);
        let address = wallet.new_address("").unwrap();
        credit_output(&wallet, &address, 50 * COIN, 5);
        let dest = Address::from_pubkey(&[0xcc; 32]);

        wallet.keystore().encrypt("p").unwrap();
        assert!(matches!(
            wallet.send_money(&dest, COIN, "", None, None),
            Err(WalletError::Locked)
        ));

        wallet.keystore().unlock("p", true).unwrap();
        assert!(matches!(
            wallet.send_money(&dest, COIN, "", None, None),
            Err(WalletError::MintOnly)
        ));

        wallet.keystore().lock();
        wallet.keystore().unlock("p", false).unwrap();
        assert!(wallet.send_money(&dest, COIN, "", None, None).is_ok());
    }

    #[test]
    fn test_merge_coins() {
        let wallet = wallet_with_chain(10);
        let address = wallet.new_address("").unwrap();
        for height in 2..8 {
            credit_output(&wallet, &address, 2 * COIN, height);
        }

        let txids = wallet
            .merge_coins(12 * COIN, COIN, 6 * COIN)
            .unwrap();
        assert!(!txids.is_empty());
        for txid in &txids {
            let wtx = wallet.get_tx(txid).unwrap();
            assert_eq!(wtx.tx.vout.len(), 1);
            assert!(wtx.tx.vin.len() > 1);
            let dest =
                solidus_chain::extract_destination(&wtx.tx.vout[0].script_pub_key).unwrap();
            assert!(wallet.keystore().have_key(&dest));
        }
    }

    #[test]
    fn test_merge_coins_validation() {
        let wallet = wallet_with_chain(10);
        assert!(wallet.merge_coins(0, COIN, 2 * COIN).is_err());
        assert!(wallet.merge_coins(10 * COIN, 0, 2 * COIN).is_err());
        assert!(wallet.merge_coins(10 * COIN, 2 * COIN, CENT / 1000).is_err());
        assert!(wallet.merge_coins(10 * COIN, 2 * COIN, COIN).is_err());
    }

    #[test]
    fn test_resend_wallet_transactions() {
        let wallet = wallet_with_chain(10);
        let address = wallet.new_address("").unwrap();
        credit_output(&wallet, &address, 50 * COIN, 5);

        let dest = Address::from_pubkey(&[0xcc; 32]);
        let txid = wallet.send_money(&dest, COIN, "", None, None).unwrap();

        // Drop it from the pool and rebroadcast.
        wallet.mempool().remove(&txid).unwrap();
        let resent = wallet.resend_transactions();
        assert!(resent.contains(&txid));
        assert!(wallet.mempool().contains(&txid));
    }
}
