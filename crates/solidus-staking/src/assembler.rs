//! Block assembly.
//!
//! On a successful kernel the assembler builds the coinstake spending
//! the winning output, packs mempool transactions under the block's
//! size and sigop budgets, fills the header and signs the block with
//! the coinstake key.

use crate::{StakingError, StakingResult};
use solidus_chain::{
    extract_destination, script_for_address, Block, BlockHeader, ChainView, OutPoint,
    Transaction, TxIn, TxOut,
};
use solidus_kernel::{coin_day, proof_of_stake_reward};
use solidus_mempool::{Mempool, TxPriority};
use solidus_wallet::{OwnedOutput, Wallet, WalletKey};
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Base size reserved for the header and generated transactions.
const BLOCK_BASE_SIZE: usize = 1_000;

/// Sigops reserved for the generated transactions.
const BLOCK_BASE_SIGOPS: usize = 100;

/// Priority below which the high-priority budget stops applying.
const PRIORITY_CUTOFF: f64 = 57_600_000.0; // one coin, one day, 250 bytes

/// Share of the block reserved for high-priority transactions.
const PRIORITY_SIZE_FRACTION: usize = 27;

/// Block assembler.
pub struct BlockAssembler {
    chain: Arc<ChainView>,
    mempool: Arc<Mempool>,
    wallet: Arc<Wallet>,
}

impl BlockAssembler {
    /// New assembler over the shared services.
    pub fn new(chain: Arc<ChainView>, mempool: Arc<Mempool>, wallet: Arc<Wallet>) -> Self {
        Self {
            chain,
            mempool,
            wallet,
        }
    }

    /// Build the coinstake transaction for a winning output at slot `t`.
    ///
    /// Output 0 is the empty coinstake marker; the rest pay principal
    /// plus reward back to the staking key, split in two above the
    /// configured threshold.
    pub fn create_coinstake(
        &self,
        winner: &OwnedOutput,
        t: u32,
    ) -> StakingResult<(Transaction, WalletKey)> {
        let params = self.wallet.params().clone();
        let address = extract_destination(&winner.script_pub_key).ok_or_else(|| {
            StakingError::Fatal("winning output has no destination".to_string())
        })?;
        let key = self.wallet.keystore().get_key(&address)?;

        let coin_age = coin_day(&params, winner.value, winner.tx_time as i64, t as i64);
        let reward = proof_of_stake_reward(&params, coin_age);
        let payout = winner.value + reward;

        let mut tx = Transaction::new(t);
        tx.vin
            .push(TxIn::from_outpoint(OutPoint::new(winner.txid, winner.vout)));
        tx.vout.push(TxOut::empty());
        if winner.value >= params.stake_split_threshold {
            let half = payout / 2;
            tx.vout
                .push(TxOut::new(half, script_for_address(&address)));
            tx.vout
                .push(TxOut::new(payout - half, script_for_address(&address)));
        } else {
            tx.vout
                .push(TxOut::new(payout, script_for_address(&address)));
        }

        let message = tx.serialize();
        let mut script_sig = key.public.to_vec();
        script_sig.extend_from_slice(&key.sign(&message));
        tx.vin[0].script_sig = script_sig;

        debug!(reward, coin_age, slot = t, "Coinstake created");
        Ok((tx, key))
    }

    /// Assemble a proof-of-stake block around a coinstake.
    pub fn create_block(&self, coinstake: Transaction, bits: u32) -> StakingResult<Block> {
        let t = coinstake.n_time;
        let prev = self
            .chain
            .best_index()
            .ok_or_else(|| StakingError::Retryable("no chain tip".to_string()))?;
        let params = self.chain.params().clone();

        // Empty coinbase carrying the height, timestamp synchronized
        // with the coinstake.
        let mut coinbase = Transaction::new(t);
        let mut height_script = Vec::with_capacity(4);
        height_script.extend_from_slice(&(prev.height + 1).to_le_bytes());
        coinbase.vin.push(TxIn {
            prevout: OutPoint::null(),
            script_sig: height_script,
            sequence: u32::MAX,
        });
        coinbase.vout.push(TxOut::empty());

        let mut block = Block {
            header: BlockHeader {
                version: 1,
                prev_hash: prev.hash,
                merkle_root: solidus_chain::Hash256::ZERO,
                n_time: t,
                bits,
                nonce: 0,
            },
            vtx: vec![coinbase, coinstake],
            signature: Vec::new(),
        };

        self.select_transactions(&mut block, t, &params)?;

        block.header.merkle_root = block.merkle_root();
        Ok(block)
    }

    /// Pack mempool transactions into the block.
    ///
    /// Selection starts in priority order and flips to fee-per-KB order
    /// once the high-priority budget is spent or priorities fall under
    /// the cutoff. Pooled dependencies are deferred until their parents
    /// are in the block.
    fn select_transactions(
        &self,
        block: &mut Block,
        t: u32,
        params: &solidus_chain::ChainParams,
    ) -> StakingResult<()> {
        let priority_budget = params.max_block_size / PRIORITY_SIZE_FRACTION;
        let mut by_fee = false;
        let mut heap: BinaryHeap<TxPriority> = BinaryHeap::new();
        let snapshot = self.mempool.snapshot();
        for pooled in &snapshot {
            let mut txid = [0u8; 32];
            txid.copy_from_slice(pooled.tx.txid().as_bytes());
            heap.push(TxPriority::new(txid, pooled.priority, pooled.fee_per_kb()));
        }

        let mut included: HashSet<solidus_chain::Hash256> =
            block.vtx.iter().map(|tx| tx.txid()).collect();
        let mut deferred: Vec<TxPriority> = Vec::new();
        let mut block_size = BLOCK_BASE_SIZE + block.vtx.iter().map(|tx| tx.size()).sum::<usize>();
        let mut block_sigops =
            BLOCK_BASE_SIGOPS + block.vtx.iter().map(|tx| tx.sig_op_count()).sum::<usize>();

        while let Some(candidate) = heap.pop() {
            let txid = solidus_chain::Hash256(candidate.txid);
            let Some(pooled) = self.mempool.get(&txid) else {
                continue;
            };
            let tx = &pooled.tx;

            let tx_size = tx.size();
            if block_size + tx_size >= params.max_block_size {
                continue;
            }
            let tx_sigops = tx.sig_op_count();
            if block_sigops + tx_sigops >= params.max_block_sigops {
                continue;
            }
            // Timestamp limit: nothing newer than the coinstake.
            if tx.n_time > t {
                continue;
            }
            if !tx.is_final(self.chain.height() + 1, t as i64) {
                continue;
            }

            // A pooled parent must land in the block first.
            let waiting = tx.vin.iter().any(|txin| {
                self.mempool.contains(&txin.prevout.txid) && !included.contains(&txin.prevout.txid)
            });
            if waiting {
                deferred.push(candidate);
                continue;
            }

            // Flip to fee ordering once the priority budget is spent.
            if !by_fee
                && (block_size + tx_size >= priority_budget
                    || candidate.priority < PRIORITY_CUTOFF)
            {
                by_fee = true;
                let drained: Vec<TxPriority> = heap.drain().collect();
                for entry in drained {
                    heap.push(entry.with_by_fee(true));
                }
                heap.push(candidate.with_by_fee(true));
                continue;
            }

            included.insert(txid);
            block_size += tx_size;
            block_sigops += tx_sigops;
            block.vtx.push(tx.clone());

            // Anything deferred on this parent becomes eligible again.
            let mut requeue = Vec::new();
            deferred.retain(|entry| {
                let entry_txid = solidus_chain::Hash256(entry.txid);
                let ready = self
                    .mempool
                    .get(&entry_txid)
                    .map(|p| {
                        p.tx.vin.iter().all(|txin| {
                            !self.mempool.contains(&txin.prevout.txid)
                                || included.contains(&txin.prevout.txid)
                        })
                    })
                    .unwrap_or(false);
                if ready {
                    requeue.push(entry.clone().with_by_fee(by_fee));
                    false
                } else {
                    true
                }
            });
            for entry in requeue {
                heap.push(entry);
            }
        }

        debug!(
            txs = block.vtx.len(),
            size = block_size,
            "Mempool selection complete"
        );
        Ok(())
    }

    /// Sign the block with the coinstake key.
    ///
    /// Only the holder of the staking key can produce a valid signature
    /// for this kernel; a failure here is fatal.
    pub fn sign_block(&self, block: &mut Block, key: &WalletKey) -> StakingResult<()> {
        let hash = block.hash();
        block.signature = key.sign(hash.as_bytes());
        if block.signature.len() != 64 {
            return Err(StakingError::Fatal("block signature malformed".to_string()));
        }
        info!(hash = %hash, "Proof-of-stake block signed");
        Ok(())
    }
}
