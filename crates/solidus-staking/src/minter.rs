//! The staking loop.
//!
//! A single long-lived worker. Every tick it takes one snapshot of the
//! chain tip and the wallet's stakable outputs, scans the slot window
//! with the kernel evaluator, and on a hit assembles, signs and submits
//! a block. Transient failures wait for the next tick; fatal ones stop
//! the worker and leave a warning for `getinfo`.

use crate::{BlockAssembler, StakingError, StakingResult};
use parking_lot::{Mutex, RwLock};
use solidus_chain::{BlockAccept, BlockSink, ChainView, Hash256, OutPoint};
use solidus_kernel::{KernelEvaluator, KernelHit, KernelInput};
use solidus_mempool::Mempool;
use solidus_wallet::{OwnedOutput, Wallet};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Tick period of the staking loop.
const TICK: Duration = Duration::from_millis(500);

/// Staking statistics.
#[derive(Debug, Clone, Default)]
pub struct MinterStats {
    /// Kernel hits found.
    pub kernels_found: u64,
    /// Blocks accepted by the chain ingress.
    pub blocks_minted: u64,
    /// Stakable outputs in the last snapshot.
    pub stake_inputs: usize,
    /// Seconds covered by the last slot scan.
    pub last_search_interval: i64,
}

/// The staking worker.
pub struct StakeMinter {
    chain: Arc<ChainView>,
    wallet: Arc<Wallet>,
    evaluator: KernelEvaluator,
    assembler: BlockAssembler,
    sink: Arc<dyn BlockSink>,
    shutdown: AtomicBool,
    running: AtomicBool,
    warning: RwLock<Option<String>>,
    stats: RwLock<MinterStats>,
    /// `(prev_hash, coinstake input)` pairs already minted, so a race
    /// can never produce two blocks for the same kernel.
    minted: Mutex<HashSet<(Hash256, OutPoint)>>,
    last_search_end: AtomicI64,
}

impl StakeMinter {
    /// New minter over the shared services.
    pub fn new(
        chain: Arc<ChainView>,
        mempool: Arc<Mempool>,
        wallet: Arc<Wallet>,
        sink: Arc<dyn BlockSink>,
    ) -> Self {
        let evaluator = KernelEvaluator::new(chain.params().clone());
        let assembler = BlockAssembler::new(
            Arc::clone(&chain),
            Arc::clone(&mempool),
            Arc::clone(&wallet),
        );
        Self {
            chain,
            wallet,
            evaluator,
            assembler,
            sink,
            shutdown: AtomicBool::new(false),
            running: AtomicBool::new(false),
            warning: RwLock::new(None),
            stats: RwLock::new(MinterStats::default()),
            minted: Mutex::new(HashSet::new()),
            last_search_end: AtomicI64::new(0),
        }
    }

    /// Ask the loop to exit at the next tick boundary.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Whether the loop is alive.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Persistent warning left by a fatal failure.
    pub fn warning(&self) -> Option<String> {
        self.warning.read().clone()
    }

    /// Current statistics.
    pub fn stats(&self) -> MinterStats {
        self.stats.read().clone()
    }

    /// Whether the wallet state permits staking: an unencrypted wallet
    /// stakes freely, an encrypted one only under a minting-only
    /// unlock.
    pub fn staking_allowed(&self) -> bool {
        if self.wallet.is_locked() {
            return false;
        }
        if self.wallet.is_crypted() && !self.wallet.is_mint_only() {
            return false;
        }
        true
    }

    /// One tick's work: snapshot, scan, and on a hit assemble and
    /// submit. Returns the accepted block hash, if any.
    pub fn try_mint_once(&self) -> StakingResult<Option<Hash256>> {
        let tip = self
            .chain
            .best()
            .ok_or_else(|| StakingError::Retryable("no chain tip".to_string()))?;
        let params = self.chain.params().clone();
        let now = tip.adjusted_time;

        // Slot window: never beyond the drift bound, never below the
        // reorg horizon.
        let t1 = now + params.max_future_drift;
        let t0 = (tip.n_time as i64 + 1).max(now - params.max_reorg_depth);
        if t0 > t1 {
            return Ok(None);
        }
        let (t0, t1) = (t0 as u32, t1 as u32);

        let snapshot = self.wallet.spendable(1, false);
        {
            let mut stats = self.stats.write();
            stats.stake_inputs = snapshot.len();
            stats.last_search_interval = (t1 - t0) as i64;
        }
        self.last_search_end.store(t1 as i64, Ordering::SeqCst);

        let mut best: Option<(KernelHit, OwnedOutput)> = None;
        for output in snapshot {
            let Some(index) = self.chain.get(&output.block_hash) else {
                continue;
            };
            let input = KernelInput {
                stake_modifier: index.stake_modifier,
                prev_block_time: output.block_time,
                tx_offset: output.tx_offset,
                tx_time: output.tx_time,
                vout: output.vout,
            };
            if let Some(hit) =
                self.evaluator
                    .scan_window(&input, output.value, tip.pos_bits, t0, t1)?
            {
                if best.as_ref().map(|(b, _)| hit.beats(b)).unwrap_or(true) {
                    best = Some((hit, output));
                }
            }
        }

        let Some((hit, winner)) = best else {
            return Ok(None);
        };
        self.stats.write().kernels_found += 1;
        debug!(slot = hit.time, hash = %hit.hash, "Kernel hit selected");

        // One block per (prev, kernel input) pair, ever.
        let minted_key = (tip.best_hash, OutPoint::new(winner.txid, winner.vout));
        if self.minted.lock().contains(&minted_key) {
            return Ok(None);
        }

        let (coinstake, key) = self.assembler.create_coinstake(&winner, hit.time)?;
        let mut block = self.assembler.create_block(coinstake, tip.pos_bits)?;
        self.assembler.sign_block(&mut block, &key)?;

        if block.header.n_time as i64 > self.chain.adjusted_time() + params.max_future_drift {
            return Err(StakingError::Fatal(
                "assembled block timestamp beyond drift bound".to_string(),
            ));
        }
        // The tip may have moved while assembling.
        let current_best = self
            .chain
            .best_index()
            .ok_or_else(|| StakingError::Retryable("no chain tip".to_string()))?;
        if block.header.prev_hash != current_best.hash {
            return Err(StakingError::Retryable("generated block is stale".to_string()));
        }

        let hash = block.hash();
        match self.sink.submit(block) {
            BlockAccept::Accepted => {
                self.minted.lock().insert(minted_key);
                self.stats.write().blocks_minted += 1;
                info!(hash = %hash, height = tip.height + 1, "Minted proof-of-stake block");
                Ok(Some(hash))
            }
            BlockAccept::Rejected => Err(StakingError::Retryable(
                "minted block rejected by chain ingress".to_string(),
            )),
        }
    }

    /// The staking loop. At most one instance runs per minter.
    pub async fn run(self: Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Staking loop already running");
            return;
        }
        info!("Staking loop started");

        while !self.shutdown.load(Ordering::SeqCst) {
            tokio::time::sleep(TICK).await;
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            if !self.staking_allowed() {
                continue;
            }
            if !self.chain.is_synced() {
                continue;
            }
            match self.try_mint_once() {
                Ok(_) => {}
                Err(err) if err.is_retryable() => {
                    debug!(error = %err, "Staking tick failed, retrying");
                }
                Err(err) => {
                    error!(error = %err, "Staking loop stopped");
                    *self.warning.write() = Some(err.to_string());
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Staking loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::Harness;
    use solidus_chain::{Block, BlockIndex, COIN};
    use solidus_wallet::verify_signature;

    /// Sink recording submissions with a switchable verdict.
    struct RecordingSink {
        accept: AtomicBool,
        blocks: Mutex<Vec<Block>>,
    }

    impl RecordingSink {
        fn new(accept: bool) -> Arc<Self> {
            Arc::new(Self {
                accept: AtomicBool::new(accept),
                blocks: Mutex::new(Vec::new()),
            })
        }
    }

    impl BlockSink for RecordingSink {
        fn submit(&self, block: Block) -> BlockAccept {
            self.blocks.lock().push(block);
            if self.accept.load(Ordering::SeqCst) {
                BlockAccept::Accepted
            } else {
                BlockAccept::Rejected
            }
        }
    }

    fn minter_with_sink(harness: &Harness, sink: Arc<RecordingSink>) -> StakeMinter {
        StakeMinter::new(
            Arc::clone(&harness.chain),
            Arc::clone(&harness.mempool),
            Arc::clone(&harness.wallet),
            sink,
        )
    }

    #[test]
    fn test_mints_a_valid_block() {
        // 1000 coins at maximum age against the permissive regtest
        // target hit on every slot, so one tick must mint.
        let harness = Harness::new(1_000 * COIN);
        let sink = RecordingSink::new(true);
        let minter = minter_with_sink(&harness, Arc::clone(&sink));

        let hash = minter.try_mint_once().unwrap().expect("kernel hit");
        let blocks = sink.blocks.lock();
        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];

        assert_eq!(block.hash(), hash);
        assert!(block.is_proof_of_stake());
        assert_eq!(
            block.vtx[1].vin[0].prevout,
            OutPoint::new(harness.funding_txid, 0)
        );
        // Staking safety: the timestamp respects the drift bound.
        let drift_bound =
            harness.chain.adjusted_time() + harness.params.max_future_drift;
        assert!((block.header.n_time as i64) <= drift_bound);
        // Signed by the staking key.
        let key = harness
            .wallet
            .keystore()
            .get_key(&solidus_chain::extract_destination(&harness.winner().script_pub_key).unwrap())
            .unwrap();
        assert!(verify_signature(
            &key.public,
            block.hash().as_bytes(),
            &block.signature
        ));

        assert_eq!(minter.stats().blocks_minted, 1);
        assert!(minter.stats().kernels_found >= 1);
    }

    #[test]
    fn test_never_mints_twice_for_same_kernel() {
        let harness = Harness::new(1_000 * COIN);
        let sink = RecordingSink::new(true);
        let minter = minter_with_sink(&harness, Arc::clone(&sink));

        assert!(minter.try_mint_once().unwrap().is_some());
        // Tip unchanged: the same (prev, input) pair must not produce a
        // second block.
        assert!(minter.try_mint_once().unwrap().is_none());
        assert_eq!(sink.blocks.lock().len(), 1);
    }

    #[test]
    fn test_mints_again_after_tip_advances() {
        let harness = Harness::new(1_000 * COIN);
        let sink = RecordingSink::new(true);
        let minter = minter_with_sink(&harness, Arc::clone(&sink));

        assert!(minter.try_mint_once().unwrap().is_some());

        let best = harness.chain.best_index().unwrap();
        harness.chain.attach(BlockIndex {
            hash: Hash256::digest(b"next"),
            prev_hash: best.hash,
            height: best.height + 1,
            n_time: best.n_time + 16,
            bits: harness.bits,
            proof_of_stake: true,
            money_supply: 0,
            stake_modifier: 99,
            stake_modifier_checksum: 0,
        });

        assert!(minter.try_mint_once().unwrap().is_some());
        assert_eq!(sink.blocks.lock().len(), 2);
    }

    #[test]
    fn test_rejection_is_retryable_and_not_recorded() {
        let harness = Harness::new(1_000 * COIN);
        let sink = RecordingSink::new(false);
        let minter = minter_with_sink(&harness, Arc::clone(&sink));

        let err = minter.try_mint_once().unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(minter.stats().blocks_minted, 0);

        // After the ingress recovers the same kernel may mint.
        sink.accept.store(true, Ordering::SeqCst);
        assert!(minter.try_mint_once().unwrap().is_some());
    }

    #[test]
    fn test_no_hit_without_stakable_outputs() {
        let harness = Harness::new(1_000 * COIN);
        // Reserve everything: nothing left to stake with.
        harness
            .wallet
            .set_reserve_balance(2_000 * COIN)
            .unwrap();
        let sink = RecordingSink::new(true);
        let minter = minter_with_sink(&harness, Arc::clone(&sink));

        assert!(minter.try_mint_once().unwrap().is_none());
        assert_eq!(minter.stats().stake_inputs, 0);
    }

    #[test]
    fn test_staking_gates() {
        let harness = Harness::new(1_000 * COIN);
        let sink = RecordingSink::new(true);
        let minter = minter_with_sink(&harness, sink);

        // Plain wallet stakes.
        assert!(minter.staking_allowed());

        // Encrypted and locked: no staking.
        harness.wallet.keystore().encrypt("p").unwrap();
        assert!(!minter.staking_allowed());

        // Fully unlocked (spends enabled): still no staking.
        harness.wallet.keystore().unlock("p", false).unwrap();
        assert!(!minter.staking_allowed());

        // Minting-only unlock: staking allowed.
        harness.wallet.keystore().lock();
        harness.wallet.keystore().unlock("p", true).unwrap();
        assert!(minter.staking_allowed());
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let harness = Harness::new(COIN);
        let sink = RecordingSink::new(true);
        let minter = Arc::new(minter_with_sink(&harness, sink));

        let handle = tokio::spawn(Arc::clone(&minter).run());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(minter.is_running());

        minter.request_shutdown();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop exits at the tick boundary")
            .unwrap();
        assert!(!minter.is_running());
    }
}
