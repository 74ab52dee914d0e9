//! Block index and chain view.
//!
//! The chain view is a read-only projection of the best chain: height,
//! best hash, timestamps, targets, and predecessor walks. The tip is
//! replaced atomically under a short write lock; readers take a cloned
//! snapshot and never observe a partially updated tip.

use crate::difficulty::{bits_to_difficulty, bits_to_target, target_to_bits};
use crate::types::{sha256d, Hash256};
use crate::{Block, ChainParams, TimeData};
use num_bigint::BigUint;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// One entry of the block index.
#[derive(Debug, Clone)]
pub struct BlockIndex {
    /// Block hash.
    pub hash: Hash256,
    /// Hash of the predecessor.
    pub prev_hash: Hash256,
    /// Height in the chain.
    pub height: u32,
    /// Block timestamp.
    pub n_time: u32,
    /// Compact target this block was produced under.
    pub bits: u32,
    /// Whether the block carries a coinstake.
    pub proof_of_stake: bool,
    /// Money supply after this block.
    pub money_supply: i64,
    /// Stake modifier constraining future kernels.
    pub stake_modifier: u64,
    /// Checksum over the modifier chain, recorded for audit.
    pub stake_modifier_checksum: u32,
}

impl BlockIndex {
    /// Checksum chained from the predecessor's checksum, this entry's
    /// modifier and its hash.
    pub fn compute_modifier_checksum(prev_checksum: u32, modifier: u64, hash: &Hash256) -> u32 {
        let mut data = Vec::with_capacity(44);
        data.extend_from_slice(&prev_checksum.to_le_bytes());
        data.extend_from_slice(&modifier.to_le_bytes());
        data.extend_from_slice(hash.as_bytes());
        let digest = sha256d(&data);
        u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
    }
}

/// Immutable snapshot of the best chain, taken once per staking tick.
#[derive(Debug, Clone)]
pub struct ChainTip {
    /// Height of the best block.
    pub height: u32,
    /// Hash of the best block.
    pub best_hash: Hash256,
    /// Timestamp of the best block.
    pub n_time: u32,
    /// Network-adjusted time when the snapshot was taken.
    pub adjusted_time: i64,
    /// Current proof-of-stake target.
    pub pos_bits: u32,
    /// Money supply at the tip.
    pub money_supply: i64,
}

/// Verdict from the chain ingress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockAccept {
    /// Block connected to the best chain.
    Accepted,
    /// Block was rejected; the reason is logged by the ingress.
    Rejected,
}

/// Chain ingress: where freshly minted blocks are handed over.
pub trait BlockSink: Send + Sync {
    /// Submit a block for connection, as if received from a peer.
    fn submit(&self, block: Block) -> BlockAccept;
}

/// Read-mostly view of the best chain.
pub struct ChainView {
    params: ChainParams,
    time: Arc<TimeData>,
    index: RwLock<HashMap<Hash256, Arc<BlockIndex>>>,
    tip: RwLock<Option<Arc<BlockIndex>>>,
    /// Heights the network claims to be at, fed by the sync layer.
    peer_best_height: RwLock<u32>,
}

impl ChainView {
    /// Empty chain view.
    pub fn new(params: ChainParams, time: Arc<TimeData>) -> Self {
        Self {
            params,
            time,
            index: RwLock::new(HashMap::new()),
            tip: RwLock::new(None),
            peer_best_height: RwLock::new(0),
        }
    }

    /// Network parameters.
    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Clock state.
    pub fn time(&self) -> &TimeData {
        &self.time
    }

    /// Network-adjusted time.
    pub fn adjusted_time(&self) -> i64 {
        self.time.adjusted_time()
    }

    /// Attach an index entry, filling in its modifier checksum, and
    /// advance the tip if it extends the best chain.
    pub fn attach(&self, mut entry: BlockIndex) -> Arc<BlockIndex> {
        let prev_checksum = self
            .get(&entry.prev_hash)
            .map(|p| p.stake_modifier_checksum)
            .unwrap_or(0);
        entry.stake_modifier_checksum = BlockIndex::compute_modifier_checksum(
            prev_checksum,
            entry.stake_modifier,
            &entry.hash,
        );

        let entry = Arc::new(entry);
        self.index.write().insert(entry.hash, Arc::clone(&entry));

        let mut tip = self.tip.write();
        let advance = tip.as_ref().map(|t| entry.height > t.height).unwrap_or(true);
        if advance {
            debug!(height = entry.height, hash = %entry.hash, "Chain tip advanced");
            *tip = Some(Arc::clone(&entry));
        }
        entry
    }

    /// Look up an index entry by hash.
    pub fn get(&self, hash: &Hash256) -> Option<Arc<BlockIndex>> {
        self.index.read().get(hash).cloned()
    }

    /// The best index entry, if any block is connected.
    pub fn best_index(&self) -> Option<Arc<BlockIndex>> {
        self.tip.read().clone()
    }

    /// Height of the best block; zero on an empty chain.
    pub fn height(&self) -> u32 {
        self.best_index().map(|t| t.height).unwrap_or(0)
    }

    /// Immutable tip snapshot.
    pub fn best(&self) -> Option<ChainTip> {
        let tip = self.best_index()?;
        Some(ChainTip {
            height: tip.height,
            best_hash: tip.hash,
            n_time: tip.n_time,
            adjusted_time: self.adjusted_time(),
            pos_bits: self.next_target_required(true),
            money_supply: tip.money_supply,
        })
    }

    /// Walk back from `from` to the most recent entry of the requested
    /// proof kind.
    pub fn last_index_of_kind(
        &self,
        from: Arc<BlockIndex>,
        proof_of_stake: bool,
    ) -> Option<Arc<BlockIndex>> {
        let mut cursor = from;
        loop {
            if cursor.proof_of_stake == proof_of_stake {
                return Some(cursor);
            }
            cursor = self.get(&cursor.prev_hash)?;
        }
    }

    /// Most recent proof-of-stake entry at or below the tip.
    pub fn last_pos_index(&self) -> Option<Arc<BlockIndex>> {
        self.last_index_of_kind(self.best_index()?, true)
    }

    /// Compact target required for the next block of the given kind.
    ///
    /// Exponential moving retarget over the spacing of the last two
    /// blocks of that kind, clamped at the network limit.
    pub fn next_target_required(&self, proof_of_stake: bool) -> u32 {
        let limit = self.params.pos_limit_bits;
        let Some(best) = self.best_index() else {
            return limit;
        };
        let Some(last) = self.last_index_of_kind(best, proof_of_stake) else {
            return limit;
        };
        let Some(prev_of_last) = self
            .get(&last.prev_hash)
            .and_then(|p| self.last_index_of_kind(p, proof_of_stake))
        else {
            return limit;
        };

        let spacing_target = self.params.pos_target_spacing;
        let actual = (last.n_time as i64 - prev_of_last.n_time as i64)
            .clamp(spacing_target / 10, spacing_target * 10);
        // Smoothing interval of one day's worth of blocks.
        let interval = (ONE_DAY_SPACING / spacing_target).max(2);

        let Ok(prev_target) = bits_to_target(last.bits) else {
            return limit;
        };
        let numerator =
            BigUint::from(((interval - 1) * spacing_target + 2 * actual).max(1) as u64);
        let denominator = BigUint::from(((interval + 1) * spacing_target) as u64);
        let new_target = prev_target * numerator / denominator;

        let limit_target = bits_to_target(limit).expect("limit bits are valid");
        if new_target > limit_target {
            limit
        } else {
            target_to_bits(&new_target)
        }
    }

    /// Human-readable difficulty of the last block of the given kind.
    pub fn difficulty(&self, proof_of_stake: bool) -> f64 {
        self.best_index()
            .and_then(|best| self.last_index_of_kind(best, proof_of_stake))
            .map(|index| bits_to_difficulty(index.bits))
            .unwrap_or_else(|| bits_to_difficulty(self.params.pos_limit_bits))
    }

    /// Record the best height claimed by peers.
    pub fn set_peer_best_height(&self, height: u32) {
        *self.peer_best_height.write() = height;
        info!(height, "Peer best height updated");
    }

    /// Whether our tip has caught up with the network's claimed height.
    pub fn is_synced(&self) -> bool {
        self.height() >= *self.peer_best_height.read()
    }
}

const ONE_DAY_SPACING: i64 = crate::ONE_DAY;
