//! Stake kernel evaluation.
//!
//! For a candidate `(output, t)` the kernel hash is a double-SHA256 over
//! a fixed little-endian layout:
//!
//! ```text
//! stake_modifier (8) ‖ prev_block_time (4) ‖ tx_offset (4) ‖ tx_time (4) ‖ vout (4) ‖ t (4)
//! ```
//!
//! The candidate mints a block when
//!
//! ```text
//! hash * COIN * ONE_DAY  <=  target(bits) * value * weight
//! ```
//!
//! with `weight = clamp(t - tx_time - stake_min_age, 0, stake_max_age)`.
//! All comparisons run in big-integer arithmetic; there is no overflow
//! path. The evaluator is pure: identical inputs always produce the
//! identical hash and decision.

use crate::{KernelError, KernelResult};
use solidus_chain::{bits_to_target, sha256d, ChainParams, Hash256, COIN, ONE_DAY};
use num_bigint::BigUint;
use tracing::trace;

/// The static half of a kernel: everything that does not depend on the
/// candidate slot time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelInput {
    /// Stake modifier of the block holding the staked output.
    pub stake_modifier: u64,
    /// Timestamp of the block holding the staked output.
    pub prev_block_time: u32,
    /// Byte offset of the staked transaction inside its block.
    pub tx_offset: u32,
    /// Timestamp of the staked transaction.
    pub tx_time: u32,
    /// Index of the staked output.
    pub vout: u32,
}

impl KernelInput {
    /// The 24-byte static prefix of the hashed layout.
    pub fn static_bytes(&self) -> [u8; 24] {
        let mut out = [0u8; 24];
        out[0..8].copy_from_slice(&self.stake_modifier.to_le_bytes());
        out[8..12].copy_from_slice(&self.prev_block_time.to_le_bytes());
        out[12..16].copy_from_slice(&self.tx_offset.to_le_bytes());
        out[16..20].copy_from_slice(&self.tx_time.to_le_bytes());
        out[20..24].copy_from_slice(&self.vout.to_le_bytes());
        out
    }

    /// Kernel hash for a candidate slot time.
    pub fn kernel_hash(&self, t: u32) -> Hash256 {
        let mut data = [0u8; 28];
        data[0..24].copy_from_slice(&self.static_bytes());
        data[24..28].copy_from_slice(&t.to_le_bytes());
        Hash256(sha256d(&data))
    }
}

/// A successful kernel evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelHit {
    /// The winning slot time.
    pub time: u32,
    /// The kernel hash; smaller hashes win ties.
    pub hash: Hash256,
}

impl KernelHit {
    /// Tie-break: whether this hit beats `other`.
    ///
    /// The numerically smaller hash wins, under the same little-endian
    /// interpretation the target test uses.
    pub fn beats(&self, other: &KernelHit) -> bool {
        self.hash.0.iter().rev().cmp(other.hash.0.iter().rev()) == std::cmp::Ordering::Less
    }
}

/// The kernel evaluator.
#[derive(Debug, Clone)]
pub struct KernelEvaluator {
    params: ChainParams,
}

impl KernelEvaluator {
    /// Evaluator bound to a parameter set.
    pub fn new(params: ChainParams) -> Self {
        Self { params }
    }

    /// Clamped coin-age weight in seconds for a candidate time.
    pub fn coin_age_weight(&self, tx_time: u32, t: u32) -> i64 {
        let raw = t as i64 - tx_time as i64 - self.params.stake_min_age;
        raw.clamp(0, self.params.stake_max_age)
    }

    /// Evaluate a single `(output, t)` candidate.
    ///
    /// Returns `Ok(None)` when the candidate misses (zero weight, slot
    /// before the transaction, or hash above target).
    pub fn check(
        &self,
        input: &KernelInput,
        value: i64,
        bits: u32,
        t: u32,
    ) -> KernelResult<Option<KernelHit>> {
        if value <= 0 {
            return Err(KernelError::InvalidValue(value));
        }
        if t <= input.tx_time {
            return Ok(None);
        }
        let weight = self.coin_age_weight(input.tx_time, t);
        if weight == 0 {
            return Ok(None);
        }

        let target = bits_to_target(bits)?;
        let hash = input.kernel_hash(t);
        let hash_int = BigUint::from_bytes_le(hash.as_bytes());

        let lhs = hash_int * BigUint::from((COIN as u64) * (ONE_DAY as u64));
        let rhs = target * BigUint::from(value as u64) * BigUint::from(weight as u64);

        if lhs <= rhs {
            trace!(t, hash = %hash, "Kernel hit");
            Ok(Some(KernelHit { time: t, hash }))
        } else {
            Ok(None)
        }
    }

    /// Scan the slot window `[t0, t1]`, aligned to the stake granularity,
    /// and return the hit with the smallest hash.
    pub fn scan_window(
        &self,
        input: &KernelInput,
        value: i64,
        bits: u32,
        t0: u32,
        t1: u32,
    ) -> KernelResult<Option<KernelHit>> {
        let step = self.params.stake_granularity;
        let mut best: Option<KernelHit> = None;
        let mut t = t0.div_ceil(step) * step;
        while t <= t1 {
            if let Some(hit) = self.check(input, value, bits, t)? {
                if best.map(|b| hit.beats(&b)).unwrap_or(true) {
                    best = Some(hit);
                }
            }
            t = match t.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(best)
    }
}
