//! Kernel records: the staking-probability projection of an owned output.
//!
//! A kernel record is what the UI and the `scaninput`-style RPCs see: one
//! owned output with enough metadata to estimate its chance of minting a
//! block within a time window. The probability math is a continuous
//! approximation and is advisory only.

use crate::coinage;
use solidus_chain::{ChainParams, Hash256, COIN, ONE_DAY};

/// Staking-probability projection of one owned output.
#[derive(Debug, Clone)]
pub struct KernelRecord {
    /// Transaction carrying the output.
    pub txid: Hash256,
    /// Transaction timestamp.
    pub n_time: i64,
    /// Destination address, or an empty string when none decodes.
    pub address: String,
    /// Output value in sub-units.
    pub value: i64,
    /// Output index.
    pub idx: u32,
    /// Whether the wallet has already spent this output.
    pub spent: bool,
    // Memo for the last probability query.
    prev_difficulty: f64,
    prev_minutes: i64,
    prev_probability: f64,
}

impl KernelRecord {
    /// New record for an output.
    pub fn new(
        txid: Hash256,
        n_time: i64,
        address: String,
        value: i64,
        idx: u32,
        spent: bool,
    ) -> Self {
        Self {
            txid,
            n_time,
            address,
            value,
            idx,
            spent,
            prev_difficulty: 0.0,
            prev_minutes: 0,
            prev_probability: 0.0,
        }
    }

    /// Display label, `txid-idx`.
    pub fn tx_label(&self) -> String {
        format!("{}-{:03}", self.txid, self.idx)
    }

    /// Age in whole days.
    pub fn age_days(&self, now: i64) -> i64 {
        coinage::age_days(self.n_time, now)
    }

    /// Coin-days currently carried.
    pub fn coin_day(&self, params: &ChainParams, now: i64) -> u64 {
        coinage::coin_day(params, self.value, self.n_time, now)
    }

    /// Reward if this output minted `minutes` from now.
    pub fn pos_reward(&self, params: &ChainParams, minutes: i64, now: i64) -> i64 {
        coinage::expected_reward(params, self.value, self.n_time, minutes, now)
    }

    /// Per-second success probability at a future offset.
    ///
    /// The aged weight is clamped at `stake_min_age + stake_max_age` and
    /// shifted by the minimum age, matching the evaluator's clamp; the
    /// target side collapses to `1 / (2^32 · difficulty)`.
    pub fn prob_to_mint_stake(
        &self,
        params: &ChainParams,
        difficulty: f64,
        time_offset: i64,
        now: i64,
    ) -> f64 {
        if difficulty <= 0.0 {
            return 0.0;
        }
        let weight = (now - self.n_time + time_offset)
            .min(params.stake_min_age + params.stake_max_age)
            - params.stake_min_age;
        let coin_age = ((self.value as i128 * weight as i128)
            / (COIN as i128 * ONE_DAY as i128))
            .max(0) as f64;
        coin_age / (2f64.powi(32) * difficulty)
    }

    /// Probability of minting at least one block within `minutes`.
    ///
    /// The window splits into full days and a remainder; within each
    /// segment the per-second probability is treated as constant and the
    /// failure probabilities multiply. The result is memoized on
    /// `(difficulty, minutes)`.
    pub fn prob_to_mint_within_minutes(
        &mut self,
        params: &ChainParams,
        difficulty: f64,
        minutes: i64,
        now: i64,
    ) -> f64 {
        if difficulty == self.prev_difficulty && minutes == self.prev_minutes {
            return self.prev_probability;
        }

        let full_days = minutes / (60 * 24);
        let rest_minutes = minutes % (60 * 24);

        let mut fail = 1.0f64;
        for day in 0..full_days {
            let offset = day * ONE_DAY;
            let p = self.prob_to_mint_stake(params, difficulty, offset, now);
            fail *= (1.0 - p).powi(ONE_DAY as i32);
        }
        let offset = full_days * ONE_DAY;
        let p = self.prob_to_mint_stake(params, difficulty, offset, now);
        fail *= (1.0 - p).powi((60 * rest_minutes) as i32);

        let prob = 1.0 - fail;
        self.prev_probability = prob;
        self.prev_difficulty = difficulty;
        self.prev_minutes = minutes;
        prob
    }
}
