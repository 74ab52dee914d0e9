//! Network parameters.
//!
//! Consensus constants that differ between networks live in a single
//! [`ChainParams`] record handed to every subsystem. Nothing in the
//! workspace reads them from globals.

/// Base monetary unit: 10^8 sub-units per coin.
pub const COIN: i64 = 100_000_000;

/// One hundredth of a coin.
pub const CENT: i64 = 1_000_000;

/// Seconds per day.
pub const ONE_DAY: i64 = 86_400;

/// Network parameters record.
#[derive(Debug, Clone)]
pub struct ChainParams {
    /// Minimum age before an output earns any stake weight, in seconds.
    pub stake_min_age: i64,
    /// Age at which stake weight stops growing, in seconds.
    pub stake_max_age: i64,
    /// Depth a coinbase/coinstake output needs before it is spendable.
    pub coinbase_maturity: i32,
    /// Stake slot granularity in seconds. Candidate times are aligned to it.
    pub stake_granularity: u32,
    /// How far into the future a block timestamp may run ahead of
    /// adjusted time, in seconds.
    pub max_future_drift: i64,
    /// Lower bound for the slot window: slots earlier than
    /// `now - max_reorg_depth` are never searched.
    pub max_reorg_depth: i64,
    /// Annual proof-of-stake interest paid per coin, in sub-units.
    pub coin_year_reward: i64,
    /// Target spacing between proof-of-stake blocks, in seconds.
    pub pos_target_spacing: i64,
    /// Most permissive proof-of-stake target, in compact form.
    pub pos_limit_bits: u32,
    /// Minimum relay/inclusion fee per kilobyte.
    pub min_tx_fee: i64,
    /// Outputs below this value are rejected as dust.
    pub min_input_value: i64,
    /// Largest block the assembler will produce, in bytes.
    pub max_block_size: usize,
    /// Signature-operation budget per block.
    pub max_block_sigops: usize,
    /// Number of pre-generated keys the pool keeps available.
    pub keypool_size: usize,
    /// Coinstake outputs larger than this are split in two.
    pub stake_split_threshold: i64,
}

impl ChainParams {
    /// Main network parameters.
    pub fn mainnet() -> Self {
        Self {
            stake_min_age: 30 * ONE_DAY,
            stake_max_age: 90 * ONE_DAY,
            coinbase_maturity: 500,
            stake_granularity: 16,
            max_future_drift: 15 * 60,
            max_reorg_depth: 60 * 60,
            coin_year_reward: 2 * CENT,
            pos_target_spacing: 10 * 60,
            pos_limit_bits: 0x1e00ffff,
            min_tx_fee: CENT,
            min_input_value: CENT / 100,
            max_block_size: 1_000_000,
            max_block_sigops: 20_000,
            keypool_size: 100,
            stake_split_threshold: 1_000 * COIN,
        }
    }

    /// Shortened parameters for tests: ages in minutes rather than weeks,
    /// shallow maturity, permissive target.
    pub fn regtest() -> Self {
        Self {
            stake_min_age: 60,
            stake_max_age: 600,
            coinbase_maturity: 4,
            stake_granularity: 16,
            max_future_drift: 15 * 60,
            max_reorg_depth: 60 * 60,
            coin_year_reward: 2 * CENT,
            pos_target_spacing: 60,
            pos_limit_bits: 0x207fffff,
            min_tx_fee: CENT,
            min_input_value: CENT / 100,
            max_block_size: 1_000_000,
            max_block_sigops: 20_000,
            keypool_size: 10,
            stake_split_threshold: 1_000 * COIN,
        }
    }
}

impl Default for ChainParams {
    fn default() -> Self {
        Self::mainnet()
    }
}
