//! Coin-age accounting shared by consensus and the wallet UI.
//!
//! Coin-age is `value × eligible age` expressed in coin-days. The
//! eligible age starts accruing after `stake_min_age` and stops growing
//! at `stake_max_age`. Integer arithmetic throughout.

use solidus_chain::{ChainParams, COIN, ONE_DAY};

/// Age of an output in whole days, unclamped.
pub fn age_days(n_time: i64, now: i64) -> i64 {
    (now - n_time) / ONE_DAY
}

/// Clamped stake weight in seconds: zero inside the minimum-age window,
/// capped at the maximum age.
pub fn coin_day_weight(params: &ChainParams, n_time: i64, now: i64) -> i64 {
    let weight = now - n_time - params.stake_min_age;
    if weight < 0 {
        return 0;
    }
    weight.min(params.stake_max_age)
}

/// Coin-days carried by an output.
pub fn coin_day(params: &ChainParams, value: i64, n_time: i64, now: i64) -> u64 {
    let weight = coin_day_weight(params, n_time, now);
    let coin_age = (value as i128 * weight as i128) / (COIN as i128 * ONE_DAY as i128);
    coin_age.max(0) as u64
}

/// Proof-of-stake reward for a given coin-age.
///
/// `coin_age * coin_year_reward * 33 / (365 * 33 + 8)` — the 33/12053
/// factor converts coin-days into coin-years with the leap-year
/// correction. Monotone non-decreasing in coin-age.
pub fn proof_of_stake_reward(params: &ChainParams, coin_age: u64) -> i64 {
    let subsidy =
        coin_age as i128 * params.coin_year_reward as i128 * 33 / (365 * 33 + 8);
    subsidy as i64
}

/// Reward an output would earn if it minted `lookahead_minutes` from now.
///
/// Zero while the aged weight is still below the minimum stake age. The
/// lookahead weight is deliberately unclamped: the estimate answers
/// "what if it mints then", not "what is eligible now".
pub fn expected_reward(
    params: &ChainParams,
    value: i64,
    n_time: i64,
    lookahead_minutes: i64,
    now: i64,
) -> i64 {
    let weight = now - n_time + lookahead_minutes * 60;
    if weight < params.stake_min_age {
        return 0;
    }
    let coin_age = ((value as i128 * weight as i128) / (COIN as i128 * ONE_DAY as i128)).max(0);
    proof_of_stake_reward(params, coin_age as u64)
}
