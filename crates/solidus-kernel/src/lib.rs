//! # solidus-kernel
//!
//! The proof-of-stake lottery.
//!
//! This crate provides:
//! - The kernel evaluator: a pure function from `(output, slot time)` to
//!   a hit or a miss against the coin-age-weighted target
//! - The coin-age model shared by consensus and the wallet UI
//! - The advisory [`KernelRecord`] projection used to estimate minting
//!   probabilities over a time window
//!
//! Everything on the consensus path is integer arithmetic; the
//! floating-point probability helpers never feed a consensus decision.

mod coinage;
mod error;
mod kernel;
mod record;

pub use coinage::{age_days, coin_day, coin_day_weight, expected_reward, proof_of_stake_reward};
pub use error::{KernelError, KernelResult};
pub use kernel::{KernelEvaluator, KernelHit, KernelInput};
pub use record::KernelRecord;
