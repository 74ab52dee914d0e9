//! # solidus-staking
//!
//! Proof-of-stake block production.
//!
//! This crate provides:
//! - The block assembler: coinstake construction, mempool transaction
//!   selection under size and sigop budgets, header fill, block signing
//! - The staking loop: a single long-lived worker that snapshots the
//!   wallet's stakable outputs once per tick, runs the kernel evaluator
//!   across the slot window, and hands winning blocks to the chain
//!   ingress

mod assembler;
mod error;
mod minter;

#[cfg(test)]
pub(crate) mod testutil;

pub use assembler::BlockAssembler;
pub use error::{StakingError, StakingResult};
pub use minter::{MinterStats, StakeMinter};
