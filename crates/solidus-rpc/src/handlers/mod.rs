//! RPC method handlers, grouped by area.

pub mod info;
pub mod staking;
pub mod wallet;
