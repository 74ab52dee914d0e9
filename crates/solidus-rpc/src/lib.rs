//! # solidus-rpc
//!
//! JSON-RPC surface of the Solidus node.
//!
//! Requests are `{method, params, id}` objects posted to `/`; responses
//! carry `{result, error, id}` with the stable integer error codes the
//! wallet tooling expects. A failing method never takes the server
//! down.

mod error;
mod handlers;
mod params;
mod server;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{RpcError, RpcResult};
pub use server::{dispatch, router, serve};

use solidus_chain::ChainView;
use solidus_mempool::Mempool;
use solidus_staking::StakeMinter;
use solidus_wallet::Wallet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Services record shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Chain view.
    pub chain: Arc<ChainView>,
    /// Wallet.
    pub wallet: Arc<Wallet>,
    /// Mempool.
    pub mempool: Arc<Mempool>,
    /// Staking worker, for stats and warnings.
    pub minter: Arc<StakeMinter>,
    /// Process-wide shutdown flag; `encryptwallet` raises it.
    pub shutdown: Arc<AtomicBool>,
}
