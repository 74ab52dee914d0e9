//! Shared fixtures for RPC handler tests.

use crate::AppState;
use solidus_chain::{
    script_for_address, Block, BlockAccept, BlockIndex, BlockSink, ChainParams, ChainView,
    Hash256, OutPoint, TimeData, Transaction, TxIn, TxOut,
};
use solidus_mempool::Mempool;
use solidus_staking::StakeMinter;
use solidus_wallet::Wallet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

struct NullSink;

impl BlockSink for NullSink {
    fn submit(&self, _block: Block) -> BlockAccept {
        BlockAccept::Accepted
    }
}

/// State over a regtest chain with eleven index entries and an empty
/// wallet.
pub fn rpc_state() -> AppState {
    let params = ChainParams::regtest();
    let chain = Arc::new(ChainView::new(params.clone(), Arc::new(TimeData::new())));
    let mut prev = Hash256::ZERO;
    for height in 0u32..=10 {
        let entry = BlockIndex {
            hash: Hash256::digest(&height.to_le_bytes()),
            prev_hash: prev,
            height,
            n_time: 1_000_000 + height * 60,
            bits: params.pos_limit_bits,
            proof_of_stake: height % 2 == 1,
            money_supply: (height as i64 + 1) * solidus_chain::COIN,
            stake_modifier: 0xabcd_0000 ^ height as u64,
            stake_modifier_checksum: 0,
        };
        prev = entry.hash;
        chain.attach(entry);
    }

    let mempool = Arc::new(Mempool::with_defaults());
    let wallet = Arc::new(Wallet::new(
        params,
        Arc::clone(&chain),
        Arc::clone(&mempool),
    ));
    let minter = Arc::new(StakeMinter::new(
        Arc::clone(&chain),
        Arc::clone(&mempool),
        Arc::clone(&wallet),
        Arc::new(NullSink),
    ));

    AppState {
        chain,
        wallet,
        mempool,
        minter,
        shutdown: Arc::new(AtomicBool::new(false)),
    }
}

/// State with `value` credited to a fresh wallet address at height 5.
pub fn state_with_funds(value: i64) -> AppState {
    let state = rpc_state();
    let address = state.wallet.new_address("").unwrap();

    let mut tx = Transaction::new(1_000_300);
    tx.vin.push(TxIn::from_outpoint(OutPoint::new(
        Hash256::digest(b"rpc funding"),
        0,
    )));
    tx.vout.push(TxOut::new(value, script_for_address(&address)));
    state.wallet.sync_transaction(
        &tx,
        Some((Hash256::digest(&5u32.to_le_bytes()), 5, 1_000_300, 81)),
    );
    state
}
