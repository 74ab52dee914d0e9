//! Shared test fixtures for the staking crate.

use crate::BlockAssembler;
use solidus_chain::{
    script_for_address, BlockIndex, ChainParams, ChainView, Hash256, OutPoint, TimeData,
    Transaction, TxIn, TxOut,
};
use solidus_mempool::Mempool;
use solidus_wallet::{OwnedOutput, Wallet};
use std::sync::Arc;

/// A chain, wallet and assembler with one old, stakable funding output.
pub struct Harness {
    pub params: ChainParams,
    pub chain: Arc<ChainView>,
    pub mempool: Arc<Mempool>,
    pub wallet: Arc<Wallet>,
    pub assembler: BlockAssembler,
    pub bits: u32,
    pub funding_txid: Hash256,
}

impl Harness {
    /// Regtest harness with a funding output of `value`.
    pub fn new(value: i64) -> Self {
        Self::with_params(ChainParams::regtest(), value)
    }

    /// Harness with explicit parameters.
    ///
    /// The chain holds eleven index entries with old timestamps, so the
    /// funding output is far past the maximum stake age by the time the
    /// tests run against the real clock.
    pub fn with_params(params: ChainParams, value: i64) -> Self {
        let chain = Arc::new(ChainView::new(params.clone(), Arc::new(TimeData::new())));
        let mut prev = Hash256::ZERO;
        for height in 0u32..=10 {
            let entry = BlockIndex {
                hash: Hash256::digest(&height.to_le_bytes()),
                prev_hash: prev,
                height,
                n_time: 1_000_000 + height * 60,
                bits: params.pos_limit_bits,
                proof_of_stake: false,
                money_supply: 0,
                stake_modifier: 0x1111_2222_3333_4444 ^ height as u64,
                stake_modifier_checksum: 0,
            };
            prev = entry.hash;
            chain.attach(entry);
        }

        let mempool = Arc::new(Mempool::with_defaults());
        let wallet = Arc::new(Wallet::new(
            params.clone(),
            Arc::clone(&chain),
            Arc::clone(&mempool),
        ));

        let address = wallet.new_address("").unwrap();
        let mut funding = Transaction::new(1_000_300);
        funding.vin.push(TxIn::from_outpoint(OutPoint::new(
            Hash256::digest(b"external funding"),
            0,
        )));
        funding
            .vout
            .push(TxOut::new(value, script_for_address(&address)));
        let funding_txid = funding.txid();
        wallet.sync_transaction(
            &funding,
            Some((Hash256::digest(&5u32.to_le_bytes()), 5, 1_000_300, 81)),
        );

        let bits = params.pos_limit_bits;
        let assembler = BlockAssembler::new(
            Arc::clone(&chain),
            Arc::clone(&mempool),
            Arc::clone(&wallet),
        );
        Self {
            params,
            chain,
            mempool,
            wallet,
            assembler,
            bits,
            funding_txid,
        }
    }

    /// The stakable funding output.
    pub fn winner(&self) -> OwnedOutput {
        self.wallet
            .spendable(1, false)
            .into_iter()
            .find(|out| out.txid == self.funding_txid)
            .expect("funding output is stakable")
    }

    /// A transaction unrelated to the wallet, spending a synthetic
    /// outpoint.
    pub fn foreign_tx(&self, seed: u8, n_time: u32) -> Transaction {
        let mut tx = Transaction::new(n_time);
        tx.vin.push(TxIn::from_outpoint(OutPoint::new(
            Hash256::digest(&[seed, 0x77]),
            0,
        )));
        tx.vout.push(TxOut::new(
            solidus_chain::COIN,
            script_for_address(&solidus_chain::Address::from_pubkey(&[seed; 32])),
        ));
        tx
    }
}
