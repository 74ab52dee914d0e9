//! Node wiring.
//!
//! The [`Node`] is the owning context: it constructs every subsystem,
//! hands out shared references, and tears the workers down on shutdown.
//! Nothing here is a global; the former process-wide singletons are
//! fields of this struct.

use crate::config::NodeConfig;
use anyhow::Result;
use parking_lot::RwLock;
use solidus_chain::{
    Block, BlockAccept, BlockIndex, BlockSink, ChainParams, ChainView, Hash256, TimeData, COIN,
};
use solidus_mempool::Mempool;
use solidus_rpc::AppState;
use solidus_staking::StakeMinter;
use solidus_wallet::{verify_signature, Wallet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Chain ingress: connects blocks the way a peer-received block would
/// be, updating the index, the mempool and the wallet.
pub struct ChainIngress {
    chain: Arc<ChainView>,
    mempool: Arc<Mempool>,
    wallet: RwLock<Option<Arc<Wallet>>>,
}

impl ChainIngress {
    fn new(chain: Arc<ChainView>, mempool: Arc<Mempool>) -> Self {
        Self {
            chain,
            mempool,
            wallet: RwLock::new(None),
        }
    }

    fn set_wallet(&self, wallet: Arc<Wallet>) {
        *self.wallet.write() = Some(wallet);
    }

    /// Next stake modifier, chained from the previous one and the new
    /// block's hash.
    fn next_stake_modifier(prev_modifier: u64, hash: &Hash256) -> u64 {
        let mut data = Vec::with_capacity(40);
        data.extend_from_slice(&prev_modifier.to_le_bytes());
        data.extend_from_slice(hash.as_bytes());
        let digest = solidus_chain::sha256d(&data);
        u64::from_le_bytes(digest[..8].try_into().expect("8 bytes"))
    }

    fn connect(&self, block: &Block) -> Result<(), String> {
        let hash = block.hash();
        let prev = self
            .chain
            .get(&block.header.prev_hash)
            .ok_or_else(|| format!("unknown predecessor {}", block.header.prev_hash))?;
        let best = self.chain.best_index().ok_or("empty chain")?;
        if prev.hash != best.hash {
            return Err("does not extend the best chain".to_string());
        }
        if block.header.merkle_root != block.merkle_root() {
            return Err("merkle root mismatch".to_string());
        }

        let proof_of_stake = block.is_proof_of_stake();
        if proof_of_stake {
            // The coinstake's unlocking data leads with the staking
            // key; the block signature must verify against it.
            let script_sig = &block.vtx[1].vin[0].script_sig;
            if script_sig.len() < 32 {
                return Err("coinstake carries no staking key".to_string());
            }
            if !verify_signature(&script_sig[..32], hash.as_bytes(), &block.signature) {
                return Err("bad block signature".to_string());
            }
        }

        // Generated value grows the money supply.
        let minted: i64 = if proof_of_stake {
            let coinstake = &block.vtx[1];
            let staked: i64 = coinstake.vout.iter().map(|o| o.value).sum();
            let wallet = self.wallet.read();
            let principal = wallet
                .as_ref()
                .and_then(|w| w.get_tx(&coinstake.vin[0].prevout.txid))
                .and_then(|prev| {
                    prev.tx
                        .vout
                        .get(coinstake.vin[0].prevout.vout as usize)
                        .map(|o| o.value)
                })
                .unwrap_or(staked);
            staked - principal
        } else {
            block
                .vtx
                .first()
                .filter(|tx| tx.is_coinbase())
                .map(|tx| tx.value_out())
                .unwrap_or(0)
        };

        let entry = BlockIndex {
            hash,
            prev_hash: prev.hash,
            height: prev.height + 1,
            n_time: block.header.n_time,
            bits: block.header.bits,
            proof_of_stake,
            money_supply: prev.money_supply + minted.max(0),
            stake_modifier: Self::next_stake_modifier(prev.stake_modifier, &hash),
            stake_modifier_checksum: 0,
        };
        let entry = self.chain.attach(entry);

        // Connected transactions leave the pool and reach the wallet
        // with their in-block offsets.
        self.mempool.remove_confirmed(&block.vtx);
        if let Some(wallet) = self.wallet.read().as_ref() {
            let mut offset = 80u32;
            for tx in &block.vtx {
                wallet.sync_transaction(
                    tx,
                    Some((hash, entry.height, block.header.n_time as i64, offset)),
                );
                offset += tx.size() as u32;
            }
        }

        info!(height = entry.height, hash = %hash, pos = proof_of_stake, "Block connected");
        Ok(())
    }
}

impl BlockSink for ChainIngress {
    fn submit(&self, block: Block) -> BlockAccept {
        match self.connect(&block) {
            Ok(()) => BlockAccept::Accepted,
            Err(reason) => {
                warn!(hash = %block.hash(), reason, "Block rejected");
                BlockAccept::Rejected
            }
        }
    }
}

/// The owning context for one node process.
pub struct Node {
    config: NodeConfig,
    params: ChainParams,
    chain: Arc<ChainView>,
    mempool: Arc<Mempool>,
    wallet: Arc<Wallet>,
    ingress: Arc<ChainIngress>,
    minter: Arc<StakeMinter>,
    shutdown: Arc<AtomicBool>,
}

impl Node {
    /// Construct every subsystem.
    pub fn new(config: NodeConfig) -> Result<Arc<Self>> {
        std::fs::create_dir_all(&config.data_dir)?;

        let params = match config.network.as_str() {
            "regtest" => ChainParams::regtest(),
            _ => ChainParams::mainnet(),
        };
        let time = Arc::new(TimeData::new());
        let chain = Arc::new(ChainView::new(params.clone(), Arc::clone(&time)));

        // Genesis entry; header download for the rest is the sync
        // layer's business.
        chain.attach(genesis_index(&params));

        let mempool = Arc::new(Mempool::with_defaults());
        let ingress = Arc::new(ChainIngress::new(Arc::clone(&chain), Arc::clone(&mempool)));
        let wallet = Arc::new(Wallet::new(
            params.clone(),
            Arc::clone(&chain),
            Arc::clone(&mempool),
        ));
        ingress.set_wallet(Arc::clone(&wallet));

        let reserve = (config.staking.reserve_balance * COIN as f64) as i64;
        if reserve > 0 {
            wallet
                .set_reserve_balance(reserve)
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        }

        let minter = Arc::new(StakeMinter::new(
            Arc::clone(&chain),
            Arc::clone(&mempool),
            Arc::clone(&wallet),
            Arc::clone(&ingress) as Arc<dyn BlockSink>,
        ));

        Ok(Arc::new(Self {
            config,
            params,
            chain,
            mempool,
            wallet,
            ingress,
            minter,
            shutdown: Arc::new(AtomicBool::new(false)),
        }))
    }

    /// Chain view.
    pub fn chain(&self) -> &Arc<ChainView> {
        &self.chain
    }

    /// Wallet.
    pub fn wallet(&self) -> &Arc<Wallet> {
        &self.wallet
    }

    /// Chain ingress.
    pub fn ingress(&self) -> &Arc<ChainIngress> {
        &self.ingress
    }

    /// Staking worker.
    pub fn minter(&self) -> &Arc<StakeMinter> {
        &self.minter
    }

    /// Shutdown flag shared with the RPC layer.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Services record for the RPC server.
    pub fn rpc_state(&self) -> AppState {
        AppState {
            chain: Arc::clone(&self.chain),
            wallet: Arc::clone(&self.wallet),
            mempool: Arc::clone(&self.mempool),
            minter: Arc::clone(&self.minter),
            shutdown: Arc::clone(&self.shutdown),
        }
    }

    /// Ask every worker to stop.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.minter.request_shutdown();
    }

    /// Run the node until shutdown.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        info!(
            network = %self.config.network,
            data_dir = ?self.config.data_dir,
            "Node starting"
        );

        // External-IP probe, fire and forget.
        if self.config.discover_external_ip {
            tokio::task::spawn_blocking(|| {
                let entropy = rand::random::<u64>();
                let _ = crate::stun::external_ip(entropy);
            });
        }

        // RPC server.
        let rpc_addr: std::net::SocketAddr = self.config.rpc.bind_address.parse()?;
        let rpc_state = self.rpc_state();
        let rpc_handle = tokio::spawn(async move {
            if let Err(e) = solidus_rpc::serve(rpc_state, rpc_addr).await {
                warn!(error = %e, "RPC server stopped");
            }
        });

        // Staking loop.
        let minter_handle = if self.config.staking.enabled {
            Some(tokio::spawn(Arc::clone(&self.minter).run()))
        } else {
            None
        };

        // Wait for the shutdown flag (ctrl-c handling lives in main).
        while !self.shutdown.load(Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_millis(250)).await;
        }

        info!("Shutting down");
        self.minter.request_shutdown();
        if let Some(handle) = minter_handle {
            let _ = handle.await;
        }
        rpc_handle.abort();
        Ok(())
    }

    /// Network parameters in use.
    pub fn params(&self) -> &ChainParams {
        &self.params
    }
}

/// The genesis index entry.
fn genesis_index(params: &ChainParams) -> BlockIndex {
    BlockIndex {
        hash: Hash256::digest(b"solidus genesis"),
        prev_hash: Hash256::ZERO,
        height: 0,
        n_time: 1_690_000_000,
        bits: params.pos_limit_bits,
        proof_of_stake: false,
        money_supply: 0,
        stake_modifier: 0x0f0f_0f0f_0f0f_0f0f,
        stake_modifier_checksum: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solidus_chain::{script_for_address, OutPoint, Transaction, TxIn, TxOut};
    use tempfile::TempDir;

    fn test_node() -> (Arc<Node>, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = NodeConfig::default_for_network("regtest");
        config.data_dir = tmp.path().to_path_buf();
        config.discover_external_ip = false;
        let node = Node::new(config).unwrap();
        (node, tmp)
    }

    /// Credit the wallet with an old, stakable output by connecting a
    /// synthetic funding block.
    fn fund_wallet(node: &Node, value: i64) -> Hash256 {
        let address = node.wallet().new_address("").unwrap();
        let mut tx = Transaction::new(1_690_000_100);
        tx.vin.push(TxIn::from_outpoint(OutPoint::new(
            Hash256::digest(b"node funding"),
            0,
        )));
        tx.vout.push(TxOut::new(value, script_for_address(&address)));
        let txid = tx.txid();

        let genesis = node.chain().best_index().unwrap();
        let mut block = Block {
            header: solidus_chain::BlockHeader {
                version: 1,
                prev_hash: genesis.hash,
                merkle_root: Hash256::ZERO,
                n_time: 1_690_000_100,
                bits: node.params().pos_limit_bits,
                nonce: 0,
            },
            vtx: vec![tx],
            signature: Vec::new(),
        };
        block.header.merkle_root = block.merkle_root();
        assert_eq!(node.ingress().submit(block), BlockAccept::Accepted);
        txid
    }

    #[test]
    fn test_node_construction() {
        let (node, _tmp) = test_node();
        assert_eq!(node.chain().height(), 0);
        assert!(node.chain().best().is_some());
        assert_eq!(node.wallet().balance(), 0);
    }

    #[test]
    fn test_ingress_rejects_disconnected_block() {
        let (node, _tmp) = test_node();
        let block = Block {
            header: solidus_chain::BlockHeader {
                version: 1,
                prev_hash: Hash256::digest(b"nowhere"),
                merkle_root: Hash256::ZERO,
                n_time: 1_690_000_100,
                bits: node.params().pos_limit_bits,
                nonce: 0,
            },
            vtx: Vec::new(),
            signature: Vec::new(),
        };
        assert_eq!(node.ingress().submit(block), BlockAccept::Rejected);
    }

    #[test]
    fn test_funding_block_credits_wallet() {
        let (node, _tmp) = test_node();
        fund_wallet(&node, 1_000 * COIN);
        assert_eq!(node.chain().height(), 1);
        assert_eq!(node.wallet().balance(), 1_000 * COIN);
    }

    #[test]
    fn test_end_to_end_minting() {
        // Fund the wallet deep enough to mature, then let the minter
        // drive the full pipeline: kernel scan, assembly, signing,
        // ingress, wallet update.
        let (node, _tmp) = test_node();
        fund_wallet(&node, 1_000 * COIN);

        // Bury the funding block under empty blocks until mature.
        for i in 0..node.params().coinbase_maturity as u32 {
            let best = node.chain().best_index().unwrap();
            let mut block = Block {
                header: solidus_chain::BlockHeader {
                    version: 1,
                    prev_hash: best.hash,
                    merkle_root: Hash256::ZERO,
                    n_time: best.n_time + 16 + i,
                    bits: node.params().pos_limit_bits,
                    nonce: 0,
                },
                vtx: Vec::new(),
                signature: Vec::new(),
            };
            block.header.merkle_root = block.merkle_root();
            assert_eq!(node.ingress().submit(block), BlockAccept::Accepted);
        }

        let height_before = node.chain().height();
        let minted = node.minter().try_mint_once().unwrap();
        let hash = minted.expect("an old heavy output against the regtest target mints");

        // The block connected and became the new tip.
        assert_eq!(node.chain().height(), height_before + 1);
        assert_eq!(node.chain().best_index().unwrap().hash, hash);
        assert!(node.chain().best_index().unwrap().proof_of_stake);

        // The wallet observed its own coinstake: principal moved from
        // balance into immature stake.
        let balances = node.wallet().balances();
        assert_eq!(balances.balance, 0);
        assert!(balances.stake >= 1_000 * COIN);

        // Money supply grew by the reward.
        let supply = node.chain().best_index().unwrap().money_supply;
        assert_eq!(supply, balances.stake - 1_000 * COIN);
    }

    #[test]
    fn test_minted_block_spends_tracked_output() {
        let (node, _tmp) = test_node();
        let funding_txid = fund_wallet(&node, 1_000 * COIN);

        for i in 0..node.params().coinbase_maturity as u32 {
            let best = node.chain().best_index().unwrap();
            let mut block = Block {
                header: solidus_chain::BlockHeader {
                    version: 1,
                    prev_hash: best.hash,
                    merkle_root: Hash256::ZERO,
                    n_time: best.n_time + 16 + i,
                    bits: node.params().pos_limit_bits,
                    nonce: 0,
                },
                vtx: Vec::new(),
                signature: Vec::new(),
            };
            block.header.merkle_root = block.merkle_root();
            node.ingress().submit(block);
        }

        node.minter().try_mint_once().unwrap().unwrap();
        let funding = node.wallet().get_tx(&funding_txid).unwrap();
        assert!(funding.is_spent(0));
    }
}
