//! Transactions, headers and blocks.
//!
//! Every hashed layout is a fixed little-endian serialization; the encoder
//! lives next to the type it covers so the byte order is auditable in one
//! place.

use crate::types::{sha256d, Hash256};
use serde::{Deserialize, Serialize};

/// Reference to a previous transaction output.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct OutPoint {
    /// Transaction being spent.
    pub txid: Hash256,
    /// Output index within that transaction.
    pub vout: u32,
}

impl OutPoint {
    /// Create a new outpoint.
    pub fn new(txid: Hash256, vout: u32) -> Self {
        Self { txid, vout }
    }

    /// The null outpoint marking a coinbase input.
    pub fn null() -> Self {
        Self {
            txid: Hash256::ZERO,
            vout: u32::MAX,
        }
    }

    /// Whether this is the null (coinbase) outpoint.
    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.vout == u32::MAX
    }
}

/// Transaction input.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TxIn {
    /// Output being spent.
    pub prevout: OutPoint,
    /// Unlocking data (signature over the spending transaction).
    pub script_sig: Vec<u8>,
    /// Sequence number.
    pub sequence: u32,
}

impl TxIn {
    /// Input spending the given outpoint with an empty signature.
    pub fn from_outpoint(prevout: OutPoint) -> Self {
        Self {
            prevout,
            script_sig: Vec::new(),
            sequence: u32::MAX,
        }
    }
}

/// Transaction output.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TxOut {
    /// Value in sub-units.
    pub value: i64,
    /// Locking script.
    pub script_pub_key: Vec<u8>,
}

impl TxOut {
    /// A spendable output.
    pub fn new(value: i64, script_pub_key: Vec<u8>) -> Self {
        Self {
            value,
            script_pub_key,
        }
    }

    /// The empty marker output heading a coinstake transaction.
    pub fn empty() -> Self {
        Self {
            value: 0,
            script_pub_key: Vec::new(),
        }
    }

    /// Whether this is the empty marker output.
    pub fn is_empty(&self) -> bool {
        self.value == 0 && self.script_pub_key.is_empty()
    }
}

/// A transaction with a creation timestamp, as proof-of-stake chains
/// carry on every transaction.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Transaction {
    /// Format version.
    pub version: u32,
    /// Transaction timestamp (seconds).
    pub n_time: u32,
    /// Inputs.
    pub vin: Vec<TxIn>,
    /// Outputs.
    pub vout: Vec<TxOut>,
    /// Earliest block height or time this transaction is final at.
    pub lock_time: u32,
}

impl Transaction {
    /// An empty transaction at the given timestamp.
    pub fn new(n_time: u32) -> Self {
        Self {
            version: 1,
            n_time,
            vin: Vec::new(),
            vout: Vec::new(),
            lock_time: 0,
        }
    }

    /// Whether this is a coinbase: exactly one input, the null outpoint.
    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].prevout.is_null()
    }

    /// Whether this is a coinstake: a real first input and an empty
    /// marker as the first output.
    pub fn is_coinstake(&self) -> bool {
        !self.vin.is_empty()
            && !self.vin[0].prevout.is_null()
            && self.vout.len() >= 2
            && self.vout[0].is_empty()
    }

    /// Whether the transaction is final at the given height and time.
    pub fn is_final(&self, height: u32, block_time: i64) -> bool {
        if self.lock_time == 0 {
            return true;
        }
        let threshold = if self.lock_time < 500_000_000 {
            height as i64
        } else {
            block_time
        };
        if (self.lock_time as i64) < threshold {
            return true;
        }
        self.vin.iter().all(|txin| txin.sequence == u32::MAX)
    }

    /// Sum of output values.
    pub fn value_out(&self) -> i64 {
        self.vout.iter().map(|o| o.value).sum()
    }

    /// Fixed little-endian serialization used for the txid.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.n_time.to_le_bytes());
        out.extend_from_slice(&(self.vin.len() as u32).to_le_bytes());
        for txin in &self.vin {
            out.extend_from_slice(txin.prevout.txid.as_bytes());
            out.extend_from_slice(&txin.prevout.vout.to_le_bytes());
            out.extend_from_slice(&(txin.script_sig.len() as u32).to_le_bytes());
            out.extend_from_slice(&txin.script_sig);
            out.extend_from_slice(&txin.sequence.to_le_bytes());
        }
        out.extend_from_slice(&(self.vout.len() as u32).to_le_bytes());
        for txout in &self.vout {
            out.extend_from_slice(&txout.value.to_le_bytes());
            out.extend_from_slice(&(txout.script_pub_key.len() as u32).to_le_bytes());
            out.extend_from_slice(&txout.script_pub_key);
        }
        out.extend_from_slice(&self.lock_time.to_le_bytes());
        out
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        self.serialize().len()
    }

    /// Transaction id.
    pub fn txid(&self) -> Hash256 {
        Hash256(sha256d(&self.serialize()))
    }

    /// Legacy signature-operation count: one per input signature plus one
    /// per output script.
    pub fn sig_op_count(&self) -> usize {
        self.vin.len() + self.vout.iter().filter(|o| !o.is_empty()).count()
    }
}

/// Block header.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Format version.
    pub version: u32,
    /// Hash of the predecessor block.
    pub prev_hash: Hash256,
    /// Merkle root over the block's transactions.
    pub merkle_root: Hash256,
    /// Block timestamp (seconds).
    pub n_time: u32,
    /// Compact difficulty target.
    pub bits: u32,
    /// Nonce; always zero for proof-of-stake blocks.
    pub nonce: u32,
}

impl BlockHeader {
    /// Fixed 80-byte little-endian layout.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(80);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(self.prev_hash.as_bytes());
        out.extend_from_slice(self.merkle_root.as_bytes());
        out.extend_from_slice(&self.n_time.to_le_bytes());
        out.extend_from_slice(&self.bits.to_le_bytes());
        out.extend_from_slice(&self.nonce.to_le_bytes());
        out
    }

    /// Block hash.
    pub fn hash(&self) -> Hash256 {
        Hash256(sha256d(&self.serialize()))
    }
}

/// A block: header, transactions, and the staker's signature for
/// proof-of-stake blocks.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Block {
    /// Header.
    pub header: BlockHeader,
    /// Transactions; `vtx[0]` is the coinbase, `vtx[1]` the coinstake in
    /// a proof-of-stake block.
    pub vtx: Vec<Transaction>,
    /// Signature by the coinstake key over the block hash.
    pub signature: Vec<u8>,
}

impl Block {
    /// Whether this block carries a coinstake.
    pub fn is_proof_of_stake(&self) -> bool {
        self.vtx.len() > 1 && self.vtx[1].is_coinstake()
    }

    /// Block hash (the header hash).
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    /// Merkle root over the current transaction list.
    pub fn merkle_root(&self) -> Hash256 {
        let mut layer: Vec<Hash256> = self.vtx.iter().map(|tx| tx.txid()).collect();
        if layer.is_empty() {
            return Hash256::ZERO;
        }
        while layer.len() > 1 {
            let mut next = Vec::with_capacity(layer.len().div_ceil(2));
            for pair in layer.chunks(2) {
                let left = pair[0];
                let right = *pair.last().unwrap();
                let mut data = Vec::with_capacity(64);
                data.extend_from_slice(left.as_bytes());
                data.extend_from_slice(right.as_bytes());
                next.push(Hash256(sha256d(&data)));
            }
            layer = next;
        }
        layer[0]
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        80 + self.signature.len() + self.vtx.iter().map(|tx| tx.size()).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_tx(n_time: u32, value: i64) -> Transaction {
        let mut tx = Transaction::new(n_time);
        tx.vin.push(TxIn::from_outpoint(OutPoint::new(
            Hash256::digest(&value.to_le_bytes()),
            0,
        )));
        tx.vout.push(TxOut::new(value, vec![0x2a; 21]));
        tx
    }

    #[test]
    fn test_coinbase_detection() {
        let mut tx = Transaction::new(100);
        tx.vin.push(TxIn::from_outpoint(OutPoint::null()));
        tx.vout.push(TxOut::new(0, vec![1]));
        assert!(tx.is_coinbase());
        assert!(!tx.is_coinstake());
    }

    #[test]
    fn test_coinstake_detection() {
        let mut tx = Transaction::new(100);
        tx.vin
            .push(TxIn::from_outpoint(OutPoint::new(Hash256([1u8; 32]), 0)));
        tx.vout.push(TxOut::empty());
        tx.vout.push(TxOut::new(50, vec![2]));
        assert!(tx.is_coinstake());
        assert!(!tx.is_coinbase());
    }

    #[test]
    fn test_txid_changes_with_content() {
        let a = dummy_tx(100, 1);
        let b = dummy_tx(100, 2);
        let c = dummy_tx(101, 1);
        assert_ne!(a.txid(), b.txid());
        assert_ne!(a.txid(), c.txid());
        assert_eq!(a.txid(), dummy_tx(100, 1).txid());
    }

    #[test]
    fn test_is_final() {
        let mut tx = dummy_tx(100, 1);
        assert!(tx.is_final(0, 0));

        tx.lock_time = 500;
        tx.vin[0].sequence = 0;
        assert!(!tx.is_final(400, 0));
        assert!(tx.is_final(501, 0));
    }

    #[test]
    fn test_header_hash_stable() {
        let header = BlockHeader {
            version: 1,
            prev_hash: Hash256([3u8; 32]),
            merkle_root: Hash256([4u8; 32]),
            n_time: 1_700_000_000,
            bits: 0x1d00ffff,
            nonce: 0,
        };
        assert_eq!(header.serialize().len(), 80);
        assert_eq!(header.hash(), header.clone().hash());
    }

    #[test]
    fn test_merkle_root_single_and_pair() {
        let tx1 = dummy_tx(100, 1);
        let tx2 = dummy_tx(100, 2);

        let single = Block {
            header: BlockHeader {
                version: 1,
                prev_hash: Hash256::ZERO,
                merkle_root: Hash256::ZERO,
                n_time: 0,
                bits: 0,
                nonce: 0,
            },
            vtx: vec![tx1.clone()],
            signature: Vec::new(),
        };
        assert_ne!(single.merkle_root(), Hash256::ZERO);

        let mut pair = single.clone();
        pair.vtx.push(tx2);
        assert_ne!(pair.merkle_root(), single.merkle_root());
    }
}
