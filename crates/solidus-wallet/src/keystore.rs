//! Key management.
//!
//! Keys are ed25519. At rest a key is either plaintext (unencrypted
//! wallet) or sealed under the passphrase-derived master key. Encrypting
//! a wallet is one-way; unlocking keeps the master key in memory until
//! the wallet relocks. A minting-only unlock exposes signing for
//! coinstakes while keeping spends refused at the wallet layer.
//!
//! The key pool holds pre-generated keys so addresses can be handed out
//! while the wallet is locked.

use crate::{WalletError, WalletResult};
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce};
use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signature, Signer, Verifier};
use parking_lot::{Mutex, RwLock};
use rand::RngCore;
use sha2::{Digest, Sha256};
use solidus_chain::Address;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// KDF iteration count for the passphrase-derived master key.
const KDF_ROUNDS: u32 = 25_000;

/// Nonce length of the sealing cipher.
const NONCE_LEN: usize = 12;

/// A usable (decrypted) wallet key.
#[derive(Clone)]
pub struct WalletKey {
    secret: [u8; 32],
    /// Public half.
    pub public: [u8; 32],
    /// Derived address.
    pub address: Address,
}

impl std::fmt::Debug for WalletKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletKey")
            .field("secret", &"<redacted>")
            .field("public", &self.public)
            .field("address", &self.address)
            .finish()
    }
}

impl WalletKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::from_secret(secret)
    }

    /// Rebuild a key from its secret bytes.
    pub fn from_secret(secret: [u8; 32]) -> Self {
        let sk = SecretKey::from_bytes(&secret).expect("32 bytes is a valid ed25519 secret");
        let pk = PublicKey::from(&sk);
        let public = pk.to_bytes();
        Self {
            secret,
            public,
            address: Address::from_pubkey(&public),
        }
    }

    /// Sign a message; returns the 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let sk = SecretKey::from_bytes(&self.secret).expect("stored secret is valid");
        let pk = PublicKey::from(&sk);
        let keypair = Keypair {
            secret: sk,
            public: pk,
        };
        keypair.sign(message).to_bytes().to_vec()
    }

    /// Secret bytes, for sealing.
    fn secret_bytes(&self) -> [u8; 32] {
        self.secret
    }
}

/// Verify a 64-byte signature against a 32-byte ed25519 public key.
pub fn verify_signature(public: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(pk) = PublicKey::from_bytes(public) else {
        return false;
    };
    let Ok(sig) = Signature::try_from(signature) else {
        return false;
    };
    pk.verify(message, &sig).is_ok()
}

/// A key at rest.
enum StoredKey {
    Plain([u8; 32]),
    /// nonce ‖ ciphertext under the master key.
    Sealed(Vec<u8>),
}

/// Derive the master key from a passphrase with an iterated hash.
fn derive_master_key(passphrase: &str, salt: &[u8; 16]) -> [u8; 32] {
    let mut state = [0u8; 32];
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(passphrase.as_bytes());
    state.copy_from_slice(&hasher.finalize());
    for _ in 1..KDF_ROUNDS {
        let mut hasher = Sha256::new();
        hasher.update(state);
        hasher.update(passphrase.as_bytes());
        state.copy_from_slice(&hasher.finalize());
    }
    state
}

/// Key store with pool and encryption state.
pub struct KeyStore {
    keys: RwLock<HashMap<Address, StoredKey>>,
    pubkeys: RwLock<HashMap<Address, [u8; 32]>>,
    pool: Mutex<VecDeque<Address>>,
    crypted: AtomicBool,
    locked: AtomicBool,
    mint_only: AtomicBool,
    /// Master key while unlocked, plus the KDF salt and a verifier hash.
    master: Mutex<Option<[u8; 32]>>,
    salt: Mutex<[u8; 16]>,
    check: Mutex<Option<[u8; 32]>>,
}

impl KeyStore {
    /// Empty, unencrypted key store.
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
            pubkeys: RwLock::new(HashMap::new()),
            pool: Mutex::new(VecDeque::new()),
            crypted: AtomicBool::new(false),
            locked: AtomicBool::new(false),
            mint_only: AtomicBool::new(false),
            master: Mutex::new(None),
            salt: Mutex::new([0u8; 16]),
            check: Mutex::new(None),
        }
    }

    /// Whether the wallet is encrypted.
    pub fn is_crypted(&self) -> bool {
        self.crypted.load(Ordering::SeqCst)
    }

    /// Whether the keys are currently unusable.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    /// Whether the current unlock is minting-only.
    pub fn is_mint_only(&self) -> bool {
        !self.is_locked() && self.mint_only.load(Ordering::SeqCst)
    }

    /// Generate a key, register it and return its address.
    pub fn generate_key(&self) -> WalletResult<Address> {
        if self.is_locked() {
            return Err(WalletError::Locked);
        }
        let key = WalletKey::generate();
        let address = key.address.clone();
        self.store_key(&key)?;
        Ok(address)
    }

    /// Register a usable key, sealing it when the wallet is encrypted.
    fn store_key(&self, key: &WalletKey) -> WalletResult<()> {
        let stored = if self.is_crypted() {
            let master = self.master.lock();
            let master = master.as_ref().ok_or(WalletError::Locked)?;
            StoredKey::Sealed(seal_secret(master, &key.public, &key.secret_bytes())?)
        } else {
            StoredKey::Plain(key.secret_bytes())
        };
        self.pubkeys
            .write()
            .insert(key.address.clone(), key.public);
        self.keys.write().insert(key.address.clone(), stored);
        Ok(())
    }

    /// Fetch a usable key. Requires the wallet to be unlocked when
    /// encrypted.
    pub fn get_key(&self, address: &Address) -> WalletResult<WalletKey> {
        let keys = self.keys.read();
        let stored = keys
            .get(address)
            .ok_or_else(|| WalletError::InvalidAddress(address.to_string()))?;
        match stored {
            StoredKey::Plain(secret) => Ok(WalletKey::from_secret(*secret)),
            StoredKey::Sealed(blob) => {
                let master = self.master.lock();
                let master = master.as_ref().ok_or(WalletError::Locked)?;
                let public = self
                    .pubkeys
                    .read()
                    .get(address)
                    .copied()
                    .ok_or_else(|| WalletError::InvalidAddress(address.to_string()))?;
                let secret = open_secret(master, &public, blob)?;
                Ok(WalletKey::from_secret(secret))
            }
        }
    }

    /// Public key for an address, available even while locked.
    pub fn get_pubkey(&self, address: &Address) -> Option<[u8; 32]> {
        self.pubkeys.read().get(address).copied()
    }

    /// Whether the store holds the key for an address.
    pub fn have_key(&self, address: &Address) -> bool {
        self.keys.read().contains_key(address)
    }

    /// All addresses with keys.
    pub fn addresses(&self) -> Vec<Address> {
        self.keys.read().keys().cloned().collect()
    }

    // --- Key pool ---

    /// Current pool size.
    pub fn pool_size(&self) -> usize {
        self.pool.lock().len()
    }

    /// Top the pool up to `target` pre-generated keys.
    pub fn top_up_pool(&self, target: usize) -> WalletResult<usize> {
        if self.is_locked() {
            return Err(WalletError::Locked);
        }
        let mut added = 0;
        loop {
            {
                let pool = self.pool.lock();
                if pool.len() >= target {
                    break;
                }
            }
            let key = WalletKey::generate();
            self.store_key(&key)?;
            self.pool.lock().push_back(key.address);
            added += 1;
        }
        if added > 0 {
            debug!(added, size = self.pool_size(), "Key pool topped up");
        }
        Ok(added)
    }

    /// Take an address from the pool.
    pub fn key_from_pool(&self) -> WalletResult<Address> {
        if let Some(address) = self.pool.lock().pop_front() {
            return Ok(address);
        }
        // Empty pool can be refilled on the fly while unlocked.
        if !self.is_locked() {
            let address = self.generate_key()?;
            return Ok(address);
        }
        Err(WalletError::KeypoolRanOut)
    }

    /// Drop every pooled key and regenerate the pool.
    pub fn reset_pool(&self, target: usize) -> WalletResult<()> {
        if self.is_locked() {
            return Err(WalletError::Locked);
        }
        self.pool.lock().clear();
        self.top_up_pool(target)?;
        Ok(())
    }

    // --- Encryption state machine ---

    /// Encrypt the wallet. One-way; fails if already encrypted.
    pub fn encrypt(&self, passphrase: &str) -> WalletResult<()> {
        if self.is_crypted() {
            return Err(WalletError::WrongEncState(
                "running with an encrypted wallet, but encryptwallet was called".into(),
            ));
        }
        if passphrase.is_empty() {
            return Err(WalletError::InvalidParameter("empty passphrase".into()));
        }

        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let master = derive_master_key(passphrase, &salt);

        {
            let mut keys = self.keys.write();
            let pubkeys = self.pubkeys.read();
            let plain: Vec<(Address, [u8; 32])> = keys
                .iter()
                .filter_map(|(address, stored)| match stored {
                    StoredKey::Plain(secret) => Some((address.clone(), *secret)),
                    StoredKey::Sealed(_) => None,
                })
                .collect();
            for (address, secret) in plain {
                let public = pubkeys.get(&address).copied().ok_or_else(|| {
                    WalletError::Database(format!("missing pubkey for {}", address))
                })?;
                let blob = seal_secret(&master, &public, &secret)?;
                keys.insert(address, StoredKey::Sealed(blob));
            }
        }

        *self.salt.lock() = salt;
        *self.check.lock() = Some(Sha256::digest(master).into());
        *self.master.lock() = None;
        self.crypted.store(true, Ordering::SeqCst);
        self.locked.store(true, Ordering::SeqCst);
        // Pooled keys predate encryption and are discarded.
        self.pool.lock().clear();
        info!("Wallet encrypted, keypool flushed");
        Ok(())
    }

    /// Unlock with the passphrase, optionally for minting only.
    pub fn unlock(&self, passphrase: &str, mint_only: bool) -> WalletResult<()> {
        if !self.is_crypted() {
            return Err(WalletError::WrongEncState(
                "running with an unencrypted wallet, but walletpassphrase was called".into(),
            ));
        }
        let salt = *self.salt.lock();
        let master = derive_master_key(passphrase, &salt);
        let expected = self.check.lock();
        let expected = expected.as_ref().ok_or_else(|| {
            WalletError::WrongEncState("encrypted wallet has no verifier".into())
        })?;
        let digest: [u8; 32] = Sha256::digest(master).into();
        if &digest != expected {
            return Err(WalletError::IncorrectPassphrase);
        }
        *self.master.lock() = Some(master);
        self.mint_only.store(mint_only, Ordering::SeqCst);
        self.locked.store(false, Ordering::SeqCst);
        info!(mint_only, "Wallet unlocked");
        Ok(())
    }

    /// Relock: wipe the in-memory master key.
    pub fn lock(&self) {
        if !self.is_crypted() {
            return;
        }
        *self.master.lock() = None;
        self.mint_only.store(false, Ordering::SeqCst);
        self.locked.store(true, Ordering::SeqCst);
        info!("Wallet locked");
    }

    /// Change the passphrase; requires the old one.
    pub fn change_passphrase(&self, old: &str, new: &str) -> WalletResult<()> {
        if !self.is_crypted() {
            return Err(WalletError::WrongEncState(
                "running with an unencrypted wallet, but walletpassphrasechange was called".into(),
            ));
        }
        let was_locked = self.is_locked();
        self.unlock(old, self.is_mint_only())?;

        let old_salt = *self.salt.lock();
        let old_master = derive_master_key(old, &old_salt);

        let mut new_salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut new_salt);
        let new_master = derive_master_key(new, &new_salt);

        {
            let mut keys = self.keys.write();
            let pubkeys = self.pubkeys.read();
            let sealed: Vec<(Address, Vec<u8>)> = keys
                .iter()
                .filter_map(|(address, stored)| match stored {
                    StoredKey::Sealed(blob) => Some((address.clone(), blob.clone())),
                    StoredKey::Plain(_) => None,
                })
                .collect();
            for (address, blob) in sealed {
                let public = pubkeys.get(&address).copied().ok_or_else(|| {
                    WalletError::Database(format!("missing pubkey for {}", address))
                })?;
                let secret = open_secret(&old_master, &public, &blob)?;
                let resealed = seal_secret(&new_master, &public, &secret)?;
                keys.insert(address, StoredKey::Sealed(resealed));
            }
        }

        *self.salt.lock() = new_salt;
        *self.check.lock() = Some(Sha256::digest(new_master).into());
        *self.master.lock() = Some(new_master);
        if was_locked {
            self.lock();
        }
        info!("Wallet passphrase changed");
        Ok(())
    }
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Seal a secret under the master key. Nonce is prepended.
fn seal_secret(master: &[u8; 32], public: &[u8; 32], secret: &[u8; 32]) -> WalletResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(master));
    let mut nonce = [0u8; NONCE_LEN];
    // The public key pins the nonce to the key being sealed.
    let digest = Sha256::digest(public);
    nonce.copy_from_slice(&digest[..NONCE_LEN]);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), secret.as_slice())
        .map_err(|_| WalletError::Database("key sealing failed".into()))?;
    let mut out = nonce.to_vec();
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Open a sealed secret.
fn open_secret(master: &[u8; 32], _public: &[u8; 32], blob: &[u8]) -> WalletResult<[u8; 32]> {
    if blob.len() < NONCE_LEN {
        return Err(WalletError::Database("sealed key too short".into()));
    }
    let cipher = ChaCha20Poly1305::new(Key::from_slice(master));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&blob[..NONCE_LEN]), &blob[NONCE_LEN..])
        .map_err(|_| WalletError::IncorrectPassphrase)?;
    if plaintext.len() != 32 {
        return Err(WalletError::Database("sealed key has wrong length".into()));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&plaintext);
    Ok(out)
}
