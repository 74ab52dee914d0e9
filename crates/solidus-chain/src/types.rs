//! Primitive value types: hashes, addresses and amount formatting.

use crate::{ChainError, ChainResult, COIN};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Version byte prefixed to key digests when forming an address.
const ADDRESS_VERSION: u8 = 0x2a;

/// Double-SHA256 over a byte slice.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

/// A 256-bit hash.
///
/// Displayed in the reversed-hex convention used by block explorers, so
/// leading zeros of small targets appear on the left.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The all-zero hash.
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    /// Hash arbitrary bytes with double-SHA256.
    pub fn digest(data: &[u8]) -> Self {
        Hash256(sha256d(data))
    }

    /// Whether this is the all-zero hash.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse from reversed-hex notation.
    pub fn from_hex(s: &str) -> ChainResult<Self> {
        let bytes = hex::decode(s).map_err(|_| ChainError::InvalidHash(s.to_string()))?;
        if bytes.len() != 32 {
            return Err(ChainError::InvalidHash(s.to_string()));
        }
        let mut out = [0u8; 32];
        for (i, b) in bytes.iter().rev().enumerate() {
            out[i] = *b;
        }
        Ok(Hash256(out))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0.iter().rev() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self)
    }
}

/// A wallet address: version byte plus a 20-byte digest of the public key,
/// rendered as hex.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 21]);

impl Address {
    /// Derive the address of an ed25519 public key.
    pub fn from_pubkey(pubkey: &[u8]) -> Self {
        let digest = Sha256::digest(pubkey);
        let mut out = [0u8; 21];
        out[0] = ADDRESS_VERSION;
        out[1..].copy_from_slice(&digest[..20]);
        Address(out)
    }

    /// Parse and validate an address string.
    pub fn parse(s: &str) -> ChainResult<Self> {
        let bytes = hex::decode(s).map_err(|_| ChainError::InvalidAddress(s.to_string()))?;
        if bytes.len() != 21 || bytes[0] != ADDRESS_VERSION {
            return Err(ChainError::InvalidAddress(s.to_string()));
        }
        let mut out = [0u8; 21];
        out.copy_from_slice(&bytes);
        Ok(Address(out))
    }

    /// The 20-byte key digest without the version prefix.
    pub fn key_digest(&self) -> &[u8] {
        &self.0[1..]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

/// Build the output script paying to an address.
///
/// Script evaluation is outside this crate; the payment script is the
/// address bytes themselves.
pub fn script_for_address(address: &Address) -> Vec<u8> {
    address.0.to_vec()
}

/// Recover the destination address from an output script, if it has one.
pub fn extract_destination(script: &[u8]) -> Option<Address> {
    if script.len() != 21 || script[0] != ADDRESS_VERSION {
        return None;
    }
    let mut out = [0u8; 21];
    out.copy_from_slice(script);
    Some(Address(out))
}

/// Format an amount of sub-units as a decimal coin string with eight
/// fractional digits, e.g. `12.50000000`.
pub fn format_coin(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{}{}.{:08}", sign, abs / COIN as u64, abs % COIN as u64)
}

/// Parse a decimal coin string into sub-units, rejecting more than eight
/// fractional digits.
pub fn parse_coin(s: &str) -> ChainResult<i64> {
    let err = || ChainError::InvalidAmount(s.to_string());
    let (sign, body) = match s.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, s),
    };
    let (whole, frac) = match body.split_once('.') {
        Some((w, f)) => (w, f),
        None => (body, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(err());
    }
    if frac.len() > 8 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(err());
    }
    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| err())?
    };
    let mut frac_units: i64 = if frac.is_empty() {
        0
    } else {
        frac.parse().map_err(|_| err())?
    };
    for _ in frac.len()..8 {
        frac_units *= 10;
    }
    whole
        .checked_mul(COIN)
        .and_then(|w| w.checked_add(frac_units))
        .and_then(|v| v.checked_mul(sign))
        .ok_or_else(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CENT;

    #[test]
    fn test_hash_hex_round_trip() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xab;
        bytes[31] = 0x01;
        let hash = Hash256(bytes);
        let hex = hash.to_string();
        assert!(hex.starts_with("01"));
        assert!(hex.ends_with("ab"));
        assert_eq!(Hash256::from_hex(&hex).unwrap(), hash);
    }

    #[test]
    fn test_hash_from_hex_rejects_garbage() {
        assert!(Hash256::from_hex("zz").is_err());
        assert!(Hash256::from_hex("00ff").is_err());
    }

    #[test]
    fn test_address_round_trip() {
        let address = Address::from_pubkey(&[7u8; 32]);
        let parsed = Address::parse(&address.to_string()).unwrap();
        assert_eq!(parsed, address);
    }

    #[test]
    fn test_address_rejects_wrong_version() {
        let mut bytes = [0u8; 21];
        bytes[0] = 0x00;
        assert!(Address::parse(&hex::encode(bytes)).is_err());
    }

    #[test]
    fn test_script_destination_round_trip() {
        let address = Address::from_pubkey(&[9u8; 32]);
        let script = script_for_address(&address);
        assert_eq!(extract_destination(&script), Some(address));
        assert_eq!(extract_destination(&[1, 2, 3]), None);
    }

    #[test]
    fn test_format_coin() {
        assert_eq!(format_coin(0), "0.00000000");
        assert_eq!(format_coin(COIN), "1.00000000");
        assert_eq!(format_coin(COIN + COIN / 2), "1.50000000");
        assert_eq!(format_coin(-25_000_000), "-0.25000000");
    }

    #[test]
    fn test_parse_coin() {
        assert_eq!(parse_coin("1").unwrap(), COIN);
        assert_eq!(parse_coin("1.5").unwrap(), COIN + COIN / 2);
        assert_eq!(parse_coin("0.00000001").unwrap(), 1);
        assert_eq!(parse_coin("-2.25").unwrap(), -2 * COIN - COIN / 4);
        assert!(parse_coin("1.000000001").is_err());
        assert!(parse_coin("abc").is_err());
        assert!(parse_coin("").is_err());
    }

    #[test]
    fn test_parse_format_round_trip() {
        for amount in [0, 1, CENT, COIN, 42 * COIN + 123] {
            assert_eq!(parse_coin(&format_coin(amount)).unwrap(), amount);
        }
    }
}
