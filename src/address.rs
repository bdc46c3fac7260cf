// src/address.rs
//! Key-derived and contract identities.
//!
//! Mortgage payouts must resolve to a plain key identity; contract
//! identities are rejected at the authorization boundary.

use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Version byte prepended to key identities in text encoding.
const KEY_ADDRESS_VERSION: u8 = 0x00;
/// Version byte prepended to contract identities in text encoding.
const CONTRACT_ADDRESS_VERSION: u8 = 0x1c;

/// 20-byte identity hash (truncated SHA-256 of the public key or contract code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdHash(pub [u8; 20]);

impl IdHash {
    pub fn digest(data: &[u8]) -> Self {
        let full = Sha256::digest(data);
        let mut out = [0u8; 20];
        out.copy_from_slice(&full[..20]);
        IdHash(out)
    }
}

/// A destination identity on either chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Address {
    /// Standard pay-to-key identity, derived from an ed25519 public key.
    Key(IdHash),
    /// Contract identity. Never a valid mortgage payout.
    Contract(IdHash),
}

impl Address {
    /// Derive a key address from an ed25519 verifying key.
    pub fn from_pubkey(key: &VerifyingKey) -> Self {
        Address::Key(IdHash::digest(key.as_bytes()))
    }

    /// Generate a fresh key address, discarding the signing key. Wallet key
    /// management is an external concern; this is the address shape only.
    pub fn new_key() -> Self {
        let signing = SigningKey::generate(&mut rand::rngs::OsRng);
        Address::from_pubkey(&signing.verifying_key())
    }

    /// A contract identity derived from arbitrary code bytes.
    pub fn new_contract(code: &[u8]) -> Self {
        Address::Contract(IdHash::digest(code))
    }

    pub fn is_key(&self) -> bool {
        matches!(self, Address::Key(_))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (version, hash) = match self {
            Address::Key(h) => (KEY_ADDRESS_VERSION, h),
            Address::Contract(h) => (CONTRACT_ADDRESS_VERSION, h),
        };
        let mut payload = Vec::with_capacity(21);
        payload.push(version);
        payload.extend_from_slice(&hash.0);
        write!(f, "{}", bs58::encode(payload).with_check().into_string())
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let payload = bs58::decode(s)
            .with_check(None)
            .into_vec()
            .map_err(|e| format!("invalid address encoding: {}", e))?;
        if payload.len() != 21 {
            return Err(format!("invalid address length {}", payload.len()));
        }
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&payload[1..]);
        match payload[0] {
            KEY_ADDRESS_VERSION => Ok(Address::Key(IdHash(hash))),
            CONTRACT_ADDRESS_VERSION => Ok(Address::Contract(IdHash(hash))),
            v => Err(format!("unknown address version {}", v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_address_round_trips_through_text() {
        let addr = Address::new_key();
        let text = addr.to_string();
        let parsed: Address = text.parse().unwrap();
        assert_eq!(addr, parsed);
        assert!(parsed.is_key());
    }

    #[test]
    fn contract_address_is_not_a_keyid() {
        let addr = Address::new_contract(b"contract bytecode");
        assert!(!addr.is_key());
        let parsed: Address = addr.to_string().parse().unwrap();
        assert_eq!(addr, parsed);
    }

    #[test]
    fn versions_do_not_collide() {
        let key = Address::Key(IdHash::digest(b"same"));
        let contract = Address::Contract(IdHash::digest(b"same"));
        assert_ne!(key.to_string(), contract.to_string());
    }
}
