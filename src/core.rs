#![forbid(unsafe_code)]

//! Core primitives (Hash32, digests, chain id)

use crate::error::{Result, WalletError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type Hash32 = [u8; 32];

/// Fast SHAKE256 hash
pub fn shake256_bytes(data: &[u8]) -> Hash32 {
    use tiny_keccak::{Shake, Hasher};
    let mut sh = Shake::v256();
    sh.update(data);
    let mut out = [0u8; 32];
    sh.finalize(&mut out);
    out
}

/// SHA-256 over a sequence of parts (no separators)
pub fn sha256_parts(parts: &[&[u8]]) -> Hash32 {
    use sha2::{Digest, Sha256};
    let mut h = Sha256::new();
    for part in parts {
        h.update(part);
    }
    h.finalize().into()
}

/// Chain identifier; mixed into every transaction signing digest
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainId(pub Hash32);

impl ChainId {
    /// Derive a chain id from a human-readable network name
    pub fn from_network(name: &str) -> Self {
        Self(sha256_parts(&[&b"TT_CHAIN_ID.v1"[..], name.as_bytes()]))
    }

    pub fn as_bytes(&self) -> &Hash32 {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainId({})", self)
    }
}

impl FromStr for ChainId {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| WalletError::InvalidKey(format!("chain id: {}", e)))?;
        let id: Hash32 = bytes
            .try_into()
            .map_err(|_| WalletError::InvalidKey("chain id must be 32 bytes".into()))?;
        Ok(Self(id))
    }
}
