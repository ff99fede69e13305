#![forbid(unsafe_code)]

//! Transaction types signed by the wallet manager

use crate::core::{sha256_parts, shake256_bytes, ChainId, Hash32};
use crate::error::Result;
use crate::wallet::{PublicKey, Signature};
use serde::{Deserialize, Serialize};

/// Single contract action
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Action {
    pub name: String,
    pub data: Vec<u8>,
}

/// Unsigned transaction body
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct Transaction {
    /// Unix seconds after which the transaction is void
    pub expiration: u64,
    pub ref_block_num: u32,
    pub actions: Vec<Action>,
    /// Transaction fee (in smallest unit)
    pub fee: u64,
    /// Sender's nonce (for replay protection)
    pub nonce: u64,
}

impl Transaction {
    /// Serialize transaction to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Transaction id (SHAKE256 of the encoding)
    pub fn id(&self) -> Result<Hash32> {
        Ok(shake256_bytes(&self.to_bytes()?))
    }
}

/// Transaction plus collected signatures
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct SignedTransaction {
    pub trx: Transaction,
    pub signatures: Vec<Signature>,
}

impl SignedTransaction {
    pub fn new(trx: Transaction) -> Self {
        Self {
            trx,
            signatures: Vec::new(),
        }
    }

    /// Digest every key signs: SHA-256(chain_id || encoding)
    pub fn sig_digest(&self, chain_id: &ChainId) -> Result<Hash32> {
        let body = self.trx.to_bytes()?;
        Ok(sha256_parts(&[&chain_id.as_bytes()[..], &body[..]]))
    }

    /// True if some attached signature verifies under `key`
    pub fn signed_by(&self, chain_id: &ChainId, key: &PublicKey) -> Result<bool> {
        let digest = self.sig_digest(chain_id)?;
        Ok(self.signatures.iter().any(|s| key.verify(&digest, s)))
    }
}
