//! Falcon-512 Post-Quantum Signatures for wallet keys
//!
//! # Security Model
//! - **Detached signatures**: the wallet signs 32-byte digests only
//! - **Key export**: secret bytes are always returned in `Zeroizing` buffers
//!
//! # Example
//! ```no_run
//! use tt_wallet_manager::falcon_sigs::*;
//!
//! let (pk, sk) = falcon_keypair();
//! let digest = [0x42u8; 32];
//! let sig = falcon_sign_digest(&digest, &sk);
//! assert!(falcon_verify_digest(&digest, &sig, &pk));
//! ```

#![forbid(unsafe_code)]

use crate::core::Hash32;
use anyhow::{anyhow, Result};
use pqcrypto_falcon::falcon512;
use pqcrypto_traits::sign::{
    DetachedSignature as PQDetachedSignature, PublicKey as PQPublicKey,
    SecretKey as PQSecretKey,
};
use zeroize::Zeroizing;

/* ============================================================================
 * Core Types
 * ========================================================================== */

/// Falcon-512 public key (897 bytes)
pub type FalconPublicKey = falcon512::PublicKey;

/// Falcon-512 secret key (1281 bytes)
pub type FalconSecretKey = falcon512::SecretKey;

/* ============================================================================
 * Key Generation / Import / Export
 * ========================================================================== */

/// Generate new Falcon-512 keypair (random)
#[inline]
pub fn falcon_keypair() -> (FalconPublicKey, FalconSecretKey) {
    falcon512::keypair()
}

/// Import public key from bytes
pub fn falcon_pk_from_bytes(bytes: &[u8]) -> Result<FalconPublicKey> {
    FalconPublicKey::from_bytes(bytes)
        .map_err(|_| anyhow!("Invalid Falcon public key bytes"))
}

/// Import secret key from bytes
pub fn falcon_sk_from_bytes(bytes: &[u8]) -> Result<FalconSecretKey> {
    FalconSecretKey::from_bytes(bytes)
        .map_err(|_| anyhow!("Invalid Falcon secret key bytes"))
}

/// Export public key to bytes (897 bytes)
#[inline]
pub fn falcon_pk_to_bytes(pk: &FalconPublicKey) -> &[u8] {
    pk.as_bytes()
}

/// Export secret key to bytes (1281 bytes) - SENSITIVE!
#[inline]
pub fn falcon_sk_to_bytes(sk: &FalconSecretKey) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(sk.as_bytes().to_vec())
}

/* ============================================================================
 * Digest Signing
 * ========================================================================== */

/// Sign a 32-byte digest, returning the detached signature bytes
pub fn falcon_sign_digest(digest: &Hash32, secret_key: &FalconSecretKey) -> Vec<u8> {
    falcon512::detached_sign(digest, secret_key).as_bytes().to_vec()
}

/// Verify a detached signature over a 32-byte digest
pub fn falcon_verify_digest(
    digest: &Hash32,
    sig_bytes: &[u8],
    public_key: &FalconPublicKey,
) -> bool {
    let Ok(sig) = falcon512::DetachedSignature::from_bytes(sig_bytes) else {
        return false;
    };
    falcon512::verify_detached_signature(&sig, digest, public_key).is_ok()
}

/* ============================================================================
 * Utilities
 * ========================================================================== */

/// Get public key size
#[inline]
pub const fn falcon_pk_size() -> usize {
    897
}

/// Get secret key size
#[inline]
pub const fn falcon_sk_size() -> usize {
    1281
}
