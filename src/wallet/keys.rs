//! Wallet key management - Ed25519 + Falcon512
//!
//! Text encodings:
//!   - public key:  `PUB_<TYPE>_<hex>`
//!   - private key: `PVT_<TYPE>_<hex>` (Falcon: secret bytes || public bytes)
//!   - signature:   `SIG_<TYPE>_<hex>`

use crate::core::Hash32;
use crate::error::{Result, WalletError};
use crate::falcon_sigs::{
    falcon_keypair, falcon_pk_from_bytes, falcon_pk_size, falcon_pk_to_bytes, falcon_sign_digest,
    falcon_sk_from_bytes, falcon_sk_size, falcon_sk_to_bytes, falcon_verify_digest,
};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

const ED25519_SEED_LEN: usize = 32;
const ED25519_PK_LEN: usize = 32;
const ED25519_SIG_LEN: usize = 64;

/// Signature scheme of a wallet key
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyType {
    #[default]
    Ed25519,
    Falcon512,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Ed25519 => "ED25519",
            KeyType::Falcon512 => "FALCON512",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses the uppercase selector; the empty selector picks the default type.
impl FromStr for KeyType {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" => Ok(KeyType::default()),
            "ED25519" => Ok(KeyType::Ed25519),
            "FALCON512" => Ok(KeyType::Falcon512),
            other => Err(WalletError::UnsupportedKeyType(other.to_string())),
        }
    }
}

/// Split `<PREFIX>_<TYPE>_<hex>` into its type and raw bytes
fn parse_tagged(s: &str, prefix: &str) -> Result<(KeyType, Vec<u8>)> {
    let invalid = || WalletError::InvalidKey(format!("expected {}_<TYPE>_<hex>", prefix));
    let rest = s
        .strip_prefix(prefix)
        .and_then(|r| r.strip_prefix('_'))
        .ok_or_else(invalid)?;
    let (kind, body) = rest.split_once('_').ok_or_else(invalid)?;
    if kind.is_empty() {
        return Err(invalid());
    }
    let key_type = kind
        .parse::<KeyType>()
        .map_err(|_| WalletError::InvalidKey(format!("unknown key type {:?}", kind)))?;
    let bytes = hex::decode(body).map_err(|e| WalletError::InvalidKey(e.to_string()))?;
    Ok((key_type, bytes))
}

/* =========================================================================================
 * PUBLIC KEY
 * ====================================================================================== */

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey {
    key_type: KeyType,
    bytes: Vec<u8>,
}

impl PublicKey {
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Verify `signature` over `digest`; any malformed input verifies as false
    pub fn verify(&self, digest: &Hash32, signature: &Signature) -> bool {
        if signature.key_type != self.key_type {
            return false;
        }
        match self.key_type {
            KeyType::Ed25519 => {
                let Ok(pk) = <[u8; ED25519_PK_LEN]>::try_from(self.bytes.as_slice()) else {
                    return false;
                };
                let Ok(vk) = VerifyingKey::from_bytes(&pk) else {
                    return false;
                };
                let Ok(sig) = <[u8; ED25519_SIG_LEN]>::try_from(signature.bytes.as_slice()) else {
                    return false;
                };
                vk.verify(digest, &ed25519_dalek::Signature::from_bytes(&sig)).is_ok()
            }
            KeyType::Falcon512 => match falcon_pk_from_bytes(&self.bytes) {
                Ok(pk) => falcon_verify_digest(digest, &signature.bytes, &pk),
                Err(_) => false,
            },
        }
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PUB_{}_{}", self.key_type, hex::encode(&self.bytes))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for PublicKey {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        let (key_type, bytes) = parse_tagged(s, "PUB")?;
        match key_type {
            KeyType::Ed25519 => {
                let pk = <[u8; ED25519_PK_LEN]>::try_from(bytes.as_slice()).map_err(|_| {
                    WalletError::InvalidKey("Ed25519 public key must be 32 bytes".into())
                })?;
                VerifyingKey::from_bytes(&pk)
                    .map_err(|e| WalletError::InvalidKey(e.to_string()))?;
            }
            KeyType::Falcon512 => {
                falcon_pk_from_bytes(&bytes).map_err(|e| WalletError::InvalidKey(e.to_string()))?;
            }
        }
        Ok(Self { key_type, bytes })
    }
}

/* =========================================================================================
 * PRIVATE KEY
 * ====================================================================================== */

/// Private key with its public half; secret bytes are zeroized on drop
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    secret: Zeroizing<Vec<u8>>,
    public: PublicKey,
}

impl PrivateKey {
    /// Generate new keypair
    pub fn generate(key_type: KeyType) -> Self {
        match key_type {
            KeyType::Ed25519 => {
                let mut seed = Zeroizing::new([0u8; ED25519_SEED_LEN]);
                OsRng.fill_bytes(&mut *seed);
                Self::ed25519_from_seed(&seed)
            }
            KeyType::Falcon512 => {
                let (pk, sk) = falcon_keypair();
                Self {
                    secret: falcon_sk_to_bytes(&sk),
                    public: PublicKey {
                        key_type,
                        bytes: falcon_pk_to_bytes(&pk).to_vec(),
                    },
                }
            }
        }
    }

    fn ed25519_from_seed(seed: &[u8; ED25519_SEED_LEN]) -> Self {
        let sk = SigningKey::from_bytes(seed);
        Self {
            secret: Zeroizing::new(seed.to_vec()),
            public: PublicKey {
                key_type: KeyType::Ed25519,
                bytes: sk.verifying_key().to_bytes().to_vec(),
            },
        }
    }

    pub fn key_type(&self) -> KeyType {
        self.public.key_type
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Sign a 32-byte digest
    pub fn sign(&self, digest: &Hash32) -> Result<Signature> {
        let bytes = match self.key_type() {
            KeyType::Ed25519 => {
                let mut seed = Zeroizing::new([0u8; ED25519_SEED_LEN]);
                seed.copy_from_slice(&self.secret);
                SigningKey::from_bytes(&seed).sign(digest).to_bytes().to_vec()
            }
            KeyType::Falcon512 => {
                let sk = falcon_sk_from_bytes(&self.secret)
                    .map_err(|e| WalletError::Crypto(e.to_string()))?;
                falcon_sign_digest(digest, &sk)
            }
        };
        Ok(Signature {
            key_type: self.key_type(),
            bytes,
        })
    }

    /// Raw secret encoding (Falcon: secret || public)
    pub(crate) fn secret_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(self.secret.to_vec());
        if self.key_type() == KeyType::Falcon512 {
            out.extend_from_slice(&self.public.bytes);
        }
        out
    }

    /// Rebuild from the raw secret encoding produced by `secret_bytes`
    pub(crate) fn from_secret_bytes(key_type: KeyType, raw: &[u8]) -> Result<Self> {
        match key_type {
            KeyType::Ed25519 => {
                let mut seed = Zeroizing::new([0u8; ED25519_SEED_LEN]);
                if raw.len() != ED25519_SEED_LEN {
                    return Err(WalletError::InvalidKey(
                        "Ed25519 private key must be 32 bytes".into(),
                    ));
                }
                seed.copy_from_slice(raw);
                Ok(Self::ed25519_from_seed(&seed))
            }
            KeyType::Falcon512 => {
                if raw.len() != falcon_sk_size() + falcon_pk_size() {
                    return Err(WalletError::InvalidKey(format!(
                        "Falcon512 private key must be {} bytes",
                        falcon_sk_size() + falcon_pk_size()
                    )));
                }
                let (sk, pk) = raw.split_at(falcon_sk_size());
                falcon_sk_from_bytes(sk).map_err(|e| WalletError::InvalidKey(e.to_string()))?;
                falcon_pk_from_bytes(pk).map_err(|e| WalletError::InvalidKey(e.to_string()))?;
                Ok(Self {
                    secret: Zeroizing::new(sk.to_vec()),
                    public: PublicKey {
                        key_type,
                        bytes: pk.to_vec(),
                    },
                })
            }
        }
    }
}

impl fmt::Display for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.secret_bytes();
        write!(f, "PVT_{}_{}", self.key_type(), hex::encode(&*raw))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({}, <redacted>)", self.public)
    }
}

impl FromStr for PrivateKey {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        let (key_type, bytes) = parse_tagged(s, "PVT")?;
        let bytes = Zeroizing::new(bytes);
        Self::from_secret_bytes(key_type, &bytes)
    }
}

/* =========================================================================================
 * SIGNATURE
 * ====================================================================================== */

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Signature {
    key_type: KeyType,
    bytes: Vec<u8>,
}

impl Signature {
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIG_{}_{}", self.key_type, hex::encode(&self.bytes))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Signature {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        let (key_type, bytes) = parse_tagged(s, "SIG")?;
        if key_type == KeyType::Ed25519 && bytes.len() != ED25519_SIG_LEN {
            return Err(WalletError::InvalidKey("Ed25519 signature must be 64 bytes".into()));
        }
        Ok(Self { key_type, bytes })
    }
}
