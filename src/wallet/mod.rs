//! Wallet capability and its backends
//!
//! A wallet is one encrypted keystore identified by a [`WalletName`]. The
//! [`WalletApi`] trait is everything the manager needs from a backend:
//! - password binding / verification, lock / unlock
//! - key listing, import, removal, creation
//! - signing by public key without failing on a miss
//! - persistence

pub mod keys;
pub mod platform;
pub mod soft_wallet;
pub mod storage;

pub use keys::{KeyType, PrivateKey, PublicKey, Signature};
pub use soft_wallet::SoftWallet;
pub use storage::{EncryptedWallet, KdfParams};

use crate::core::Hash32;
use crate::error::{Result, WalletError};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

/// Extension of every persisted wallet file
pub const WALLET_FILE_EXT: &str = ".wallet";

/// Interface implemented by each wallet backend.
///
/// Key listing and mutation require the wallet to be unlocked; the manager
/// checks this before delegating, backends may check again.
pub trait WalletApi: Send {
    /// Bind a passphrase; leaves the wallet locked
    fn set_password(&mut self, password: &str) -> Result<()>;

    /// `BadPassword` unless `password` is the bound passphrase
    fn check_password(&self, password: &str) -> Result<()>;

    /// Locked -> Unlocked iff the password verifies
    fn unlock(&mut self, password: &str) -> Result<()>;

    /// Unlocked -> Locked, discarding decrypted material
    fn lock(&mut self);

    fn is_locked(&self) -> bool;

    fn list_keys(&self) -> Result<BTreeMap<PublicKey, PrivateKey>>;

    fn list_public_keys(&self) -> Result<BTreeSet<PublicKey>>;

    fn import_key(&mut self, key: PrivateKey) -> Result<PublicKey>;

    fn remove_key(&mut self, key: &PublicKey) -> Result<()>;

    fn create_key(&mut self, key_type: KeyType) -> Result<PublicKey>;

    /// Sign with exactly `key`; `Ok(None)` if the key is absent or the wallet locked
    fn try_sign_digest(&self, digest: &Hash32, key: &PublicKey) -> Result<Option<Signature>>;

    fn load_wallet_file(&mut self) -> Result<()>;

    fn save_wallet_file(&mut self) -> Result<()>;
}

/// Validated wallet name, safe to use as a bare file name
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WalletName(String);

impl WalletName {
    /// Non-empty, only `[A-Za-z0-9._-]`, and a bare file name (no traversal)
    pub fn parse(name: &str) -> Result<Self> {
        let charset_ok = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        let bare = Path::new(name).file_name().and_then(|f| f.to_str()) == Some(name);
        if charset_ok && bare {
            Ok(Self(name.to_string()))
        } else {
            Err(WalletError::InvalidName(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<name>.wallet`
    pub fn file_name(&self) -> String {
        format!("{}{}", self.0, WALLET_FILE_EXT)
    }
}

impl fmt::Display for WalletName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for WalletName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["alice", "Bob-2", "my_wallet.v1", "a", "a..b", "-x"] {
            assert!(WalletName::parse(name).is_ok(), "{name} should be valid");
        }
        assert_eq!(WalletName::parse("alice").unwrap().file_name(), "alice.wallet");
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", ".", "..", "a/b", "../x", "a\\b", "/abs", "sp ace", "ünï", "a\0b"] {
            assert!(
                matches!(WalletName::parse(name), Err(WalletError::InvalidName(_))),
                "{name:?} should be rejected"
            );
        }
    }
}
