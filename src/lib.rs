//! TRUE_TRUST wallet manager
//!
//! Runtime key custody for the node's signing service:
//! - Named encrypted wallets (Argon2id + XChaCha20-Poly1305), Ed25519 / Falcon512 keys
//! - Lock / unlock sessions with a sliding inactivity timeout
//! - Transaction and digest signing across all unlocked wallets (first match wins)
//! - Exclusive `wallet.lock` on the wallet directory against a second manager
//!
//! Modules:
//! - config: manager configuration (directory, timeout, KDF)
//! - core: Hash32, digests, chain id
//! - falcon_sigs: Falcon-512 digest signatures
//! - wallet: wallet capability trait, keys, encrypted storage, soft wallet
//! - tx: transactions and their signing digest
//! - timeout: unlock session timeout
//! - dir_lock: interprocess wallet directory lock
//! - manager: the wallet manager

#![forbid(unsafe_code)]

pub mod config;
pub mod core;
pub mod dir_lock;
pub mod error;
pub mod falcon_sigs;
pub mod manager;
pub mod timeout;
pub mod tx;
pub mod wallet;

pub use config::WalletManagerConfig;
pub use crate::core::{ChainId, Hash32};
pub use dir_lock::DirectoryLock;
pub use error::{Result, WalletError};
pub use manager::{WalletManager, PASSWORD_PREFIX, UNLOCKED_MARKER};
pub use timeout::{Clock, SystemClock, UnlockTimeout};
pub use tx::{Action, SignedTransaction, Transaction};
pub use wallet::{
    KdfParams, KeyType, PrivateKey, PublicKey, Signature, SoftWallet, WalletApi, WalletName,
};
