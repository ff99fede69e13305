//! Wallet manager errors

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WalletError>;

// =================== Errors ===================

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Invalid wallet name, path not allowed in wallet name: {0:?}")]
    InvalidName(String),

    #[error("Wallet with name '{name}' already exists at {path:?}")]
    WalletAlreadyExists { name: String, path: PathBuf },

    #[error("Wallet not found: {0}")]
    WalletNonexistent(String),

    #[error("Wallet is locked: {0}")]
    WalletLocked(String),

    #[error("Wallet is already unlocked: {0}")]
    WalletAlreadyUnlocked(String),

    #[error("Invalid password for wallet")]
    BadPassword,

    #[error("Public key not found in unlocked wallets: {0}")]
    MissingPublicKey(String),

    #[error("You don't have any wallet")]
    NoWalletsAvailable,

    #[error("You don't have any unlocked wallet")]
    AllWalletsLocked,

    #[error("Overflow on unlock timeout: {secs}s from now")]
    TimeoutOverflow { secs: u64 },

    #[error(
        "Failed to lock wallet directory at {path:?} ({reason}); is another wallet manager running?"
    )]
    DirectoryLockUnavailable { path: PathBuf, reason: String },

    #[error("Unable to read wallet file {path:?}: {reason}")]
    WalletFileUnreadable { path: PathBuf, reason: String },

    #[error("Tried to register wallet name that already exists: {0}")]
    DuplicateWalletRegistration(String),

    #[error("Wallet has no password set: {0:?}")]
    NoPasswordSet(PathBuf),

    #[error("Key already in wallet: {0}")]
    KeyAlreadyExists(String),

    #[error("Key not in wallet: {0}")]
    KeyNotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Unsupported key type: {0:?}")]
    UnsupportedKeyType(String),

    #[error("Platform wallet unavailable: {0}")]
    PlatformWalletUnavailable(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
