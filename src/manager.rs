//! Wallet manager
//!
//! Owns every loaded wallet by name, the unlock timeout and the wallet
//! directory lock. All operations run on `&mut self`; callers serialize
//! access (one request at a time).

use crate::config::WalletManagerConfig;
use crate::core::{ChainId, Hash32};
use crate::dir_lock::{DirectoryLock, LOCK_FILE_NAME};
use crate::error::{Result, WalletError};
use crate::timeout::{Clock, SystemClock, UnlockTimeout};
use crate::tx::SignedTransaction;
use crate::wallet::platform::{probe_secure_enclave, SECURE_ENCLAVE_WALLET};
use crate::wallet::{
    KdfParams, KeyType, PrivateKey, PublicKey, Signature, SoftWallet, WalletApi, WalletName,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Prefix marking a generated (not user-chosen) wallet password
pub const PASSWORD_PREFIX: &str = "PW";

/// Marker appended to unlocked wallets by `list_wallets`
pub const UNLOCKED_MARKER: &str = " *";

/// Fresh password with private-key-grade entropy
fn gen_password() -> String {
    format!("{}{}", PASSWORD_PREFIX, PrivateKey::generate(KeyType::Ed25519))
}

pub struct WalletManager {
    dir: PathBuf,
    kdf: KdfParams,
    /// Registration order is the signing scan order
    wallets: Vec<(WalletName, Box<dyn WalletApi>)>,
    timeout: UnlockTimeout,
    clock: Arc<dyn Clock>,
    dir_lock: Option<DirectoryLock>,
}

impl WalletManager {
    pub fn new(config: WalletManagerConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: WalletManagerConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        fs::create_dir_all(&config.wallet_dir)?;

        let mut mgr = Self {
            dir: config.wallet_dir,
            kdf: config.kdf,
            wallets: Vec::new(),
            timeout: UnlockTimeout::disabled(),
            clock,
            dir_lock: None,
        };
        if let Some(timeout) = config.unlock_timeout {
            mgr.set_timeout(timeout)?;
        }
        if config.probe_platform_wallet {
            mgr.register_platform_wallet(probe_secure_enclave);
        }
        Ok(mgr)
    }

    /// Register the optional hardware-backed wallet if `probe` yields one.
    /// Probe failure only means the platform has none.
    pub fn register_platform_wallet<F>(&mut self, probe: F) -> bool
    where
        F: FnOnce() -> Result<Box<dyn WalletApi>>,
    {
        match probe() {
            Ok(wallet) => match self.own_and_use_wallet(SECURE_ENCLAVE_WALLET, wallet) {
                Ok(()) => {
                    info!(wallet = SECURE_ENCLAVE_WALLET, "platform wallet registered");
                    true
                }
                Err(e) => {
                    warn!(error = %e, "platform wallet not registered");
                    false
                }
            },
            Err(e) => {
                debug!(error = %e, "no platform wallet");
                false
            }
        }
    }

    pub fn wallet_dir(&self) -> &Path {
        &self.dir
    }

    /// Point the manager at another wallet directory (not while it is locked)
    pub fn set_dir(&mut self, dir: impl Into<PathBuf>) -> Result<()> {
        if self.dir_lock.is_some() {
            return Err(WalletError::DirectoryLockUnavailable {
                path: self.dir.join(LOCK_FILE_NAME),
                reason: "directory lock is held by this manager".into(),
            });
        }
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        self.dir = dir;
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.wallets.iter().any(|(n, _)| n.as_str() == name)
    }

    /* =====================================================================
     * Timeout
     * ================================================================== */

    /// Store `timeout` and restart the window from now
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        let now = self.clock.now();
        self.timeout.set(timeout, now)
    }

    pub fn disable_timeout(&mut self) {
        self.timeout.disable();
    }

    pub fn timeout_remaining(&self) -> Option<Duration> {
        self.timeout.remaining(self.clock.now())
    }

    /// Lock everything if the window elapsed, then slide it
    pub fn check_timeout(&mut self) {
        let now = self.clock.now();
        if self.timeout.check(now) {
            info!("unlock timeout reached");
            self.lock_all();
        }
    }

    /* =====================================================================
     * Wallet lifecycle
     * ================================================================== */

    /// Create `<name>.wallet`, leave it unlocked, return its password.
    /// The password is never shown again.
    pub fn create(&mut self, name: &str) -> Result<String> {
        self.check_timeout();

        let wallet_name = WalletName::parse(name)?;
        let path = self.dir.join(wallet_name.file_name());
        if path.exists() {
            return Err(WalletError::WalletAlreadyExists {
                name: name.to_string(),
                path,
            });
        }

        let password = gen_password();
        let mut wallet = SoftWallet::new(path, self.kdf);
        wallet.set_password(&password)?;
        // prove the password both encrypts and decrypts before handing it out
        wallet.unlock(&password)?;
        wallet.lock();
        wallet.unlock(&password)?;
        wallet.save_wallet_file()?;

        // replaces a stale entry if the file vanished while we were running
        self.register(wallet_name, Box::new(wallet));
        info!(wallet = name, "wallet created");
        Ok(password)
    }

    pub fn open(&mut self, name: &str) -> Result<()> {
        self.check_timeout();
        self.open_wallet(name)
    }

    fn open_wallet(&mut self, name: &str) -> Result<()> {
        let wallet_name = WalletName::parse(name)?;
        let path = self.dir.join(wallet_name.file_name());

        let mut wallet = SoftWallet::new(path, self.kdf);
        if let Err(e) = wallet.load_wallet_file() {
            debug!(wallet = name, error = %e, "wallet open failed");
            return Err(WalletError::WalletNonexistent(name.to_string()));
        }

        // replaces a stale entry if the file was added while we were running
        self.register(wallet_name, Box::new(wallet));
        info!(wallet = name, "wallet opened");
        Ok(())
    }

    fn register(&mut self, name: WalletName, wallet: Box<dyn WalletApi>) {
        self.wallets.retain(|(n, _)| *n != name);
        self.wallets.push((name, wallet));
    }

    /// Registered names; unlocked ones carry [`UNLOCKED_MARKER`]
    pub fn list_wallets(&mut self) -> Vec<String> {
        self.check_timeout();
        self.wallets
            .iter()
            .map(|(name, w)| {
                if w.is_locked() {
                    name.to_string()
                } else {
                    format!("{}{}", name, UNLOCKED_MARKER)
                }
            })
            .collect()
    }

    /// Register a pre-built wallet (platform backends); the name must be new
    pub fn own_and_use_wallet(&mut self, name: &str, wallet: Box<dyn WalletApi>) -> Result<()> {
        if self.is_registered(name) {
            return Err(WalletError::DuplicateWalletRegistration(name.to_string()));
        }
        let wallet_name = WalletName::parse(name)?;
        self.wallets.push((wallet_name, wallet));
        Ok(())
    }

    /* =====================================================================
     * Lock / unlock
     * ================================================================== */

    /// Lock every unlocked wallet; does not touch the timeout
    pub fn lock_all(&mut self) {
        let mut locked = 0usize;
        for (_, w) in self.wallets.iter_mut() {
            if !w.is_locked() {
                w.lock();
                locked += 1;
            }
        }
        if locked > 0 {
            info!(count = locked, "locked all wallets");
        }
    }

    /// Idempotent: locking a locked wallet succeeds
    pub fn lock(&mut self, name: &str) -> Result<()> {
        self.check_timeout();
        let w = self.wallet_mut(name)?;
        if w.is_locked() {
            return Ok(());
        }
        w.lock();
        info!(wallet = name, "wallet locked");
        Ok(())
    }

    /// Unlock `name`, opening its file first if it is not registered yet
    pub fn unlock(&mut self, name: &str, password: &str) -> Result<()> {
        self.check_timeout();
        if !self.is_registered(name) {
            self.open_wallet(name)?;
        }
        let w = self.wallet_mut(name)?;
        if !w.is_locked() {
            return Err(WalletError::WalletAlreadyUnlocked(name.to_string()));
        }
        w.unlock(password)?;
        info!(wallet = name, "wallet unlocked");
        Ok(())
    }

    /* =====================================================================
     * Keys
     * ================================================================== */

    pub fn list_keys(
        &mut self,
        name: &str,
        password: &str,
    ) -> Result<BTreeMap<PublicKey, PrivateKey>> {
        self.check_timeout();
        let w = self.unlocked_wallet_mut(name)?;
        w.check_password(password)?;
        w.list_keys()
    }

    /// Public keys of every unlocked wallet
    pub fn get_public_keys(&mut self) -> Result<BTreeSet<PublicKey>> {
        self.check_timeout();
        if self.wallets.is_empty() {
            return Err(WalletError::NoWalletsAvailable);
        }

        let mut result = BTreeSet::new();
        let mut all_locked = true;
        for (_, w) in self.wallets.iter().filter(|(_, w)| !w.is_locked()) {
            all_locked = false;
            result.extend(w.list_public_keys()?);
        }
        if all_locked {
            return Err(WalletError::AllWalletsLocked);
        }
        Ok(result)
    }

    /// Every unlocked key's signature over the chain id
    pub fn get_my_signatures(&mut self, chain_id: &ChainId) -> Result<BTreeSet<Signature>> {
        self.check_timeout();
        if self.wallets.is_empty() {
            return Err(WalletError::NoWalletsAvailable);
        }

        let mut result = BTreeSet::new();
        let mut all_locked = true;
        for (_, w) in self.wallets.iter().filter(|(_, w)| !w.is_locked()) {
            all_locked = false;
            for key in w.list_public_keys()? {
                if let Some(sig) = w.try_sign_digest(chain_id.as_bytes(), &key)? {
                    result.insert(sig);
                }
            }
        }
        if all_locked {
            return Err(WalletError::AllWalletsLocked);
        }
        Ok(result)
    }

    pub fn import_key(&mut self, name: &str, wif_key: &str) -> Result<PublicKey> {
        self.check_timeout();
        let w = self.unlocked_wallet_mut(name)?;
        let key: PrivateKey = wif_key.parse()?;
        let public = w.import_key(key)?;
        info!(wallet = name, key = %public, "key imported");
        Ok(public)
    }

    /// Remove `key` after verifying `password`
    pub fn remove_key(&mut self, name: &str, password: &str, key: &str) -> Result<()> {
        self.check_timeout();
        let w = self.unlocked_wallet_mut(name)?;
        w.check_password(password)?;
        let public: PublicKey = key.parse()?;
        w.remove_key(&public)?;
        info!(wallet = name, key = %public, "key removed");
        Ok(())
    }

    /// `key_type` is case-insensitive; empty selects the default type
    pub fn create_key(&mut self, name: &str, key_type: &str) -> Result<PublicKey> {
        self.check_timeout();
        let w = self.unlocked_wallet_mut(name)?;
        let key_type: KeyType = key_type.to_uppercase().parse()?;
        let public = w.create_key(key_type)?;
        info!(wallet = name, key = %public, "key created");
        Ok(public)
    }

    /* =====================================================================
     * Signing
     * ================================================================== */

    /// Sign `txn` with every key in `keys`; each key must live in an unlocked wallet
    pub fn sign_transaction(
        &mut self,
        txn: &SignedTransaction,
        keys: &BTreeSet<PublicKey>,
        chain_id: &ChainId,
    ) -> Result<SignedTransaction> {
        self.check_timeout();

        let mut stxn = txn.clone();
        let digest = stxn.sig_digest(chain_id)?;
        for key in keys {
            let sig = self
                .find_signature(&digest, key)?
                .ok_or_else(|| WalletError::MissingPublicKey(key.to_string()))?;
            stxn.signatures.push(sig);
        }
        debug!(signatures = keys.len(), chain = %chain_id, "transaction signed");
        Ok(stxn)
    }

    pub fn sign_digest(&mut self, digest: &Hash32, key: &PublicKey) -> Result<Signature> {
        self.check_timeout();
        self.find_signature(digest, key)?
            .ok_or_else(|| WalletError::MissingPublicKey(key.to_string()))
    }

    /// First unlocked wallet (registration order) holding `key` signs
    fn find_signature(&self, digest: &Hash32, key: &PublicKey) -> Result<Option<Signature>> {
        for (name, w) in self.wallets.iter().filter(|(_, w)| !w.is_locked()) {
            if let Some(sig) = w.try_sign_digest(digest, key)? {
                debug!(wallet = %name, key = %key, "digest signed");
                return Ok(Some(sig));
            }
        }
        Ok(None)
    }

    /* =====================================================================
     * Directory lock
     * ================================================================== */

    /// Take the exclusive `wallet.lock` on the wallet directory; one attempt
    pub fn initialize_lock(&mut self) -> Result<()> {
        if self.dir_lock.is_some() {
            return Ok(());
        }
        self.dir_lock = Some(DirectoryLock::acquire(&self.dir)?);
        Ok(())
    }

    pub fn holds_lock(&self) -> bool {
        self.dir_lock.is_some()
    }

    /* =====================================================================
     * Registry helpers
     * ================================================================== */

    fn wallet_mut(&mut self, name: &str) -> Result<&mut Box<dyn WalletApi>> {
        self.wallets
            .iter_mut()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, w)| w)
            .ok_or_else(|| WalletError::WalletNonexistent(name.to_string()))
    }

    fn unlocked_wallet_mut(&mut self, name: &str) -> Result<&mut Box<dyn WalletApi>> {
        let w = self.wallet_mut(name)?;
        if w.is_locked() {
            return Err(WalletError::WalletLocked(name.to_string()));
        }
        Ok(w)
    }
}
