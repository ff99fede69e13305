//! Software-encrypted, file-backed wallet

use super::keys::{KeyType, PrivateKey, PublicKey, Signature};
use super::storage::{EncryptedWallet, KdfHeader, KdfParams};
use super::WalletApi;
use crate::core::Hash32;
use crate::error::{Result, WalletError};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Decrypted state, present only while unlocked
struct Session {
    key: Zeroizing<[u8; 32]>,
    keys: BTreeMap<PublicKey, PrivateKey>,
}

/// Software wallet: Argon2id + XChaCha20-Poly1305 sealed key set on disk
pub struct SoftWallet {
    path: PathBuf,
    kdf: KdfParams,
    /// Current encrypted form; `None` until a password is bound or a file loaded
    sealed: Option<EncryptedWallet>,
    session: Option<Session>,
}

impl SoftWallet {
    pub fn new(path: impl Into<PathBuf>, kdf: KdfParams) -> Self {
        Self {
            path: path.into(),
            kdf,
            sealed: None,
            session: None,
        }
    }

    pub fn wallet_filename(&self) -> &Path {
        &self.path
    }

    /// No password bound and nothing loaded yet
    pub fn is_new(&self) -> bool {
        self.sealed.is_none()
    }

    fn sealed(&self) -> Result<&EncryptedWallet> {
        self.sealed
            .as_ref()
            .ok_or_else(|| WalletError::NoPasswordSet(self.path.clone()))
    }

    fn session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| WalletError::WalletLocked(self.path.display().to_string()))
    }

    fn session_mut(&mut self) -> Result<&mut Session> {
        match self.session.as_mut() {
            Some(s) => Ok(s),
            None => Err(WalletError::WalletLocked(self.path.display().to_string())),
        }
    }

    /// Re-encrypt the live key set under the session key
    fn reseal(&mut self) -> Result<()> {
        let kdf = self.sealed()?.kdf.clone();
        let session = self.session()?;
        let sealed = EncryptedWallet::seal(session.keys.values(), &session.key, kdf)
            .map_err(|e| WalletError::Crypto(e.to_string()))?;
        self.sealed = Some(sealed);
        Ok(())
    }

    /// Seal and write `keys`; the session adopts them only once the file is on disk
    fn commit_keys(&mut self, keys: BTreeMap<PublicKey, PrivateKey>) -> Result<()> {
        let kdf = self.sealed()?.kdf.clone();
        let sealed = EncryptedWallet::seal(keys.values(), &self.session()?.key, kdf)
            .map_err(|e| WalletError::Crypto(e.to_string()))?;
        sealed.save(&self.path).map_err(save_error)?;

        self.sealed = Some(sealed);
        self.session_mut()?.keys = keys;
        Ok(())
    }
}

fn save_error(e: anyhow::Error) -> WalletError {
    WalletError::Io(std::io::Error::other(format!("{:#}", e)))
}

impl WalletApi for SoftWallet {
    fn set_password(&mut self, password: &str) -> Result<()> {
        if !self.is_new() && self.is_locked() {
            return Err(WalletError::WalletLocked(self.path.display().to_string()));
        }

        let header = KdfHeader::fresh(self.kdf);
        let key = header
            .derive_key(password)
            .map_err(|e| WalletError::Crypto(e.to_string()))?;
        let keys = self.session.take().map(|s| s.keys).unwrap_or_default();
        let sealed = EncryptedWallet::seal(keys.values(), &key, header)
            .map_err(|e| WalletError::Crypto(e.to_string()))?;

        self.sealed = Some(sealed);
        Ok(())
    }

    fn check_password(&self, password: &str) -> Result<()> {
        let session = self.session()?;
        let key = self
            .sealed()?
            .kdf
            .derive_key(password)
            .map_err(|e| WalletError::Crypto(e.to_string()))?;
        if bool::from(key[..].ct_eq(&session.key[..])) {
            Ok(())
        } else {
            Err(WalletError::BadPassword)
        }
    }

    fn unlock(&mut self, password: &str) -> Result<()> {
        let sealed = self.sealed()?;
        let key = sealed
            .kdf
            .derive_key(password)
            .map_err(|e| WalletError::Crypto(e.to_string()))?;
        let keys = sealed.open(&key).map_err(|_| WalletError::BadPassword)?;

        self.session = Some(Session {
            key,
            keys: keys
                .into_iter()
                .map(|k| (k.public_key().clone(), k))
                .collect(),
        });
        Ok(())
    }

    fn lock(&mut self) {
        // every mutation reseals, so the sealed copy is already current
        self.session = None;
    }

    fn is_locked(&self) -> bool {
        self.session.is_none()
    }

    fn list_keys(&self) -> Result<BTreeMap<PublicKey, PrivateKey>> {
        Ok(self.session()?.keys.clone())
    }

    fn list_public_keys(&self) -> Result<BTreeSet<PublicKey>> {
        Ok(self.session()?.keys.keys().cloned().collect())
    }

    fn import_key(&mut self, key: PrivateKey) -> Result<PublicKey> {
        let public = key.public_key().clone();
        let mut keys = self.session()?.keys.clone();
        if keys.contains_key(&public) {
            return Err(WalletError::KeyAlreadyExists(public.to_string()));
        }
        keys.insert(public.clone(), key);
        self.commit_keys(keys)?;
        Ok(public)
    }

    fn remove_key(&mut self, key: &PublicKey) -> Result<()> {
        let mut keys = self.session()?.keys.clone();
        if keys.remove(key).is_none() {
            return Err(WalletError::KeyNotFound(key.to_string()));
        }
        self.commit_keys(keys)
    }

    fn create_key(&mut self, key_type: KeyType) -> Result<PublicKey> {
        self.import_key(PrivateKey::generate(key_type))
    }

    fn try_sign_digest(&self, digest: &Hash32, key: &PublicKey) -> Result<Option<Signature>> {
        let Some(session) = self.session.as_ref() else {
            return Ok(None);
        };
        match session.keys.get(key) {
            Some(private) => private.sign(digest).map(Some),
            None => Ok(None),
        }
    }

    fn load_wallet_file(&mut self) -> Result<()> {
        let sealed = EncryptedWallet::load(&self.path).map_err(|e| {
            WalletError::WalletFileUnreadable {
                path: self.path.clone(),
                reason: format!("{:#}", e),
            }
        })?;
        self.session = None;
        self.sealed = Some(sealed);
        Ok(())
    }

    fn save_wallet_file(&mut self) -> Result<()> {
        if !self.is_locked() {
            self.reseal()?;
        }
        self.sealed()?.save(&self.path).map_err(save_error)
    }
}
