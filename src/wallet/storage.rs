//! Wallet encrypted storage

use crate::wallet::keys::{KeyType, PrivateKey};
use anyhow::{anyhow, ensure, Context, Result};
use argon2::{Argon2, Params, Version};
use chacha20poly1305::{
    aead::{Aead, KeyInit, OsRng},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

pub const WALLET_VERSION: u32 = 2;
const WALLET_MAX_SIZE: u64 = 4 << 20;

/// Argon2id cost parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub mem_kib: u32,
    pub time_cost: u32,
    pub lanes: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_kib: 65536,
            time_cost: 3,
            lanes: 1,
        }
    }
}

impl KdfParams {
    /// Minimal cost, for tests and throwaway wallets
    pub fn light() -> Self {
        Self {
            mem_kib: 64,
            time_cost: 1,
            lanes: 1,
        }
    }
}

/// KDF parameters + salt, stored in clear next to the ciphertext
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfHeader {
    pub params: KdfParams,
    pub salt: [u8; 32],
}

impl KdfHeader {
    /// Fresh header with a random salt
    pub fn fresh(params: KdfParams) -> Self {
        let mut salt = [0u8; 32];
        OsRng.fill_bytes(&mut salt);
        Self { params, salt }
    }

    /// Derive the 32-byte wallet key with Argon2id
    pub fn derive_key(&self, password: &str) -> Result<Zeroizing<[u8; 32]>> {
        let params = Params::new(
            self.params.mem_kib,
            self.params.time_cost,
            self.params.lanes,
            Some(32),
        )
        .map_err(|e| anyhow!("Argon2 params: {}", e))?;
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

        let mut key = Zeroizing::new([0u8; 32]);
        argon2
            .hash_password_into(password.as_bytes(), &self.salt, &mut *key)
            .map_err(|e| anyhow!("Key derivation failed: {}", e))?;

        Ok(key)
    }
}

/// Plaintext record of one key inside the ciphertext
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct KeyRecord {
    #[zeroize(skip)]
    key_type: KeyType,
    secret: Vec<u8>,
}

/// Encrypted wallet file format
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncryptedWallet {
    pub version: u32,
    pub kdf: KdfHeader,
    pub nonce: [u8; 24],
    pub ciphertext: Vec<u8>,
}

impl EncryptedWallet {
    /// Encrypt `keys` under an already derived wallet key
    pub fn seal<'a, I>(keys: I, key: &[u8; 32], kdf: KdfHeader) -> Result<Self>
    where
        I: IntoIterator<Item = &'a PrivateKey>,
    {
        let records: Vec<KeyRecord> = keys
            .into_iter()
            .map(|k| KeyRecord {
                key_type: k.key_type(),
                secret: k.secret_bytes().to_vec(),
            })
            .collect();
        let plaintext = Zeroizing::new(
            bincode::serialize(&records).context("Failed to serialize keys")?,
        );

        // Encrypt with XChaCha20-Poly1305
        let cipher = XChaCha20Poly1305::new(key.into());
        let mut nonce = [0u8; 24];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_ref())
            .map_err(|e| anyhow!("Encryption failed: {}", e))?;

        Ok(Self {
            version: WALLET_VERSION,
            kdf,
            nonce,
            ciphertext,
        })
    }

    /// Decrypt the key set with a derived wallet key
    pub fn open(&self, key: &[u8; 32]) -> Result<Vec<PrivateKey>> {
        ensure!(self.version == WALLET_VERSION, "Unsupported wallet version {}", self.version);

        let cipher = XChaCha20Poly1305::new(key.into());
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(XNonce::from_slice(&self.nonce), self.ciphertext.as_ref())
                .map_err(|_| anyhow!("Decryption failed - wrong password?"))?,
        );

        let records: Vec<KeyRecord> =
            bincode::deserialize(&plaintext).context("Failed to deserialize keys")?;
        records
            .iter()
            .map(|r| {
                PrivateKey::from_secret_bytes(r.key_type, &r.secret)
                    .map_err(|e| anyhow!("Corrupt key record: {}", e))
            })
            .collect()
    }

    /// Save to file (write to a sibling temp file, then rename over)
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = bincode::serialize(self).context("Failed to serialize wallet")?;
        let tmp = tmp_path(path);

        #[cfg(unix)]
        let mut f = {
            use std::os::unix::fs::OpenOptionsExt;
            let mut opts = OpenOptions::new();
            opts.create(true).write(true).truncate(true).mode(0o600);
            opts.open(&tmp)
                .with_context(|| format!("Failed to create {:?}", tmp))?
        };
        #[cfg(not(unix))]
        let mut f = {
            let mut opts = OpenOptions::new();
            opts.create(true).write(true).truncate(true);
            opts.open(&tmp)
                .with_context(|| format!("Failed to create {:?}", tmp))?
        };
        f.write_all(&data)?;
        f.sync_all()?;
        drop(f);

        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to write wallet to {:?}", path))?;
        Ok(())
    }

    /// Load from file
    pub fn load(path: &Path) -> Result<Self> {
        let meta = fs::metadata(path)
            .with_context(|| format!("Failed to read wallet from {:?}", path))?;
        ensure!(meta.is_file(), "{:?} is not a file", path);
        ensure!(meta.len() <= WALLET_MAX_SIZE, "Wallet file too large ({} bytes)", meta.len());

        let data = fs::read(path)
            .with_context(|| format!("Failed to read wallet from {:?}", path))?;
        let wallet: Self = bincode::deserialize(&data)
            .context("Failed to deserialize wallet")?;
        ensure!(
            wallet.version == WALLET_VERSION,
            "Unsupported wallet version {}",
            wallet.version
        );
        Ok(wallet)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}
