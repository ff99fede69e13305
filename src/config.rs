//! Wallet manager configuration

use crate::wallet::KdfParams;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Default unlock session length
pub const DEFAULT_UNLOCK_TIMEOUT: Duration = Duration::from_secs(900);

pub const ENV_WALLET_DIR: &str = "TT_WALLET_DIR";
pub const ENV_UNLOCK_TIMEOUT: &str = "TT_WALLET_UNLOCK_TIMEOUT";

#[derive(Debug, Clone)]
pub struct WalletManagerConfig {
    pub wallet_dir: PathBuf,
    /// `None` disables the unlock timeout
    pub unlock_timeout: Option<Duration>,
    pub kdf: KdfParams,
    pub probe_platform_wallet: bool,
}

impl Default for WalletManagerConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            wallet_dir: home.join(".tt_wallet"),
            unlock_timeout: Some(DEFAULT_UNLOCK_TIMEOUT),
            kdf: KdfParams::default(),
            probe_platform_wallet: true,
        }
    }
}

impl WalletManagerConfig {
    /// Defaults overridden by `TT_WALLET_DIR` / `TT_WALLET_UNLOCK_TIMEOUT`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(dir) = std::env::var_os(ENV_WALLET_DIR) {
            cfg.wallet_dir = PathBuf::from(dir);
        }
        if let Ok(raw) = std::env::var(ENV_UNLOCK_TIMEOUT) {
            match parse_timeout(&raw) {
                Some(timeout) => cfg.unlock_timeout = timeout,
                None => warn!(value = %raw, "ignoring malformed {}", ENV_UNLOCK_TIMEOUT),
            }
        }
        cfg
    }

    pub fn with_wallet_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.wallet_dir = dir.into();
        self
    }

    pub fn with_unlock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.unlock_timeout = timeout;
        self
    }

    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn with_platform_probe(mut self, enabled: bool) -> Self {
        self.probe_platform_wallet = enabled;
        self
    }
}

/// Seconds; `0` / `none` / `off` disable. Outer `None` = malformed.
fn parse_timeout(raw: &str) -> Option<Option<Duration>> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("none") || raw.eq_ignore_ascii_case("off") {
        return Some(None);
    }
    match raw.parse::<u64>().ok()? {
        0 => Some(None),
        secs => Some(Some(Duration::from_secs(secs))),
    }
}
