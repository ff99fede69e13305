//! Optional hardware-backed wallet
//!
//! Some platforms offer a keystore whose private keys never leave the
//! hardware. Such a backend plugs in as one more [`WalletApi`]; this build
//! ships none, so probing reports it as unavailable.

use super::WalletApi;
use crate::error::{Result, WalletError};

/// Registry name of the hardware-backed wallet
pub const SECURE_ENCLAVE_WALLET: &str = "SecureEnclave";

/// Fallible constructor for the platform keystore wallet
pub fn probe_secure_enclave() -> Result<Box<dyn WalletApi>> {
    Err(WalletError::PlatformWalletUnavailable(format!(
        "no hardware keystore backend for {}",
        std::env::consts::OS
    )))
}
