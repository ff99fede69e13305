//! Unlock session timeout
//!
//! Inactivity window enforced lazily: nothing runs in the background, the
//! manager calls [`UnlockTimeout::check`] at the start of each operation and
//! locks every wallet when it reports expiry. Every check slides the window
//! forward by the configured duration.

use crate::error::{Result, WalletError};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Time source (swappable in tests)
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Sliding-window unlock timeout; `expires_at == None` is the infinite sentinel
#[derive(Debug, Clone, Default)]
pub struct UnlockTimeout {
    duration: Duration,
    expires_at: Option<DateTime<Utc>>,
}

impl UnlockTimeout {
    /// Timeout that never fires
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.expires_at.is_some()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.expires_at.map(|_| self.duration)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Store `duration` and restart the window at `now`
    pub fn set(&mut self, duration: Duration, now: DateTime<Utc>) -> Result<()> {
        let overflow = || WalletError::TimeoutOverflow {
            secs: duration.as_secs(),
        };
        let step = chrono::Duration::from_std(duration).map_err(|_| overflow())?;
        let expires_at = now.checked_add_signed(step).ok_or_else(overflow)?;
        if expires_at < now || expires_at.timestamp() <= 0 {
            return Err(overflow());
        }

        self.duration = duration;
        self.expires_at = Some(expires_at);
        Ok(())
    }

    pub fn disable(&mut self) {
        self.expires_at = None;
    }

    /// Report whether the window had elapsed at `now`, then slide it
    pub fn check(&mut self, now: DateTime<Utc>) -> bool {
        let Some(expires_at) = self.expires_at else {
            return false;
        };
        let expired = now >= expires_at;
        // `set` already proved the step converts; only the sum can overflow
        if let Some(next) = chrono::Duration::from_std(self.duration)
            .ok()
            .and_then(|step| now.checked_add_signed(step))
        {
            self.expires_at = Some(next);
        }
        expired
    }

    /// Time left before expiry; `None` when disabled
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let expires_at = self.expires_at?;
        Some((expires_at - now).to_std().unwrap_or(Duration::ZERO))
    }
}
