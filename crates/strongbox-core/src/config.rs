//! Engine configuration.

use std::time::Duration;

use crate::crypto::KdfParams;

/// Default inactivity window before the vault locks itself.
pub const DEFAULT_AUTO_LOCK: Duration = Duration::from_secs(15 * 60);

/// Settings for a [`KeyManager`](crate::keys::KeyManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// Inactivity window; `Duration::ZERO` disables auto-lock
    pub auto_lock: Duration,

    /// Cost used when creating a vault or changing its password
    pub kdf: KdfParams,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            auto_lock: DEFAULT_AUTO_LOCK,
            kdf: KdfParams::default(),
        }
    }
}

impl VaultConfig {
    pub fn with_auto_lock(mut self, auto_lock: Duration) -> Self {
        self.auto_lock = auto_lock;
        self
    }

    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }
}
