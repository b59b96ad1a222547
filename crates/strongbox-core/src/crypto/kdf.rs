//! Key derivation using Argon2id.
//!
//! This module derives the vault key from the master password using the
//! Argon2id algorithm, which is memory-hard and resistant to GPU-based attacks.

use std::thread::JoinHandle;

use argon2::Argon2;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{Result, VaultError};

/// Default Argon2id cost.
///
/// - Memory: 64 MB (64 * 1024 KB)
/// - Iterations: 3
/// - Parallelism: 1
pub const DEFAULT_MEMORY_KIB: u32 = 64 * 1024;
pub const DEFAULT_ITERATIONS: u32 = 3;
pub const DEFAULT_PARALLELISM: u32 = 1;

/// Lowest cost accepted for any vault, including imported ones.
pub const MIN_ITERATIONS: u32 = 2;
pub const MIN_MEMORY_KIB: u32 = 8 * 1024;

// Upper bounds keep a hostile bundle from pinning the machine.
const MAX_ITERATIONS: u32 = 64;
const MAX_MEMORY_KIB: u32 = 4 * 1024 * 1024;
const MAX_PARALLELISM: u32 = 16;

/// Minimum salt length in bytes.
pub const MIN_SALT_LENGTH: usize = 16;

/// Length of generated salts in bytes.
pub const SALT_LENGTH: usize = 32;

/// Length of derived key in bytes (256 bits).
pub const KEY_LENGTH: usize = 32;

/// Key derivation algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KdfAlgorithm {
    Argon2id,
}

/// Tunable cost parameters stored in vault metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub algorithm: KdfAlgorithm,
    pub iterations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_kib: Option<u32>,
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

fn default_parallelism() -> u32 {
    DEFAULT_PARALLELISM
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            algorithm: KdfAlgorithm::Argon2id,
            iterations: DEFAULT_ITERATIONS,
            memory_kib: Some(DEFAULT_MEMORY_KIB),
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

impl KdfParams {
    /// Argon2id parameters with explicit cost.
    pub fn argon2id(iterations: u32, memory_kib: u32, parallelism: u32) -> Self {
        Self {
            algorithm: KdfAlgorithm::Argon2id,
            iterations,
            memory_kib: Some(memory_kib),
            parallelism,
        }
    }

    /// Cheapest parameters the floor allows. Used by tests and benchmarks.
    pub fn minimum() -> Self {
        Self::argon2id(MIN_ITERATIONS, MIN_MEMORY_KIB, 1)
    }

    /// Memory cost, falling back to the default when unset.
    pub fn memory_kib(&self) -> u32 {
        self.memory_kib.unwrap_or(DEFAULT_MEMORY_KIB)
    }

    /// Check the parameters against the safety floor and sanity ceiling.
    pub fn validate(&self) -> Result<()> {
        if self.iterations < MIN_ITERATIONS {
            return Err(VaultError::InvalidParams(format!(
                "KDF iterations must be at least {} (got {})",
                MIN_ITERATIONS, self.iterations
            )));
        }
        if self.iterations > MAX_ITERATIONS {
            return Err(VaultError::InvalidParams(format!(
                "KDF iterations must be at most {} (got {})",
                MAX_ITERATIONS, self.iterations
            )));
        }
        let memory = self.memory_kib();
        if !(MIN_MEMORY_KIB..=MAX_MEMORY_KIB).contains(&memory) {
            return Err(VaultError::InvalidParams(format!(
                "KDF memory must be between {} and {} KiB (got {})",
                MIN_MEMORY_KIB, MAX_MEMORY_KIB, memory
            )));
        }
        if self.parallelism == 0 || self.parallelism > MAX_PARALLELISM {
            return Err(VaultError::InvalidParams(format!(
                "KDF parallelism must be between 1 and {} (got {})",
                MAX_PARALLELISM, self.parallelism
            )));
        }
        Ok(())
    }
}

/// The vault key derived from the master password.
///
/// Key material is zeroized from memory when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    key: [u8; KEY_LENGTH],
}

impl MasterKey {
    fn zeroed() -> Self {
        Self {
            key: [0u8; KEY_LENGTH],
        }
    }

    #[cfg(test)]
    pub(crate) fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self { key: bytes }
    }

    /// Raw key bytes. Use only for immediate cipher operations.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Generate a fresh random salt for a new vault or a rekey.
pub fn generate_salt() -> Result<Vec<u8>> {
    let mut salt = vec![0u8; SALT_LENGTH];
    super::fill_random(&mut salt)?;
    Ok(salt)
}

/// Derive the vault key from a password.
///
/// Same password + salt + params always produce the same key. Fails with
/// `InvalidParams` when the password is empty, the salt is shorter than 16
/// bytes, or the cost is under the floor.
///
/// # Examples
///
/// ```
/// use strongbox_core::crypto::{derive_key, KdfParams};
///
/// let salt = b"unique-salt-per-vault-16";
/// let key = derive_key("my-passphrase", salt, &KdfParams::minimum()).unwrap();
/// # drop(key);
/// ```
pub fn derive_key(password: &str, salt: &[u8], params: &KdfParams) -> Result<MasterKey> {
    if password.is_empty() {
        return Err(VaultError::InvalidParams(
            "Password cannot be empty".to_string(),
        ));
    }

    if salt.len() < MIN_SALT_LENGTH {
        return Err(VaultError::InvalidParams(format!(
            "Salt must be at least {} bytes",
            MIN_SALT_LENGTH
        )));
    }

    params.validate()?;

    let argon_params = argon2::Params::new(
        params.memory_kib(),
        params.iterations,
        params.parallelism,
        Some(KEY_LENGTH),
    )
    .map_err(|e| VaultError::InvalidParams(format!("Argon2 params rejected: {}", e)))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon_params,
    );

    // Derive in place; the key bytes never live outside the MasterKey
    let mut key = MasterKey::zeroed();
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key.key)
        .map_err(|e| VaultError::InvalidParams(format!("Key derivation failed: {}", e)))?;

    Ok(key)
}

/// Run [`derive_key`] on a dedicated thread.
///
/// Derivation takes hundreds of milliseconds by design; this keeps the
/// caller's thread free while it runs.
pub fn derive_key_detached(
    password: Zeroizing<String>,
    salt: Vec<u8>,
    params: KdfParams,
) -> JoinHandle<Result<MasterKey>> {
    std::thread::spawn(move || derive_key(&password, &salt, &params))
}

/// Join a detached derivation, mapping a panicked worker to an error.
pub fn join_derivation(handle: JoinHandle<Result<MasterKey>>) -> Result<MasterKey> {
    handle
        .join()
        .map_err(|_| VaultError::InvalidParams("Key derivation worker panicked".to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALT: &[u8] = b"unique-salt-1234567890123456";

    #[test]
    fn test_key_derivation_deterministic() {
        let params = KdfParams::minimum();
        let key1 = derive_key("test-passphrase", SALT, &params).unwrap();
        let key2 = derive_key("test-passphrase", SALT, &params).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_key_matches_raw_argon2id_output() {
        let params = KdfParams::minimum();
        let key = derive_key("test-passphrase", SALT, &params).unwrap();

        let argon2 = Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            argon2::Params::new(
                params.memory_kib(),
                params.iterations,
                params.parallelism,
                Some(KEY_LENGTH),
            )
            .unwrap(),
        );
        let mut expected = [0u8; KEY_LENGTH];
        argon2
            .hash_password_into(b"test-passphrase", SALT, &mut expected)
            .unwrap();

        assert_eq!(key.as_bytes(), &expected);
        assert_ne!(key.as_bytes(), &[0u8; KEY_LENGTH]);
    }

    #[test]
    fn test_different_salt_different_key() {
        let params = KdfParams::minimum();
        let key1 = derive_key("test-passphrase", b"salt1-1234567890123456", &params).unwrap();
        let key2 = derive_key("test-passphrase", b"salt2-1234567890123456", &params).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_different_passphrase_different_key() {
        let params = KdfParams::minimum();
        let key1 = derive_key("passphrase-one", SALT, &params).unwrap();
        let key2 = derive_key("passphrase-two", SALT, &params).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_different_cost_different_key() {
        let key1 = derive_key("test-passphrase", SALT, &KdfParams::minimum()).unwrap();
        let key2 =
            derive_key("test-passphrase", SALT, &KdfParams::argon2id(3, MIN_MEMORY_KIB, 1))
                .unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        let result = derive_key("", SALT, &KdfParams::minimum());
        assert!(matches!(result, Err(VaultError::InvalidParams(_))));
    }

    #[test]
    fn test_short_salt_rejected() {
        let result = derive_key("test-passphrase", b"short", &KdfParams::minimum());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Salt must be at least 16 bytes"));
    }

    #[test]
    fn test_iterations_below_floor_rejected() {
        let params = KdfParams::argon2id(1, MIN_MEMORY_KIB, 1);
        let result = derive_key("test-passphrase", SALT, &params);
        assert!(matches!(result, Err(VaultError::InvalidParams(_))));
    }

    #[test]
    fn test_memory_below_floor_rejected() {
        let params = KdfParams::argon2id(3, 1024, 1);
        assert!(matches!(
            params.validate(),
            Err(VaultError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_absurd_cost_rejected() {
        let params = KdfParams::argon2id(10_000, MIN_MEMORY_KIB, 1);
        assert!(params.validate().is_err());
        let params = KdfParams::argon2id(3, MIN_MEMORY_KIB, 0);
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_default_params_are_valid() {
        assert!(KdfParams::default().validate().is_ok());
        assert_eq!(KdfParams::default().memory_kib(), DEFAULT_MEMORY_KIB);
    }

    #[test]
    fn test_params_json_shape() {
        let json = serde_json::to_value(KdfParams::minimum()).unwrap();
        assert_eq!(json["algorithm"], "argon2id");
        assert_eq!(json["iterations"], MIN_ITERATIONS);
        assert_eq!(json["memory_kib"], MIN_MEMORY_KIB);
    }

    #[test]
    fn test_generated_salts_differ() {
        let salt1 = generate_salt().unwrap();
        let salt2 = generate_salt().unwrap();
        assert_eq!(salt1.len(), SALT_LENGTH);
        assert_ne!(salt1, salt2);
    }

    #[test]
    fn test_detached_derivation_matches_inline() {
        let params = KdfParams::minimum();
        let handle = derive_key_detached(
            Zeroizing::new("test-passphrase".to_string()),
            SALT.to_vec(),
            params.clone(),
        );
        let detached = join_derivation(handle).unwrap();
        let inline = derive_key("test-passphrase", SALT, &params).unwrap();
        assert_eq!(detached.as_bytes(), inline.as_bytes());
    }

    #[test]
    fn test_master_key_debug_redacts() {
        let key = derive_key("test-passphrase", SALT, &KdfParams::minimum()).unwrap();

        let debug_output = format!("{:?}", key);
        assert!(debug_output.contains("REDACTED"));

        let key_hex = hex::encode(&key.as_bytes()[..4]);
        assert!(!debug_output.contains(&key_hex));
    }
}
