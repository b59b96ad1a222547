//! Cryptographic operations for Strongbox.
//!
//! This module provides key derivation and authenticated encryption using
//! well-audited libraries:
//! - **Argon2id**: Memory-hard key derivation function
//! - **XChaCha20-Poly1305**: AEAD with 192-bit random nonces
//!
//! ## Security Model
//!
//! - One master password derives one 256-bit key per vault (salted, Argon2id)
//! - Every record is an independent envelope with a fresh random nonce
//! - Envelopes are bound to their record identity through associated data
//! - Key material is zeroized from memory on drop
//!
//! ## Threat Model
//!
//! We defend against:
//! - Theft or tampering of the datastore or an exported bundle
//! - Offline brute-force attacks on the password
//!
//! We do NOT defend against:
//! - Compromised OS / keylogger
//! - Access to an unlocked process or its memory
//! - Copies of key bytes the allocator made before they were zeroized

pub mod cipher;
pub mod envelope;
pub mod kdf;
pub mod password;

pub use cipher::{CipherService, XChaCha20Poly1305Cipher};
pub use envelope::Envelope;
pub use kdf::{
    derive_key, derive_key_detached, generate_salt, join_derivation, KdfAlgorithm, KdfParams,
    MasterKey,
};
pub use password::validate_password;

use crate::error::{Result, VaultError};

/// Fill `buf` from the operating system RNG.
pub(crate) fn fill_random(buf: &mut [u8]) -> Result<()> {
    getrandom::getrandom(buf).map_err(|e| VaultError::Io {
        source: std::io::Error::other(format!("System RNG unavailable: {}", e)),
    })
}
