//! Authenticated encryption of byte buffers.
//!
//! [`CipherService`] is the only seam between the key and the bytes it
//! protects. The engine ships one implementation, XChaCha20-Poly1305, whose
//! 192-bit nonces are safe to draw at random for every call.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use zeroize::Zeroizing;

use super::envelope::Envelope;
use super::kdf::MasterKey;
use crate::error::{Result, VaultError};

/// Identifier written into every envelope produced by [`XChaCha20Poly1305Cipher`].
pub const XCHACHA20POLY1305: &str = "xchacha20poly1305";

/// XChaCha20 nonce length in bytes.
pub const NONCE_LENGTH: usize = 24;

/// Poly1305 tag length in bytes.
pub const TAG_LENGTH: usize = 16;

/// Authenticated symmetric encryption.
///
/// Implementations must draw a fresh nonce for every `encrypt` and must fail
/// `decrypt` with [`VaultError::AuthenticationFailed`] for every kind of
/// mismatch, without returning partial plaintext.
pub trait CipherService: Send + Sync {
    /// Algorithm tag written into envelopes.
    fn algorithm(&self) -> &'static str;

    /// Encrypt `plaintext`, authenticating `aad` alongside it.
    fn encrypt(&self, plaintext: &[u8], key: &MasterKey, aad: &[u8]) -> Result<Envelope>;

    /// Verify and decrypt an envelope produced with the same key and `aad`.
    fn decrypt(&self, envelope: &Envelope, key: &MasterKey, aad: &[u8])
        -> Result<Zeroizing<Vec<u8>>>;
}

/// XChaCha20-Poly1305 with random nonces.
#[derive(Debug, Default, Clone, Copy)]
pub struct XChaCha20Poly1305Cipher;

impl XChaCha20Poly1305Cipher {
    pub fn new() -> Self {
        Self
    }

    fn cipher(key: &MasterKey) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()))
    }
}

impl CipherService for XChaCha20Poly1305Cipher {
    fn algorithm(&self) -> &'static str {
        XCHACHA20POLY1305
    }

    fn encrypt(&self, plaintext: &[u8], key: &MasterKey, aad: &[u8]) -> Result<Envelope> {
        let mut nonce = [0u8; NONCE_LENGTH];
        super::fill_random(&mut nonce)?;

        let ciphertext = Self::cipher(key)
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| VaultError::InvalidParams("Encryption failed".to_string()))?;

        Ok(Envelope::new(XCHACHA20POLY1305, nonce.to_vec(), ciphertext))
    }

    fn decrypt(
        &self,
        envelope: &Envelope,
        key: &MasterKey,
        aad: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>> {
        if envelope.algorithm != XCHACHA20POLY1305
            || envelope.nonce.len() != NONCE_LENGTH
            || envelope.ciphertext.len() < TAG_LENGTH
        {
            return Err(VaultError::AuthenticationFailed);
        }

        let plaintext = Self::cipher(key)
            .decrypt(
                XNonce::from_slice(&envelope.nonce),
                Payload {
                    msg: &envelope.ciphertext,
                    aad,
                },
            )
            .map_err(|_| VaultError::AuthenticationFailed)?;

        Ok(Zeroizing::new(plaintext))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::crypto::kdf::KEY_LENGTH;

    fn key(fill: u8) -> MasterKey {
        MasterKey::from_bytes([fill; KEY_LENGTH])
    }

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let cipher = XChaCha20Poly1305Cipher::new();
        let key = key(7);
        let plaintext = b"Hello, World! This is secret data.";

        let envelope = cipher.encrypt(plaintext, &key, b"p1").unwrap();
        let decrypted = cipher.decrypt(&envelope, &key, b"p1").unwrap();

        assert_eq!(decrypted.as_slice(), plaintext);
        assert_eq!(envelope.algorithm, XCHACHA20POLY1305);
        assert_eq!(envelope.nonce.len(), NONCE_LENGTH);
        assert_eq!(envelope.ciphertext.len(), plaintext.len() + TAG_LENGTH);
    }

    #[test]
    fn test_empty_plaintext_round_trip() {
        let cipher = XChaCha20Poly1305Cipher::new();
        let key = key(1);
        let envelope = cipher.encrypt(b"", &key, b"").unwrap();
        assert!(cipher.decrypt(&envelope, &key, b"").unwrap().is_empty());
    }

    #[test]
    fn test_wrong_key_fails() {
        let cipher = XChaCha20Poly1305Cipher::new();
        let envelope = cipher.encrypt(b"secret data", &key(1), b"").unwrap();

        let result = cipher.decrypt(&envelope, &key(2), b"");
        assert!(matches!(result, Err(VaultError::AuthenticationFailed)));
    }

    #[test]
    fn test_wrong_aad_fails() {
        let cipher = XChaCha20Poly1305Cipher::new();
        let key = key(3);
        let envelope = cipher.encrypt(b"secret data", &key, b"password\0p1").unwrap();

        let result = cipher.decrypt(&envelope, &key, b"password\0p2");
        assert!(matches!(result, Err(VaultError::AuthenticationFailed)));
    }

    #[test]
    fn test_tampering_fails_uniformly() {
        let cipher = XChaCha20Poly1305Cipher::new();
        let key = key(4);
        let envelope = cipher.encrypt(b"secret data", &key, b"").unwrap();

        let mut flipped = envelope.clone();
        flipped.ciphertext[0] ^= 0x01;
        let mut bad_nonce = envelope.clone();
        bad_nonce.nonce[5] ^= 0x80;
        let mut short_nonce = envelope.clone();
        short_nonce.nonce.truncate(12);
        let mut truncated = envelope.clone();
        truncated.ciphertext.truncate(4);
        let mut foreign = envelope.clone();
        foreign.algorithm = "aes-256-gcm".to_string();

        for tampered in [flipped, bad_nonce, short_nonce, truncated, foreign] {
            let result = cipher.decrypt(&tampered, &key, b"");
            assert!(matches!(result, Err(VaultError::AuthenticationFailed)));
        }
    }

    #[test]
    fn test_same_plaintext_different_ciphertext() {
        let cipher = XChaCha20Poly1305Cipher::new();
        let key = key(5);
        let a = cipher.encrypt(b"same plaintext", &key, b"").unwrap();
        let b = cipher.encrypt(b"same plaintext", &key, b"").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_nonces_unique_over_many_calls() {
        let cipher = XChaCha20Poly1305Cipher::new();
        let key = key(6);
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let envelope = cipher.encrypt(b"x", &key, b"").unwrap();
            assert!(seen.insert(envelope.nonce));
        }
        assert_eq!(seen.len(), 10_000);
    }
}
