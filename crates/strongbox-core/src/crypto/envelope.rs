//! Self-describing ciphertext container.

use serde::{Deserialize, Serialize};

use crate::encoding::base64_bytes;

/// Output of one AEAD encryption.
///
/// The authentication tag is appended to `ciphertext`. Changing any byte of
/// any field makes decryption fail.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Cipher identifier (e.g. `xchacha20poly1305`)
    pub algorithm: String,

    /// Random nonce, unique per encryption under a key
    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,

    /// Ciphertext followed by the authentication tag
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    pub fn new(algorithm: impl Into<String>, nonce: Vec<u8>, ciphertext: Vec<u8>) -> Self {
        Self {
            algorithm: algorithm.into(),
            nonce,
            ciphertext,
        }
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("algorithm", &self.algorithm)
            .field("nonce_len", &self.nonce.len())
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}
