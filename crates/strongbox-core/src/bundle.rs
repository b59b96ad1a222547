//! Portable vault snapshots.
//!
//! A bundle carries the vault metadata and every envelope exactly as stored,
//! so it is only as readable as the vault itself. Byte fields are base64 so
//! the whole bundle is plain JSON text.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};
use crate::storage::{Record, VaultMetadata, FORMAT_VERSION};

/// Current bundle format.
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// Exported vault: metadata plus envelopes, never plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultBundle {
    pub format_version: u32,
    pub metadata: VaultMetadata,
    pub records: Vec<Record>,
}

impl VaultBundle {
    pub fn new(metadata: VaultMetadata, records: Vec<Record>) -> Self {
        Self {
            format_version: BUNDLE_FORMAT_VERSION,
            metadata,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Structural checks that need no key.
    ///
    /// # Errors
    ///
    /// `InvalidParams` for an unknown format version, an unusable KDF cost,
    /// or duplicate record ids.
    pub fn validate(&self) -> Result<()> {
        if self.format_version != BUNDLE_FORMAT_VERSION {
            return Err(VaultError::InvalidParams(format!(
                "Unsupported bundle format version {}",
                self.format_version
            )));
        }
        if self.metadata.format_version != FORMAT_VERSION {
            return Err(VaultError::InvalidParams(format!(
                "Unsupported vault format version {}",
                self.metadata.format_version
            )));
        }
        self.metadata.kdf.validate()?;

        let mut seen = HashSet::with_capacity(self.records.len());
        for record in &self.records {
            if !seen.insert((&record.category, &record.id)) {
                return Err(VaultError::InvalidParams(format!(
                    "Duplicate record in bundle: {} {}",
                    record.category, record.id
                )));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate a bundle.
    pub fn from_json(json: &str) -> Result<Self> {
        let bundle: Self = serde_json::from_str(json)?;
        bundle.validate()?;
        Ok(bundle)
    }

    /// Write the bundle atomically with owner-only permissions.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        crate::fs::write_atomic(path, self.to_json()?.as_bytes())
    }

    pub fn read_from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Envelope, KdfParams};
    use crate::storage::{Category, RecordId};

    fn sample_bundle() -> VaultBundle {
        let metadata = VaultMetadata {
            format_version: FORMAT_VERSION,
            salt: vec![7u8; 32],
            kdf: KdfParams::default(),
            key_check: Envelope::new("xchacha20poly1305", vec![1u8; 24], vec![2u8; 38]),
            created_at: 1_700_000_000_000,
        };
        let record = Record {
            id: RecordId::new("p1").unwrap(),
            category: Category::Password,
            envelope: Envelope::new("xchacha20poly1305", vec![3u8; 24], vec![4u8; 40]),
            last_modified: 1_700_000_000_500,
        };
        VaultBundle::new(metadata, vec![record])
    }

    #[test]
    fn test_json_round_trip() {
        let bundle = sample_bundle();
        let json = bundle.to_json().unwrap();
        assert_eq!(VaultBundle::from_json(&json).unwrap(), bundle);
    }

    #[test]
    fn test_json_shape() {
        let json = sample_bundle().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["format_version"], 1);
        assert_eq!(value["metadata"]["kdf"]["algorithm"], "argon2id");
        assert_eq!(value["metadata"]["kdf"]["memory_kib"], 65536);
        assert_eq!(value["metadata"]["key_check"]["algorithm"], "xchacha20poly1305");
        assert!(value["metadata"]["salt"].is_string());
        assert_eq!(value["records"][0]["id"], "p1");
        assert_eq!(value["records"][0]["category"], "password");
        assert!(value["records"][0]["envelope"]["nonce"].is_string());
    }

    #[test]
    fn test_unknown_format_version_rejected() {
        let mut bundle = sample_bundle();
        bundle.format_version = 99;
        let json = serde_json::to_string(&bundle).unwrap();
        assert!(matches!(
            VaultBundle::from_json(&json),
            Err(VaultError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut bundle = sample_bundle();
        let copy = bundle.records[0].clone();
        bundle.records.push(copy);
        assert!(matches!(bundle.validate(), Err(VaultError::InvalidParams(_))));
    }

    #[test]
    fn test_same_id_in_other_category_accepted() {
        let mut bundle = sample_bundle();
        let mut copy = bundle.records[0].clone();
        copy.category = Category::Note;
        bundle.records.push(copy);
        assert!(bundle.validate().is_ok());
    }

    #[test]
    fn test_weak_kdf_rejected() {
        let mut bundle = sample_bundle();
        bundle.metadata.kdf = KdfParams::argon2id(1, 1024, 1);
        assert!(matches!(bundle.validate(), Err(VaultError::InvalidParams(_))));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            VaultBundle::from_json("{ not json"),
            Err(VaultError::Serialization { .. })
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");

        let bundle = sample_bundle();
        bundle.write_to_file(&path).unwrap();
        assert_eq!(VaultBundle::read_from_file(&path).unwrap(), bundle);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
