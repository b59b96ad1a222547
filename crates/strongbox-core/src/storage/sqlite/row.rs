//! Row types for database queries.

use crate::crypto::{Envelope, KdfParams};
use crate::error::{Result, VaultError};
use crate::storage::types::{Record, RecordId, VaultMetadata};

/// Raw row data from the records table, before parsing into domain types.
#[derive(Debug)]
pub struct RecordRow {
    pub id: String,
    pub category: String,
    pub algorithm: String,
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub last_modified: i64,
}

impl RecordRow {
    pub const COLUMNS: &'static str = "id, category, algorithm, nonce, ciphertext, last_modified";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            category: row.get(1)?,
            algorithm: row.get(2)?,
            nonce: row.get(3)?,
            ciphertext: row.get(4)?,
            last_modified: row.get(5)?,
        })
    }
}

impl TryFrom<RecordRow> for Record {
    type Error = VaultError;

    fn try_from(row: RecordRow) -> Result<Self> {
        let id = RecordId::new(row.id)
            .map_err(|e| VaultError::Storage(format!("Invalid record id: {}", e)))?;
        let category = row
            .category
            .parse()
            .map_err(|e| VaultError::Storage(format!("Invalid category: {}", e)))?;

        Ok(Record {
            id,
            category,
            envelope: Envelope::new(row.algorithm, row.nonce, row.ciphertext),
            last_modified: row.last_modified,
        })
    }
}

/// Raw row data from the vault_meta table.
#[derive(Debug)]
pub struct MetadataRow {
    pub format_version: u32,
    pub salt: Vec<u8>,
    pub kdf_json: String,
    pub check_algorithm: String,
    pub check_nonce: Vec<u8>,
    pub check_ciphertext: Vec<u8>,
    pub created_at: i64,
}

impl MetadataRow {
    pub const COLUMNS: &'static str =
        "format_version, salt, kdf_json, check_algorithm, check_nonce, check_ciphertext, created_at";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            format_version: row.get(0)?,
            salt: row.get(1)?,
            kdf_json: row.get(2)?,
            check_algorithm: row.get(3)?,
            check_nonce: row.get(4)?,
            check_ciphertext: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl TryFrom<MetadataRow> for VaultMetadata {
    type Error = VaultError;

    fn try_from(row: MetadataRow) -> Result<Self> {
        let kdf: KdfParams = serde_json::from_str(&row.kdf_json)
            .map_err(|e| VaultError::Storage(format!("Invalid KDF params JSON: {}", e)))?;

        Ok(VaultMetadata {
            format_version: row.format_version,
            salt: row.salt,
            kdf,
            key_check: Envelope::new(row.check_algorithm, row.check_nonce, row.check_ciphertext),
            created_at: row.created_at,
        })
    }
}
