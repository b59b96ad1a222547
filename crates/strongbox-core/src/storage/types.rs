//! Core data types for the storage layer.
//!
//! Everything here is safe to hand to an untrusted datastore: records carry
//! only envelopes plus non-secret identity and timestamps.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::crypto::{Envelope, KdfParams};
use crate::encoding::base64_bytes;
use crate::error::{Result, VaultError};

/// Current on-disk and bundle format version.
pub const FORMAT_VERSION: u32 = 1;

const MAX_ID_BYTES: usize = 128;
const MAX_CATEGORY_BYTES: usize = 64;

/// Record category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Password,
    Subscription,
    Note,
    Expense,
    /// Consumer-defined category (lowercase `[a-z0-9_-]`)
    Custom(String),
}

impl Category {
    /// Built-in categories, in display order.
    pub const BUILT_IN: [Category; 4] = [
        Category::Password,
        Category::Subscription,
        Category::Note,
        Category::Expense,
    ];

    /// Stored name of this category.
    pub fn as_str(&self) -> &str {
        match self {
            Category::Password => "password",
            Category::Subscription => "subscription",
            Category::Note => "note",
            Category::Expense => "expense",
            Category::Custom(name) => name,
        }
    }

    /// Create a custom category, validating its name.
    pub fn custom(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.len() > MAX_CATEGORY_BYTES {
            return Err(VaultError::InvalidParams(format!(
                "Category name must be 1-{} bytes",
                MAX_CATEGORY_BYTES
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(VaultError::InvalidParams(format!(
                "Category name contains invalid characters: {}",
                name
            )));
        }
        if Self::BUILT_IN.iter().any(|c| c.as_str() == name) {
            return Err(VaultError::InvalidParams(format!(
                "Category name is reserved: {}",
                name
            )));
        }
        Ok(Category::Custom(name))
    }
}

impl FromStr for Category {
    type Err = VaultError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "password" => Ok(Category::Password),
            "subscription" => Ok(Category::Subscription),
            "note" => Ok(Category::Note),
            "expense" => Ok(Category::Expense),
            other => Category::custom(other),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// Opaque record identifier, unique within its category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    /// Wrap an existing identifier.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() || value.len() > MAX_ID_BYTES {
            return Err(VaultError::InvalidParams(format!(
                "Record id must be 1-{} bytes",
                MAX_ID_BYTES
            )));
        }
        // NUL separates category from id in associated data.
        if value.contains('\0') {
            return Err(VaultError::InvalidParams(
                "Record id cannot contain NUL".to_string(),
            ));
        }
        Ok(Self(value))
    }

    /// Fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RecordId {
    type Error = VaultError;

    fn try_from(value: String) -> Result<Self> {
        RecordId::new(value)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One encrypted record as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub category: Category,
    pub envelope: Envelope,
    /// Unix milliseconds
    pub last_modified: i64,
}

impl Record {
    /// Associated data binding an envelope to its record identity.
    pub fn associated_data(category: &Category, id: &RecordId) -> Vec<u8> {
        let mut aad = Vec::with_capacity(category.as_str().len() + 1 + id.as_str().len());
        aad.extend_from_slice(category.as_str().as_bytes());
        aad.push(0);
        aad.extend_from_slice(id.as_str().as_bytes());
        aad
    }

    /// Associated data for this record.
    pub fn aad(&self) -> Vec<u8> {
        Self::associated_data(&self.category, &self.id)
    }
}

/// Listing order: newest first, then by id, then by category name.
pub(crate) fn list_order(a: &Record, b: &Record) -> Ordering {
    b.last_modified
        .cmp(&a.last_modified)
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| a.category.as_str().cmp(b.category.as_str()))
}

/// Non-secret bootstrap record for a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultMetadata {
    pub format_version: u32,

    /// Per-vault random salt
    #[serde(with = "base64_bytes")]
    pub salt: Vec<u8>,

    pub kdf: KdfParams,

    /// Encryption of a known constant; decrypting it proves the password
    pub key_check: Envelope,

    /// Unix milliseconds
    pub created_at: i64,
}

/// Writes committed together or not at all.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    /// Metadata to store alongside the records
    pub metadata: Option<VaultMetadata>,

    /// Remove every existing record before writing `records`
    pub replace_records: bool,

    /// Records to upsert
    pub records: Vec<Record>,
}

/// Current wall-clock time in unix milliseconds.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip_names() {
        for category in Category::BUILT_IN {
            let parsed: Category = category.as_str().parse().unwrap();
            assert_eq!(parsed, category);
        }
        let custom: Category = "income".parse().unwrap();
        assert_eq!(custom, Category::Custom("income".to_string()));
    }

    #[test]
    fn test_custom_category_validation() {
        assert!(Category::custom("").is_err());
        assert!(Category::custom("Has Caps").is_err());
        assert!(Category::custom("note").is_err());
        assert!(Category::custom("x".repeat(65)).is_err());
        assert!(Category::custom("bank-cards_2").is_ok());
    }

    #[test]
    fn test_category_serializes_as_string() {
        let json = serde_json::to_string(&Category::Expense).unwrap();
        assert_eq!(json, "\"expense\"");
        let back: Category = serde_json::from_str("\"subscription\"").unwrap();
        assert_eq!(back, Category::Subscription);
        assert!(serde_json::from_str::<Category>("\"BAD\"").is_err());
    }

    #[test]
    fn test_record_id_validation() {
        assert!(RecordId::new("").is_err());
        assert!(RecordId::new("a\0b").is_err());
        assert!(RecordId::new("x".repeat(129)).is_err());
        assert_eq!(RecordId::new("p1").unwrap().as_str(), "p1");
        assert_ne!(RecordId::generate(), RecordId::generate());
    }

    #[test]
    fn test_record_id_deserialize_validates() {
        assert!(serde_json::from_str::<RecordId>("\"\"").is_err());
        let id: RecordId = serde_json::from_str("\"p1\"").unwrap();
        assert_eq!(id.as_str(), "p1");
    }

    #[test]
    fn test_associated_data_distinguishes_category_and_id() {
        let id = RecordId::new("p1").unwrap();
        let a = Record::associated_data(&Category::Password, &id);
        let b = Record::associated_data(&Category::Note, &id);
        assert_ne!(a, b);
        assert_eq!(a, b"password\0p1".to_vec());
    }
}
