//! Typed record access over an encrypted store.
//!
//! [`VaultService`] serializes values with serde, asks the [`KeyManager`] to
//! seal them, and hands the resulting envelopes to the store. It never sees
//! the key itself.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::bundle::VaultBundle;
use crate::config::VaultConfig;
use crate::error::{Result, VaultError};
use crate::keys::{KeyManager, LockState};
use crate::models::VaultItem;
use crate::storage::types::now_millis;
use crate::storage::{Category, Record, RecordId, VaultMetadata, VaultStore};

/// Non-secret view of a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub id: RecordId,
    pub category: Category,
    /// Unix milliseconds
    pub last_modified: i64,
    pub algorithm: String,
}

impl From<&Record> for RecordSummary {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            category: record.category.clone(),
            last_modified: record.last_modified,
            algorithm: record.envelope.algorithm.clone(),
        }
    }
}

/// Encrypted vault with typed CRUD, export and import.
#[derive(Debug, Clone)]
pub struct VaultService {
    manager: Arc<KeyManager>,
}

impl VaultService {
    pub fn new(manager: Arc<KeyManager>) -> Self {
        Self { manager }
    }

    /// Service over `store` with a fresh [`KeyManager`].
    pub fn open(store: Arc<dyn VaultStore>, config: VaultConfig) -> Self {
        Self::new(Arc::new(KeyManager::new(store, config)))
    }

    pub fn manager(&self) -> &Arc<KeyManager> {
        &self.manager
    }

    fn store(&self) -> &Arc<dyn VaultStore> {
        self.manager.store()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Create the vault. See [`KeyManager::initialize`].
    pub fn create(&self, password: &str) -> Result<()> {
        self.manager.initialize(password)
    }

    pub fn unlock(&self, password: &str) -> Result<()> {
        self.manager.unlock(password)
    }

    pub fn lock(&self) {
        self.manager.lock()
    }

    pub fn is_unlocked(&self) -> bool {
        self.manager.is_unlocked()
    }

    pub fn state(&self) -> LockState {
        self.manager.state()
    }

    pub fn is_initialized(&self) -> Result<bool> {
        self.manager.is_initialized()
    }

    /// Non-secret vault metadata (salt, KDF cost, creation time).
    pub fn metadata(&self) -> Result<VaultMetadata> {
        self.store().load()
    }

    pub fn change_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        self.manager.change_password(old_password, new_password)
    }

    /// Delete the vault. See [`KeyManager::destroy`].
    pub fn destroy(&self) -> Result<()> {
        self.manager.destroy()
    }

    // ------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------

    /// Encrypt `value` and store it under `id`, replacing any previous record.
    pub fn save<T>(&self, category: &Category, id: &RecordId, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.ensure_unlocked()?;
        let _gate = self.manager.shared_writes();

        let plaintext = Zeroizing::new(serde_json::to_vec(value)?);
        let envelope = self
            .manager
            .encrypt_for_storage(&plaintext, &Record::associated_data(category, id))?;
        self.store().put(&Record {
            id: id.clone(),
            category: category.clone(),
            envelope,
            last_modified: now_millis(),
        })?;

        debug!(category = %category, "record saved");
        Ok(())
    }

    /// Decrypt and deserialize the record `id` in `category`.
    ///
    /// # Errors
    ///
    /// - `VaultLocked` if the vault is locked
    /// - `NotFound` if no record has this id in this category
    /// - `AuthenticationFailed` if the envelope does not verify
    pub fn load<T: DeserializeOwned>(&self, category: &Category, id: &RecordId) -> Result<T> {
        self.ensure_unlocked()?;
        self.retry_on_rekey(|| {
            let record = self.store().get(category, id)?;
            self.open_record(&record)
        })
    }

    /// Decrypt every record in `category`, newest first.
    pub fn list_decrypted<T: DeserializeOwned>(
        &self,
        category: &Category,
    ) -> Result<Vec<(RecordSummary, T)>> {
        self.ensure_unlocked()?;
        self.retry_on_rekey(|| {
            self.store()
                .list(Some(category))?
                .iter()
                .map(|record| -> Result<(RecordSummary, T)> {
                    Ok((RecordSummary::from(record), self.open_record(record)?))
                })
                .collect()
        })
    }

    /// Delete the record `id` in `category`.
    pub fn remove(&self, category: &Category, id: &RecordId) -> Result<()> {
        self.ensure_unlocked()?;
        let _gate = self.manager.shared_writes();

        self.store().delete(category, id)?;
        debug!(category = %category, "record removed");
        Ok(())
    }

    /// Record metadata without decrypting anything.
    pub fn list_records(&self, category: Option<&Category>) -> Result<Vec<RecordSummary>> {
        Ok(self
            .store()
            .list(category)?
            .iter()
            .map(RecordSummary::from)
            .collect())
    }

    pub fn list_all(&self) -> Result<Vec<RecordSummary>> {
        self.list_records(None)
    }

    // ------------------------------------------------------------------
    // Typed helpers
    // ------------------------------------------------------------------

    pub fn save_item<T: VaultItem>(&self, id: &RecordId, item: &T) -> Result<()> {
        self.save(&T::CATEGORY, id, item)
    }

    /// Save `item` under a newly generated id and return it.
    pub fn add_item<T: VaultItem>(&self, item: &T) -> Result<RecordId> {
        let id = RecordId::generate();
        self.save_item(&id, item)?;
        Ok(id)
    }

    pub fn load_item<T: VaultItem>(&self, id: &RecordId) -> Result<T> {
        self.load(&T::CATEGORY, id)
    }

    pub fn list_items<T: VaultItem>(&self) -> Result<Vec<(RecordSummary, T)>> {
        self.list_decrypted(&T::CATEGORY)
    }

    pub fn remove_item<T: VaultItem>(&self, id: &RecordId) -> Result<()> {
        self.remove(&T::CATEGORY, id)
    }

    // ------------------------------------------------------------------
    // Export / import
    // ------------------------------------------------------------------

    /// Snapshot metadata and envelopes. Works while locked.
    ///
    /// # Errors
    ///
    /// `NotFound` if the vault has not been initialized.
    pub fn export_bundle(&self) -> Result<VaultBundle> {
        let _gate = self.manager.shared_writes();
        let metadata = self.store().load()?;
        let records = self.store().list_all()?;
        info!(records = records.len(), "vault exported");
        Ok(VaultBundle::new(metadata, records))
    }

    /// Replace the local vault with `bundle`, unlocked with `password`.
    ///
    /// Nothing local changes unless every check passes.
    ///
    /// # Errors
    ///
    /// - `InvalidParams` for a malformed bundle
    /// - `VaultLocked` if a local vault exists and is locked
    /// - `ImportAuthenticationFailed` if `password` does not open the bundle
    /// - `AuthenticationFailed` if any bundled record fails to verify
    pub fn import_bundle(&self, bundle: &VaultBundle, password: &str) -> Result<()> {
        bundle.validate()?;
        self.manager
            .import(&bundle.metadata, &bundle.records, password)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn ensure_unlocked(&self) -> Result<()> {
        if self.manager.is_unlocked() {
            Ok(())
        } else {
            Err(VaultError::VaultLocked)
        }
    }

    /// Run a read once more if it failed to verify because a rekey swapped
    /// the key between fetching envelopes and decrypting them.
    fn retry_on_rekey<R>(&self, read: impl Fn() -> Result<R>) -> Result<R> {
        let epoch = self.manager.key_epoch();
        match read() {
            Err(VaultError::AuthenticationFailed) if self.manager.key_epoch() != epoch => {
                debug!("key changed during read; retrying");
                read()
            }
            result => result,
        }
    }

    fn open_record<T: DeserializeOwned>(&self, record: &Record) -> Result<T> {
        let plaintext = self
            .manager
            .decrypt_from_storage(&record.envelope, &record.aad())?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KdfParams;
    use crate::models::{NoteEntry, PasswordEntry};
    use crate::storage::MemoryStore;
    use std::time::Duration;

    const PASSWORD: &str = "correct horse battery";

    fn service() -> VaultService {
        let config = VaultConfig::default()
            .with_auto_lock(Duration::ZERO)
            .with_kdf(KdfParams::minimum());
        let service = VaultService::open(Arc::new(MemoryStore::new()), config);
        service.create(PASSWORD).unwrap();
        service
    }

    fn note(title: &str) -> NoteEntry {
        NoteEntry {
            title: title.to_string(),
            body: format!("{} body", title),
        }
    }

    #[test]
    fn test_save_and_load() {
        let vault = service();
        let id = RecordId::new("n1").unwrap();
        vault.save_item(&id, &note("first")).unwrap();

        let loaded: NoteEntry = vault.load_item(&id).unwrap();
        assert_eq!(loaded, note("first"));
    }

    #[test]
    fn test_save_overwrites() {
        let vault = service();
        let id = RecordId::new("n1").unwrap();
        vault.save_item(&id, &note("first")).unwrap();
        vault.save_item(&id, &note("second")).unwrap();

        assert_eq!(vault.load_item::<NoteEntry>(&id).unwrap(), note("second"));
        assert_eq!(vault.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_category_mismatch_is_not_found() {
        let vault = service();
        let id = RecordId::new("n1").unwrap();
        vault.save_item(&id, &note("first")).unwrap();

        assert!(matches!(
            vault.load_item::<PasswordEntry>(&id),
            Err(VaultError::NotFound(_))
        ));
        assert!(matches!(
            vault.remove(&Category::Password, &id),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn test_same_id_in_two_categories() {
        let vault = service();
        let id = RecordId::new("x").unwrap();
        let login = PasswordEntry {
            site: "example.com".to_string(),
            username: "alice".to_string(),
            password: "pw".to_string(),
            url: None,
            notes: None,
        };
        vault.save_item(&id, &note("shared")).unwrap();
        vault.save_item(&id, &login).unwrap();

        assert_eq!(vault.load_item::<NoteEntry>(&id).unwrap(), note("shared"));
        assert_eq!(vault.load_item::<PasswordEntry>(&id).unwrap(), login);
        assert_eq!(vault.list_all().unwrap().len(), 2);

        vault.remove_item::<NoteEntry>(&id).unwrap();
        assert_eq!(vault.load_item::<PasswordEntry>(&id).unwrap(), login);
        assert_eq!(vault.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_locked_operations_fail() {
        let vault = service();
        let id = RecordId::new("n1").unwrap();
        vault.save_item(&id, &note("first")).unwrap();
        vault.lock();

        assert!(matches!(
            vault.save_item(&id, &note("x")),
            Err(VaultError::VaultLocked)
        ));
        assert!(matches!(
            vault.load_item::<NoteEntry>(&id),
            Err(VaultError::VaultLocked)
        ));
        assert!(matches!(
            vault.list_items::<NoteEntry>(),
            Err(VaultError::VaultLocked)
        ));
        assert!(matches!(
            vault.remove_item::<NoteEntry>(&id),
            Err(VaultError::VaultLocked)
        ));

        // Metadata listing needs no key
        assert_eq!(vault.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_list_decrypted_filters_category() {
        let vault = service();
        vault.add_item(&note("a")).unwrap();
        vault.add_item(&note("b")).unwrap();
        vault
            .add_item(&PasswordEntry {
                site: "example.com".to_string(),
                username: "alice".to_string(),
                password: "pw".to_string(),
                url: None,
                notes: None,
            })
            .unwrap();

        let notes = vault.list_items::<NoteEntry>().unwrap();
        assert_eq!(notes.len(), 2);
        assert!(notes
            .iter()
            .all(|(summary, _)| summary.category == Category::Note));
        assert_eq!(vault.list_records(Some(&Category::Password)).unwrap().len(), 1);
    }

    #[test]
    fn test_remove() {
        let vault = service();
        let id = vault.add_item(&note("gone")).unwrap();
        vault.remove_item::<NoteEntry>(&id).unwrap();

        assert!(matches!(
            vault.load_item::<NoteEntry>(&id),
            Err(VaultError::NotFound(_))
        ));
        assert!(matches!(
            vault.remove_item::<NoteEntry>(&id),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn test_arbitrary_serde_values() {
        let vault = service();
        let category = Category::custom("wifi").unwrap();
        let id = RecordId::new("home").unwrap();
        let value = serde_json::json!({ "ssid": "home", "psk": "hunter22" });

        vault.save(&category, &id, &value).unwrap();
        let loaded: serde_json::Value = vault.load(&category, &id).unwrap();
        assert_eq!(loaded, value);
    }

    #[test]
    fn test_export_requires_vault() {
        let vault = VaultService::open(Arc::new(MemoryStore::new()), VaultConfig::default());
        assert!(matches!(vault.export_bundle(), Err(VaultError::NotFound(_))));
    }

    #[test]
    fn test_export_while_locked() {
        let vault = service();
        vault.add_item(&note("a")).unwrap();
        vault.lock();

        let bundle = vault.export_bundle().unwrap();
        assert_eq!(bundle.len(), 1);
    }
}
