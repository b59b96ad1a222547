//! Key lifecycle: unlock, lock, auto-lock and rekey.
//!
//! A [`KeyManager`] is the only owner of the vault key. Everything else asks it
//! to encrypt or decrypt on its behalf through [`KeyManager::encrypt_for_storage`]
//! and [`KeyManager::decrypt_from_storage`].
//!
//! ## States
//!
//! ```text
//!   Locked ──unlock──▶ Unlocking ──ok──▶ Unlocked
//!     ▲                   │                 │
//!     │        bad password│                 │ lock / idle
//!     └───────────────────┘◀────────────────┘
//!   LockedError ◀── storage or metadata failure while unlocking
//! ```
//!
//! Key derivation never runs while the state lock is held. Encrypt and decrypt
//! hold the shared side of the state lock, so an in-flight call finishes with
//! the key it started with and calls made after `lock()` fail with
//! `VaultLocked`.

mod auto_lock;
mod clock;
mod events;

pub use auto_lock::AutoLockWatcher;
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{LockReason, SubscriptionId, VaultEvent};

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use auto_lock::AutoLockTimer;
use events::Listeners;

use crate::config::VaultConfig;
use crate::crypto::{
    derive_key, generate_salt, validate_password, CipherService, Envelope, KdfParams, MasterKey,
    XChaCha20Poly1305Cipher,
};
use crate::error::{Result, VaultError};
use crate::storage::types::now_millis;
use crate::storage::{Record, VaultMetadata, VaultStore, WriteBatch, FORMAT_VERSION};

/// Plaintext sealed in every vault's key-check envelope.
const KEY_CHECK_PLAINTEXT: &[u8] = b"strongbox-key-check-v1";

/// Associated data for the key-check envelope.
const KEY_CHECK_AAD: &[u8] = b"strongbox/key-check";

/// Lock state of a [`KeyManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Locked,
    Unlocking,
    Unlocked,
    /// Last unlock failed for a reason other than the password
    LockedError,
}

struct KeyState {
    status: LockState,
    key: Option<MasterKey>,
    /// Bumped whenever the key changes or is dropped. A pending unlock uses it
    /// to detect cancellation; readers use it to detect a concurrent rekey.
    epoch: u64,
}

/// Owns the vault key and its lock state.
pub struct KeyManager {
    store: Arc<dyn VaultStore>,
    cipher: Arc<dyn CipherService>,
    clock: Arc<dyn Clock>,
    config: VaultConfig,
    state: RwLock<KeyState>,
    timer: AutoLockTimer,
    write_gate: RwLock<()>,
    listeners: Listeners,
}

impl KeyManager {
    /// Manager over `store` with the XChaCha20-Poly1305 cipher and the system clock.
    pub fn new(store: Arc<dyn VaultStore>, config: VaultConfig) -> Self {
        Self::with_components(
            store,
            Arc::new(XChaCha20Poly1305Cipher::new()),
            Arc::new(SystemClock),
            config,
        )
    }

    pub fn with_components(
        store: Arc<dyn VaultStore>,
        cipher: Arc<dyn CipherService>,
        clock: Arc<dyn Clock>,
        config: VaultConfig,
    ) -> Self {
        Self {
            store,
            cipher,
            clock,
            timer: AutoLockTimer::new(config.auto_lock),
            config,
            state: RwLock::new(KeyState {
                status: LockState::Locked,
                key: None,
                epoch: 0,
            }),
            write_gate: RwLock::new(()),
            listeners: Listeners::default(),
        }
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &Arc<dyn VaultStore> {
        &self.store
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    /// Current state. An expired deadline locks the vault first.
    pub fn state(&self) -> LockState {
        self.check_idle();
        self.read_state().status
    }

    pub fn is_unlocked(&self) -> bool {
        self.state() == LockState::Unlocked
    }

    pub fn auto_lock_window(&self) -> Duration {
        self.timer.window()
    }

    /// Time left before auto-lock, or `None` when locked or auto-lock is off.
    pub fn remaining_idle(&self) -> Option<Duration> {
        self.timer.remaining(self.clock.now())
    }

    /// Whether a vault exists in the store.
    pub fn is_initialized(&self) -> Result<bool> {
        self.store.exists()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Create a new vault protected by `password` and leave it unlocked.
    ///
    /// # Errors
    ///
    /// - `InvalidParams` if the password fails the strength check
    /// - `AlreadyInitialized` if the store already holds a vault
    pub fn initialize(&self, password: &str) -> Result<()> {
        validate_password(password)?;
        let _gate = self.exclusive_writes();

        if self.read_state().status == LockState::Unlocking {
            return Err(VaultError::Busy);
        }
        if self.store.exists()? {
            return Err(VaultError::AlreadyInitialized);
        }

        let params = self.config.kdf.clone();
        let salt = generate_salt()?;
        let key = derive_key(password, &salt, &params)?;
        let metadata = VaultMetadata {
            format_version: FORMAT_VERSION,
            salt,
            kdf: params,
            key_check: self.seal_key_check(&key)?,
            created_at: now_millis(),
        };
        self.store.save(&metadata)?;

        self.install_key(&mut self.write_state(), key);
        info!(
            iterations = metadata.kdf.iterations,
            memory_kib = metadata.kdf.memory_kib(),
            "vault initialized"
        );
        self.listeners.emit(&VaultEvent::Unlocked);
        Ok(())
    }

    /// Derive the key from `password` and unlock.
    ///
    /// Calling this while already unlocked re-verifies the password and
    /// resets the idle timer.
    ///
    /// # Errors
    ///
    /// - `InvalidCredentials` if the password does not open the vault
    /// - `Busy` if another unlock is in progress
    /// - `NotFound` if the vault has not been initialized
    /// - `VaultLocked` if `lock()` cancelled this attempt
    pub fn unlock(&self, password: &str) -> Result<()> {
        let epoch = {
            let mut state = self.write_state();
            match state.status {
                LockState::Unlocking => return Err(VaultError::Busy),
                LockState::Unlocked => None,
                LockState::Locked | LockState::LockedError => {
                    state.status = LockState::Unlocking;
                    Some(state.epoch)
                }
            }
        };

        let Some(epoch) = epoch else {
            self.verify_password(password)?;
            self.touch();
            return Ok(());
        };

        let outcome = self.load_and_verify(password);

        let result = {
            let mut state = self.write_state();
            if state.status != LockState::Unlocking || state.epoch != epoch {
                debug!("unlock cancelled by a concurrent lock");
                match outcome {
                    Ok(_) => Err(VaultError::VaultLocked),
                    Err(e) => Err(e),
                }
            } else {
                match outcome {
                    Ok(key) => {
                        state.key = Some(key);
                        state.status = LockState::Unlocked;
                        self.timer.arm(self.clock.now());
                        Ok(())
                    }
                    Err(VaultError::InvalidCredentials) => {
                        state.status = LockState::Locked;
                        Err(VaultError::InvalidCredentials)
                    }
                    Err(e) => {
                        state.status = LockState::LockedError;
                        Err(e)
                    }
                }
            }
        };

        match &result {
            Ok(()) => {
                info!("vault unlocked");
                self.listeners.emit(&VaultEvent::Unlocked);
            }
            Err(VaultError::InvalidCredentials) => warn!("unlock rejected: key check failed"),
            Err(e) => warn!(error = %e, "unlock failed"),
        }
        result
    }

    /// Run [`unlock`](Self::unlock) on its own thread.
    pub fn unlock_detached(self: &Arc<Self>, password: Zeroizing<String>) -> JoinHandle<Result<()>> {
        let manager = Arc::clone(self);
        std::thread::spawn(move || manager.unlock(&password))
    }

    /// Discard the key. Idempotent.
    pub fn lock(&self) {
        self.lock_with(LockReason::Explicit);
    }

    /// Record activity, pushing the auto-lock deadline out.
    pub fn touch(&self) {
        if self.read_state().status == LockState::Unlocked {
            self.timer.touch(self.clock.now());
        }
    }

    /// Lock if the idle deadline has passed. Returns whether it locked.
    pub fn check_idle(&self) -> bool {
        if self.timer.is_expired(self.clock.now()) {
            self.lock_with(LockReason::Idle)
        } else {
            false
        }
    }

    /// Poll [`check_idle`](Self::check_idle) every `poll` on a background thread.
    ///
    /// The watcher holds only a weak reference and exits when the returned
    /// handle is dropped or the manager goes away.
    pub fn spawn_auto_lock_watcher(self: &Arc<Self>, poll: Duration) -> Result<AutoLockWatcher> {
        AutoLockWatcher::spawn(Arc::downgrade(self), poll)
    }

    fn lock_with(&self, reason: LockReason) -> bool {
        let was_unlocked = {
            let mut state = self.write_state();
            let was_unlocked = state.status == LockState::Unlocked;
            state.key = None;
            state.status = LockState::Locked;
            state.epoch = state.epoch.wrapping_add(1);
            self.timer.disarm();
            was_unlocked
        };

        if was_unlocked {
            info!(reason = ?reason, "vault locked");
            self.listeners.emit(&VaultEvent::Locked { reason });
        }
        was_unlocked
    }

    // ------------------------------------------------------------------
    // Key use
    // ------------------------------------------------------------------

    /// Encrypt with the vault key.
    ///
    /// # Errors
    ///
    /// `VaultLocked` when locked or when the idle deadline has passed.
    pub fn encrypt_for_storage(&self, plaintext: &[u8], aad: &[u8]) -> Result<Envelope> {
        self.with_key(|key| self.cipher.encrypt(plaintext, key, aad))
    }

    /// Decrypt with the vault key.
    ///
    /// # Errors
    ///
    /// - `VaultLocked` when locked or when the idle deadline has passed
    /// - `AuthenticationFailed` for any tampering, wrong key or wrong `aad`
    pub fn decrypt_from_storage(
        &self,
        envelope: &Envelope,
        aad: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>> {
        self.with_key(|key| self.cipher.decrypt(envelope, key, aad))
    }

    fn with_key<R>(&self, op: impl FnOnce(&MasterKey) -> Result<R>) -> Result<R> {
        if self.check_idle() {
            return Err(VaultError::VaultLocked);
        }

        let result = {
            let state = self.read_state();
            let key = match (state.status, state.key.as_ref()) {
                (LockState::Unlocked, Some(key)) => key,
                _ => return Err(VaultError::VaultLocked),
            };
            op(key)
        };

        if result.is_ok() {
            self.timer.touch(self.clock.now());
        }
        result
    }

    // ------------------------------------------------------------------
    // Rekey
    // ------------------------------------------------------------------

    /// Re-encrypt the vault under `new_password` using the configured KDF cost.
    pub fn rekey(&self, new_password: &str) -> Result<()> {
        self.rekey_with_params(new_password, self.config.kdf.clone())
    }

    /// Re-encrypt the vault under `new_password` and a fresh salt.
    ///
    /// Every record and the new metadata are committed in one batch. On any
    /// failure the store and the in-memory key are left as they were.
    ///
    /// # Errors
    ///
    /// - `VaultLocked` if the vault is not unlocked
    /// - `InvalidParams` if the new password or params are rejected up front
    /// - `RekeyAborted` if re-encryption or the commit fails
    pub fn rekey_with_params(&self, new_password: &str, params: KdfParams) -> Result<()> {
        let _gate = self.exclusive_writes();

        if !self.is_unlocked() {
            return Err(VaultError::VaultLocked);
        }
        validate_password(new_password)?;
        params.validate()?;

        let (new_key, batch) = self
            .stage_rekey(new_password, params)
            .map_err(rekey_aborted)?;

        // Commit and swap under the state lock so no reader pairs a new
        // envelope with the old key.
        let swapped = {
            let mut state = self.write_state();
            self.store.apply_batch(&batch).map_err(rekey_aborted)?;
            if state.status == LockState::Unlocked {
                state.key = Some(new_key);
                state.epoch = state.epoch.wrapping_add(1);
                true
            } else {
                false
            }
        };
        if swapped {
            self.touch();
        } else {
            debug!("vault locked during rekey; new key discarded");
        }

        info!(records = batch.records.len(), "vault rekeyed");
        self.listeners.emit(&VaultEvent::Rekeyed);
        Ok(())
    }

    /// Verify `old_password`, then [`rekey`](Self::rekey) to `new_password`.
    pub fn change_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        if !self.is_unlocked() {
            return Err(VaultError::VaultLocked);
        }
        self.verify_password(old_password)?;
        self.rekey(new_password)
    }

    /// Delete the vault and every record, then lock.
    ///
    /// # Errors
    ///
    /// `VaultLocked` if the vault is not unlocked.
    pub fn destroy(&self) -> Result<()> {
        let _gate = self.exclusive_writes();
        if !self.is_unlocked() {
            return Err(VaultError::VaultLocked);
        }
        self.store.wipe()?;
        warn!("vault destroyed");
        self.lock();
        Ok(())
    }

    fn stage_rekey(&self, new_password: &str, params: KdfParams) -> Result<(MasterKey, WriteBatch)> {
        let current = self.store.load()?;
        let salt = generate_salt()?;
        let new_key = derive_key(new_password, &salt, &params)?;
        let key_check = self.seal_key_check(&new_key)?;

        let records = self.store.list_all()?;
        let reencrypted = self.with_key(|old_key| {
            records
                .into_iter()
                .map(|record| {
                    let aad = record.aad();
                    let plaintext = self.cipher.decrypt(&record.envelope, old_key, &aad)?;
                    let envelope = self.cipher.encrypt(&plaintext, &new_key, &aad)?;
                    Ok(Record { envelope, ..record })
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let metadata = VaultMetadata {
            format_version: FORMAT_VERSION,
            salt,
            kdf: params,
            key_check,
            created_at: current.created_at,
        };
        let batch = WriteBatch {
            metadata: Some(metadata),
            replace_records: false,
            records: reencrypted,
        };
        Ok((new_key, batch))
    }

    // ------------------------------------------------------------------
    // Import
    // ------------------------------------------------------------------

    /// Replace the local vault with `metadata` and `records`, then adopt the
    /// key `password` derives for them.
    pub(crate) fn import(
        &self,
        metadata: &VaultMetadata,
        records: &[Record],
        password: &str,
    ) -> Result<()> {
        let _gate = self.exclusive_writes();

        let status = self.state();
        if status == LockState::Unlocking {
            return Err(VaultError::Busy);
        }
        if status != LockState::Unlocked && self.store.exists()? {
            return Err(VaultError::VaultLocked);
        }

        if password.is_empty() {
            return Err(VaultError::ImportAuthenticationFailed);
        }
        let key = derive_key(password, &metadata.salt, &metadata.kdf)?;
        if !self.key_check_passes(metadata, &key) {
            warn!("import rejected: key check failed");
            return Err(VaultError::ImportAuthenticationFailed);
        }
        for record in records {
            self.cipher
                .decrypt(&record.envelope, &key, &record.aad())
                .map_err(|_| VaultError::AuthenticationFailed)?;
        }

        {
            let mut state = self.write_state();
            self.store.apply_batch(&WriteBatch {
                metadata: Some(metadata.clone()),
                replace_records: true,
                records: records.to_vec(),
            })?;
            self.install_key(&mut state, key);
        }
        info!(records = records.len(), "vault imported");
        self.listeners.emit(&VaultEvent::Imported);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Register a listener. Listeners run on the thread that caused the event,
    /// after internal locks are released.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&VaultEvent) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    // ------------------------------------------------------------------
    // Write gate
    // ------------------------------------------------------------------

    /// Held by single-record writes; excludes rekey and import.
    pub(crate) fn shared_writes(&self) -> RwLockReadGuard<'_, ()> {
        self.write_gate.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn exclusive_writes(&self) -> RwLockWriteGuard<'_, ()> {
        self.write_gate.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Changes whenever the in-memory key is replaced or dropped.
    pub(crate) fn key_epoch(&self) -> u64 {
        self.read_state().epoch
    }

    fn read_state(&self) -> RwLockReadGuard<'_, KeyState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, KeyState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn install_key(&self, state: &mut KeyState, key: MasterKey) {
        state.key = Some(key);
        state.status = LockState::Unlocked;
        state.epoch = state.epoch.wrapping_add(1);
        self.timer.arm(self.clock.now());
    }

    fn seal_key_check(&self, key: &MasterKey) -> Result<Envelope> {
        self.cipher.encrypt(KEY_CHECK_PLAINTEXT, key, KEY_CHECK_AAD)
    }

    fn key_check_passes(&self, metadata: &VaultMetadata, key: &MasterKey) -> bool {
        self.cipher
            .decrypt(&metadata.key_check, key, KEY_CHECK_AAD)
            .map(|plaintext| plaintext.as_slice() == KEY_CHECK_PLAINTEXT)
            .unwrap_or(false)
    }

    /// Load metadata and return the key `password` derives, if it passes the key check.
    fn load_and_verify(&self, password: &str) -> Result<MasterKey> {
        let metadata = self.store.load()?;
        if metadata.format_version != FORMAT_VERSION {
            return Err(VaultError::InvalidParams(format!(
                "Unsupported vault format version {}",
                metadata.format_version
            )));
        }
        if password.is_empty() {
            return Err(VaultError::InvalidCredentials);
        }

        let key = derive_key(password, &metadata.salt, &metadata.kdf)?;
        if self.key_check_passes(&metadata, &key) {
            Ok(key)
        } else {
            Err(VaultError::InvalidCredentials)
        }
    }

    fn verify_password(&self, password: &str) -> Result<()> {
        self.load_and_verify(password).map(drop)
    }
}

fn rekey_aborted(error: VaultError) -> VaultError {
    match error {
        VaultError::VaultLocked => VaultError::VaultLocked,
        other => {
            warn!(error = %other, "rekey aborted");
            VaultError::RekeyAborted {
                reason: other.to_string(),
            }
        }
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("state", &self.read_state().status)
            .field("auto_lock", &self.timer.window())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Category, MemoryStore, RecordId, RecordStore};
    use std::sync::Mutex;

    const PASSWORD: &str = "correct horse battery";

    fn fast_config() -> VaultConfig {
        VaultConfig::default()
            .with_auto_lock(Duration::from_secs(60))
            .with_kdf(KdfParams::minimum())
    }

    fn manager_with_clock() -> (Arc<KeyManager>, Arc<ManualClock>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new());
        let manager = KeyManager::with_components(
            store.clone(),
            Arc::new(XChaCha20Poly1305Cipher::new()),
            clock.clone(),
            fast_config(),
        );
        (Arc::new(manager), clock, store)
    }

    fn record_events(manager: &KeyManager) -> Arc<Mutex<Vec<VaultEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        manager.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        events
    }

    #[test]
    fn test_starts_locked() {
        let (manager, _, _) = manager_with_clock();
        assert_eq!(manager.state(), LockState::Locked);
        assert!(!manager.is_unlocked());
        assert!(matches!(
            manager.encrypt_for_storage(b"x", b"aad"),
            Err(VaultError::VaultLocked)
        ));
    }

    #[test]
    fn test_initialize_unlocks_and_rejects_second_init() {
        let (manager, _, _) = manager_with_clock();
        manager.initialize(PASSWORD).unwrap();
        assert!(manager.is_unlocked());
        assert!(manager.is_initialized().unwrap());

        assert!(matches!(
            manager.initialize(PASSWORD),
            Err(VaultError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_initialize_rejects_weak_password() {
        let (manager, _, _) = manager_with_clock();
        assert!(matches!(
            manager.initialize("short"),
            Err(VaultError::InvalidParams(_))
        ));
        assert!(!manager.is_initialized().unwrap());
    }

    #[test]
    fn test_unlock_round_trip() {
        let (manager, _, _) = manager_with_clock();
        manager.initialize(PASSWORD).unwrap();
        let envelope = manager.encrypt_for_storage(b"secret", b"aad").unwrap();

        manager.lock();
        assert_eq!(manager.state(), LockState::Locked);
        assert!(matches!(
            manager.decrypt_from_storage(&envelope, b"aad"),
            Err(VaultError::VaultLocked)
        ));

        manager.unlock(PASSWORD).unwrap();
        let plaintext = manager.decrypt_from_storage(&envelope, b"aad").unwrap();
        assert_eq!(plaintext.as_slice(), b"secret");
    }

    #[test]
    fn test_wrong_password_stays_locked() {
        let (manager, _, _) = manager_with_clock();
        manager.initialize(PASSWORD).unwrap();
        manager.lock();

        assert!(matches!(
            manager.unlock("wrong"),
            Err(VaultError::InvalidCredentials)
        ));
        assert_eq!(manager.state(), LockState::Locked);
        assert!(matches!(
            manager.unlock(""),
            Err(VaultError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_unlock_without_vault_enters_locked_error() {
        let (manager, _, _) = manager_with_clock();
        assert!(matches!(manager.unlock(PASSWORD), Err(VaultError::NotFound(_))));
        assert_eq!(manager.state(), LockState::LockedError);
        assert!(matches!(
            manager.encrypt_for_storage(b"x", b"aad"),
            Err(VaultError::VaultLocked)
        ));
    }

    #[test]
    fn test_unlock_when_unlocked_reverifies() {
        let (manager, clock, _) = manager_with_clock();
        manager.initialize(PASSWORD).unwrap();

        clock.advance(Duration::from_secs(50));
        assert!(matches!(
            manager.unlock("not the password"),
            Err(VaultError::InvalidCredentials)
        ));
        assert!(manager.is_unlocked());

        manager.unlock(PASSWORD).unwrap();
        assert_eq!(manager.remaining_idle(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_lock_is_idempotent_and_emits_once() {
        let (manager, _, _) = manager_with_clock();
        manager.initialize(PASSWORD).unwrap();
        let events = record_events(&manager);

        manager.lock();
        manager.lock();

        assert_eq!(
            *events.lock().unwrap(),
            vec![VaultEvent::Locked {
                reason: LockReason::Explicit
            }]
        );
        assert_eq!(manager.remaining_idle(), None);
    }

    #[test]
    fn test_auto_lock_after_idle_window() {
        let (manager, clock, _) = manager_with_clock();
        manager.initialize(PASSWORD).unwrap();
        let events = record_events(&manager);

        clock.advance(Duration::from_secs(59));
        assert!(!manager.check_idle());
        assert!(manager.is_unlocked());

        clock.advance(Duration::from_secs(1));
        assert!(matches!(
            manager.encrypt_for_storage(b"x", b"aad"),
            Err(VaultError::VaultLocked)
        ));
        assert_eq!(manager.state(), LockState::Locked);
        assert_eq!(
            *events.lock().unwrap(),
            vec![VaultEvent::Locked {
                reason: LockReason::Idle
            }]
        );
    }

    #[test]
    fn test_activity_resets_idle_deadline() {
        let (manager, clock, _) = manager_with_clock();
        manager.initialize(PASSWORD).unwrap();

        clock.advance(Duration::from_secs(40));
        manager.encrypt_for_storage(b"x", b"aad").unwrap();
        clock.advance(Duration::from_secs(40));
        assert!(manager.is_unlocked());

        manager.touch();
        clock.advance(Duration::from_secs(59));
        assert!(manager.is_unlocked());

        clock.advance(Duration::from_secs(1));
        assert!(manager.check_idle());
        assert!(!manager.is_unlocked());
    }

    #[test]
    fn test_zero_window_never_auto_locks() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new());
        let manager = KeyManager::with_components(
            store,
            Arc::new(XChaCha20Poly1305Cipher::new()),
            clock.clone(),
            fast_config().with_auto_lock(Duration::ZERO),
        );
        manager.initialize(PASSWORD).unwrap();

        clock.advance(Duration::from_secs(365 * 24 * 3600));
        assert!(manager.is_unlocked());
        assert_eq!(manager.remaining_idle(), None);
    }

    #[test]
    fn test_watcher_locks_idle_vault() {
        let (manager, clock, _) = manager_with_clock();
        manager.initialize(PASSWORD).unwrap();
        let watcher = manager
            .spawn_auto_lock_watcher(Duration::from_millis(5))
            .unwrap();

        clock.advance(Duration::from_secs(61));
        let mut locked = false;
        for _ in 0..400 {
            if manager.read_state().status == LockState::Locked {
                locked = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        watcher.stop();
        assert!(locked);
    }

    #[test]
    fn test_unlock_detached() {
        let (manager, _, _) = manager_with_clock();
        manager.initialize(PASSWORD).unwrap();
        manager.lock();

        let handle = manager.unlock_detached(Zeroizing::new(PASSWORD.to_string()));
        handle.join().unwrap().unwrap();
        assert!(manager.is_unlocked());
    }

    #[test]
    fn test_rekey_reencrypts_records_and_keeps_timestamps() {
        let (manager, _, store) = manager_with_clock();
        manager.initialize(PASSWORD).unwrap();

        let id = RecordId::new("r1").unwrap();
        let aad = Record::associated_data(&Category::Note, &id);
        let envelope = manager.encrypt_for_storage(b"hello", &aad).unwrap();
        store
            .put(&Record {
                id: id.clone(),
                category: Category::Note,
                envelope: envelope.clone(),
                last_modified: 1234,
            })
            .unwrap();
        let events = record_events(&manager);

        manager.rekey("brand new password").unwrap();

        let rekeyed = store.get(&Category::Note, &id).unwrap();
        assert_eq!(rekeyed.last_modified, 1234);
        assert_ne!(rekeyed.envelope, envelope);
        let plaintext = manager.decrypt_from_storage(&rekeyed.envelope, &aad).unwrap();
        assert_eq!(plaintext.as_slice(), b"hello");
        assert_eq!(*events.lock().unwrap(), vec![VaultEvent::Rekeyed]);

        manager.lock();
        assert!(matches!(
            manager.unlock(PASSWORD),
            Err(VaultError::InvalidCredentials)
        ));
        manager.unlock("brand new password").unwrap();
    }

    #[test]
    fn test_rekey_changes_key_epoch() {
        let (manager, _, _) = manager_with_clock();
        manager.initialize(PASSWORD).unwrap();

        let before = manager.key_epoch();
        manager.rekey("brand new password").unwrap();
        assert_ne!(manager.key_epoch(), before);
        assert!(manager.is_unlocked());
    }

    #[test]
    fn test_rekey_requires_unlocked() {
        let (manager, _, _) = manager_with_clock();
        manager.initialize(PASSWORD).unwrap();
        manager.lock();
        assert!(matches!(
            manager.rekey("brand new password"),
            Err(VaultError::VaultLocked)
        ));
    }

    #[test]
    fn test_change_password_checks_old_password() {
        let (manager, _, _) = manager_with_clock();
        manager.initialize(PASSWORD).unwrap();

        assert!(matches!(
            manager.change_password("not it at all", "brand new password"),
            Err(VaultError::InvalidCredentials)
        ));
        manager
            .change_password(PASSWORD, "brand new password")
            .unwrap();

        manager.lock();
        manager.unlock("brand new password").unwrap();
    }

    #[test]
    fn test_destroy_requires_unlock_and_wipes() {
        let (manager, _, _) = manager_with_clock();
        manager.initialize(PASSWORD).unwrap();
        manager.lock();
        assert!(matches!(manager.destroy(), Err(VaultError::VaultLocked)));

        manager.unlock(PASSWORD).unwrap();
        manager.destroy().unwrap();
        assert!(!manager.is_initialized().unwrap());
        assert_eq!(manager.state(), LockState::Locked);
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let (manager, _, _) = manager_with_clock();
        manager.initialize(PASSWORD).unwrap();
        let debug = format!("{:?}", manager);
        assert!(debug.contains("Unlocked"));
        assert!(!debug.contains("key:"));
    }
}
