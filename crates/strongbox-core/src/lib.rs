//! # Strongbox Core
//!
//! Core library for Strongbox - a local-first encrypted vault for passwords,
//! notes, subscriptions and expenses.
//!
//! This crate provides key management, authenticated encryption, storage
//! abstractions and typed record access independent of any user interface.
//!
//! ## Architecture
//!
//! - **crypto**: Argon2id key derivation and XChaCha20-Poly1305 envelopes
//! - **storage**: Storage traits with SQLite and in-memory implementations
//! - **keys**: Lock state machine, auto-lock and rekey
//! - **vault**: Typed save/load/list/remove, export and import
//! - **bundle**: Portable JSON snapshots of a vault
//! - **models**: Payload types for the built-in categories
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use strongbox_core::crypto::KdfParams;
//! use strongbox_core::models::NoteEntry;
//! use strongbox_core::storage::{MemoryStore, RecordId};
//! use strongbox_core::{VaultConfig, VaultService};
//!
//! let config = VaultConfig::default().with_kdf(KdfParams::minimum());
//! let vault = VaultService::open(Arc::new(MemoryStore::new()), config);
//! vault.create("correct horse battery").unwrap();
//!
//! let id = RecordId::new("welcome").unwrap();
//! let note = NoteEntry { title: "Hi".into(), body: "Secret".into() };
//! vault.save_item(&id, &note).unwrap();
//!
//! vault.lock();
//! vault.unlock("correct horse battery").unwrap();
//! let loaded: NoteEntry = vault.load_item(&id).unwrap();
//! assert_eq!(loaded, note);
//! ```

pub mod bundle;
pub mod config;
pub mod crypto;
pub mod error;
pub mod fs;
pub mod keys;
pub mod models;
pub mod storage;
pub mod vault;

mod encoding;

pub use bundle::VaultBundle;
pub use config::VaultConfig;
pub use error::{ErrorKind, Result, VaultError};
pub use keys::{KeyManager, LockReason, LockState, VaultEvent};
pub use storage::{Category, RecordId};
pub use vault::{RecordSummary, VaultService};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
