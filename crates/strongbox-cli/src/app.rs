//! Shared command context: config resolution, vault opening and unlocking.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use zeroize::Zeroizing;

use strongbox_core::storage::SqliteStore;
use strongbox_core::{VaultConfig, VaultService};

use crate::cli::Cli;
use crate::config::{default_config_path, default_vault_path, read_config, StrongboxConfig};
use crate::password::read_password;
use crate::ui::Spinner;

pub struct AppContext<'a> {
    cli: &'a Cli,
    config_path: PathBuf,
    config: Option<StrongboxConfig>,
}

impl<'a> AppContext<'a> {
    pub fn new(cli: &'a Cli) -> anyhow::Result<Self> {
        let config_path = match cli.config.clone() {
            Some(path) => path,
            None => default_config_path()?,
        };
        let config = if config_path.exists() {
            Some(read_config(&config_path)?)
        } else if cli.config.is_some() {
            return Err(anyhow::anyhow!(
                "Config file not found: {}",
                config_path.display()
            ));
        } else {
            None
        };
        debug!(path = %config_path.display(), loaded = config.is_some(), "config resolved");

        Ok(Self {
            cli,
            config_path,
            config,
        })
    }

    pub fn quiet(&self) -> bool {
        self.cli.quiet
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn has_config(&self) -> bool {
        self.config.is_some()
    }

    /// Vault path from `--vault`, then the config file, then the XDG default.
    pub fn vault_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = self.cli.vault.clone() {
            return Ok(path);
        }
        if let Some(path) = self
            .config
            .as_ref()
            .and_then(|config| config.vault.path.as_ref())
        {
            return Ok(PathBuf::from(path));
        }
        default_vault_path()
    }

    pub fn vault_config(&self) -> VaultConfig {
        self.config
            .as_ref()
            .map(StrongboxConfig::vault_config)
            .unwrap_or_default()
    }

    /// Open (creating if needed) the vault store without unlocking it.
    pub fn open_store(&self) -> anyhow::Result<VaultService> {
        self.open_store_at(&self.vault_path()?)
    }

    pub fn open_store_at(&self, path: &Path) -> anyhow::Result<VaultService> {
        let store = SqliteStore::open(path)?;
        Ok(VaultService::open(Arc::new(store), self.vault_config()))
    }

    /// Open an existing vault; fails with a hint when none exists.
    pub fn open_existing(&self) -> anyhow::Result<VaultService> {
        let path = self.vault_path()?;
        if !path.exists() {
            return Err(anyhow::anyhow!(missing_vault_message(&path)));
        }
        let vault = self.open_store()?;
        if !vault.is_initialized()? {
            return Err(anyhow::anyhow!(missing_vault_message(&path)));
        }
        Ok(vault)
    }

    /// Open an existing vault and unlock it with the master password.
    pub fn open_unlocked(&self) -> anyhow::Result<VaultService> {
        let vault = self.open_existing()?;
        let password = read_password()?;
        self.unlock(&vault, &password)?;
        Ok(vault)
    }

    /// Unlock on a worker thread while a spinner runs.
    pub fn unlock(&self, vault: &VaultService, password: &SecretString) -> anyhow::Result<()> {
        let handle = vault
            .manager()
            .unlock_detached(Zeroizing::new(password.expose_secret().to_string()));

        let mut spinner = Spinner::new("Unlocking vault", self.quiet());
        while !handle.is_finished() {
            spinner.tick();
            std::thread::sleep(Duration::from_millis(80));
        }
        spinner.finish();

        handle
            .join()
            .map_err(|_| anyhow::anyhow!("Unlock worker panicked"))??;
        Ok(())
    }
}

/// Error message when no vault exists at `path`.
pub fn missing_vault_message(path: &Path) -> String {
    format!(
        "No vault found at {}\n\nRun:\n  strongbox init\n\nOr specify a vault path:\n  STRONGBOX_VAULT=/path/to/vault.db strongbox init",
        path.display()
    )
}
