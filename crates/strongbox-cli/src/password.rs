//! Master password input from the environment or an interactive prompt.

use std::io::IsTerminal;

use dialoguer::Password;
use secrecy::SecretString;

pub const PASSWORD_ENV: &str = "STRONGBOX_PASSWORD";
pub const NEW_PASSWORD_ENV: &str = "STRONGBOX_NEW_PASSWORD";
pub const BUNDLE_PASSWORD_ENV: &str = "STRONGBOX_BUNDLE_PASSWORD";
pub const ENTRY_PASSWORD_ENV: &str = "STRONGBOX_ENTRY_PASSWORD";

fn from_env(name: &str) -> Option<SecretString> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(SecretString::from)
}

fn interactive() -> bool {
    std::io::stdin().is_terminal()
}

fn prompt(label: &str, env_name: &str) -> anyhow::Result<SecretString> {
    if !interactive() {
        return Err(anyhow::anyhow!(
            "No password provided and no TTY available. Set {}.",
            env_name
        ));
    }
    Password::new()
        .with_prompt(label)
        .interact()
        .map(SecretString::from)
        .map_err(|e| anyhow::anyhow!("Failed to read password: {}", e))
}

fn prompt_with_confirmation(label: &str, env_name: &str) -> anyhow::Result<SecretString> {
    if !interactive() {
        return Err(anyhow::anyhow!(
            "No password provided and no TTY available. Set {}.",
            env_name
        ));
    }
    Password::new()
        .with_prompt(label)
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()
        .map(SecretString::from)
        .map_err(|e| anyhow::anyhow!("Failed to read password: {}", e))
}

/// Master password for an existing vault.
pub fn read_password() -> anyhow::Result<SecretString> {
    match from_env(PASSWORD_ENV) {
        Some(password) => Ok(password),
        None => prompt("Master password", PASSWORD_ENV),
    }
}

/// Master password for a new vault, confirmed when prompted.
pub fn read_init_password() -> anyhow::Result<SecretString> {
    match from_env(PASSWORD_ENV) {
        Some(password) => Ok(password),
        None => prompt_with_confirmation("New master password", PASSWORD_ENV),
    }
}

/// Replacement master password for `passwd`.
pub fn read_new_password() -> anyhow::Result<SecretString> {
    match from_env(NEW_PASSWORD_ENV) {
        Some(password) => Ok(password),
        None => prompt_with_confirmation("New master password", NEW_PASSWORD_ENV),
    }
}

/// Password protecting an import bundle. Falls back to the master password variable.
pub fn read_bundle_password() -> anyhow::Result<SecretString> {
    if let Some(password) = from_env(BUNDLE_PASSWORD_ENV).or_else(|| from_env(PASSWORD_ENV)) {
        return Ok(password);
    }
    prompt("Bundle password", BUNDLE_PASSWORD_ENV)
}

/// Secret stored in a password record.
pub fn read_entry_password() -> anyhow::Result<SecretString> {
    match from_env(ENTRY_PASSWORD_ENV) {
        Some(password) => Ok(password),
        None => prompt_with_confirmation("Entry password", ENTRY_PASSWORD_ENV),
    }
}
