use std::collections::BTreeMap;
use std::io::IsTerminal;

use dialoguer::Confirm;
use secrecy::ExposeSecret;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::{ResetArgs, StatusArgs};
use crate::password::{read_new_password, read_password};
use crate::ui::{format_millis, kv, Spinner};

pub fn handle_passwd(ctx: &AppContext<'_>) -> anyhow::Result<()> {
    let vault = ctx.open_existing()?;
    let old_password = read_password()?;
    ctx.unlock(&vault, &old_password)?;

    let new_password = read_new_password()?;
    let mut spinner = Spinner::new("Re-encrypting vault", ctx.quiet());
    spinner.tick();
    let changed = vault.change_password(
        old_password.expose_secret(),
        new_password.expose_secret(),
    );
    spinner.finish();
    vault.lock();
    changed?;

    if !ctx.quiet() {
        println!("Master password changed.");
    }
    Ok(())
}

pub fn handle_status(ctx: &AppContext<'_>, args: &StatusArgs) -> anyhow::Result<()> {
    let path = ctx.vault_path()?;
    let vault = if path.exists() {
        Some(ctx.open_store()?)
    } else {
        None
    };
    let initialized = match vault.as_ref() {
        Some(vault) => vault.is_initialized()?,
        None => false,
    };
    let auto_lock = ctx.vault_config().auto_lock;

    let vault = match vault {
        Some(vault) if initialized => vault,
        _ => {
            if args.json {
                let output = json!({
                    "path": path.display().to_string(),
                    "initialized": false,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                kv("Vault", &path.display().to_string());
                kv("Initialized", "no");
            }
            return Ok(());
        }
    };

    let metadata = vault.metadata()?;
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for summary in vault.list_all()? {
        *counts.entry(summary.category.to_string()).or_default() += 1;
    }
    let total: usize = counts.values().sum();

    if args.json {
        let output = json!({
            "path": path.display().to_string(),
            "initialized": true,
            "format_version": metadata.format_version,
            "created_at": metadata.created_at,
            "records": total,
            "categories": counts,
            "kdf": metadata.kdf,
            "auto_lock_seconds": auto_lock.as_secs(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    kv("Vault", &path.display().to_string());
    kv("Initialized", "yes");
    kv("Created", &format_millis(metadata.created_at));
    kv("Format", &metadata.format_version.to_string());
    kv("Records", &total.to_string());
    for (category, count) in &counts {
        kv(&format!("  {}", category), &count.to_string());
    }
    kv(
        "KDF",
        &format!(
            "argon2id (t={}, m={} KiB, p={})",
            metadata.kdf.iterations,
            metadata.kdf.memory_kib(),
            metadata.kdf.parallelism
        ),
    );
    let auto_lock = if auto_lock.is_zero() {
        "disabled".to_string()
    } else {
        format!("{}s", auto_lock.as_secs())
    };
    kv("Auto-lock", &auto_lock);
    Ok(())
}

pub fn handle_reset(ctx: &AppContext<'_>, args: &ResetArgs) -> anyhow::Result<()> {
    let path = ctx.vault_path()?;
    let vault = ctx.open_existing()?;

    if !args.yes {
        if !std::io::stdin().is_terminal() {
            return Err(anyhow::anyhow!(
                "Refusing to delete the vault without confirmation. Pass --yes."
            ));
        }
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Permanently delete every record in {}?",
                path.display()
            ))
            .default(false)
            .interact()
            .map_err(|e| anyhow::anyhow!("Failed to read confirmation: {}", e))?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let password = read_password()?;
    ctx.unlock(&vault, &password)?;
    vault.destroy()?;

    if !ctx.quiet() {
        println!("Vault deleted: {}", path.display());
    }
    Ok(())
}
