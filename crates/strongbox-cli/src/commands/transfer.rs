use secrecy::ExposeSecret;
use tracing::info;

use strongbox_core::VaultBundle;

use crate::app::AppContext;
use crate::cli::{ExportArgs, ImportArgs};
use crate::password::{read_bundle_password, read_password};
use crate::ui::Spinner;

/// Write the vault's metadata and envelopes to a bundle file. No password is
/// needed; the bundle stays encrypted under the current master key.
pub fn handle_export(ctx: &AppContext<'_>, args: &ExportArgs) -> anyhow::Result<()> {
    let vault = ctx.open_existing()?;
    let bundle = vault.export_bundle()?;
    bundle.write_to_file(&args.file)?;
    info!(records = bundle.len(), "bundle written");

    if !ctx.quiet() {
        println!(
            "Exported {} record(s) to {}",
            bundle.len(),
            args.file.display()
        );
    }
    Ok(())
}

/// Replace the local vault with a bundle. An existing vault must be unlocked
/// with its own password first; the bundle password then becomes the master
/// password.
pub fn handle_import(ctx: &AppContext<'_>, args: &ImportArgs) -> anyhow::Result<()> {
    let bundle = VaultBundle::read_from_file(&args.file)?;
    let vault = ctx.open_store()?;

    if vault.is_initialized()? {
        let password = read_password()?;
        ctx.unlock(&vault, &password)?;
    }

    let bundle_password = read_bundle_password()?;
    let mut spinner = Spinner::new("Verifying bundle", ctx.quiet());
    spinner.tick();
    let imported = vault.import_bundle(&bundle, bundle_password.expose_secret());
    spinner.finish();
    vault.lock();
    imported?;

    if !ctx.quiet() {
        println!(
            "Imported {} record(s) from {}",
            bundle.len(),
            args.file.display()
        );
    }
    Ok(())
}
