use secrecy::ExposeSecret;
use tracing::info;

use crate::app::AppContext;
use crate::cli::InitArgs;
use crate::config::{write_config, StrongboxConfig};
use crate::password::read_init_password;
use crate::ui::Spinner;

pub fn handle_init(ctx: &AppContext<'_>, args: &InitArgs) -> anyhow::Result<()> {
    let target = match args.path.clone() {
        Some(path) => path,
        None => ctx.vault_path()?,
    };

    let vault = ctx.open_store_at(&target)?;
    if vault.is_initialized()? {
        return Err(anyhow::anyhow!(
            "A vault already exists at {}",
            target.display()
        ));
    }

    let password = read_init_password()?;
    let mut spinner = Spinner::new("Deriving key", ctx.quiet());
    spinner.tick();
    let created = vault.create(password.expose_secret());
    spinner.finish();
    created?;
    vault.lock();
    info!(path = %target.display(), "vault initialized");

    let wrote_config = if args.no_config || ctx.has_config() {
        false
    } else {
        write_config(ctx.config_path(), &StrongboxConfig::new(&target))?;
        true
    };

    if !ctx.quiet() {
        println!("Initialized new vault at {}", target.display());
        if wrote_config {
            println!("Config written to {}", ctx.config_path().display());
        }
    }
    Ok(())
}
