mod app;
mod cli;
mod commands;
mod config;
mod password;
mod ui;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use strongbox_core::VaultError;

use crate::app::AppContext;
use crate::cli::{Cli, Commands};
use crate::commands::{
    handle_add, handle_completions, handle_export, handle_get, handle_import, handle_init,
    handle_list, handle_passwd, handle_remove, handle_reset, handle_status,
};

const LOG_ENV: &str = "STRONGBOX_LOG";

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let command = match cli.command.as_ref() {
        Some(command) => command,
        None => {
            println!("strongbox {}", strongbox_core::VERSION);
            println!("Run `strongbox --help` for usage.");
            return Ok(());
        }
    };

    if let Commands::Completions { shell } = command {
        return handle_completions(*shell);
    }

    let ctx = AppContext::new(cli)?;
    match command {
        Commands::Init(args) => handle_init(&ctx, args),
        Commands::Add(command) => handle_add(&ctx, command),
        Commands::Get(args) => handle_get(&ctx, args),
        Commands::List(args) => handle_list(&ctx, args),
        Commands::Remove(args) => handle_remove(&ctx, args),
        Commands::Export(args) => handle_export(&ctx, args),
        Commands::Import(args) => handle_import(&ctx, args),
        Commands::Passwd => handle_passwd(&ctx),
        Commands::Status(args) => handle_status(&ctx, args),
        Commands::Reset(args) => handle_reset(&ctx, args),
        Commands::Completions { .. } => Ok(()),
    }
}

/// User-facing text for a command failure.
fn error_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<VaultError>() {
        Some(vault_err) => vault_err.user_message(),
        None => format!("{:#}", err),
    }
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        tracing::debug!(error = ?err, "command failed");
        eprintln!("Error: {}", error_message(&err));
        std::process::exit(1);
    }
}
