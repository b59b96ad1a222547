use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use strongbox_core::VERSION;

/// Strongbox - A local-first encrypted vault for passwords, notes and finances
#[derive(Parser)]
#[command(name = "strongbox")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the vault file
    #[arg(short, long, global = true, env = "STRONGBOX_VAULT")]
    pub vault: Option<PathBuf>,

    /// Path to the config file
    #[arg(long, global = true, env = "STRONGBOX_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new encrypted vault
    Init(InitArgs),

    /// Add a record to the vault
    #[command(subcommand)]
    Add(AddCommand),

    /// Show a decrypted record
    Get(GetArgs),

    /// List records
    List(ListArgs),

    /// Delete a record
    Remove(RemoveArgs),

    /// Export the encrypted vault to a bundle file
    Export(ExportArgs),

    /// Replace the vault with the contents of a bundle file
    Import(ImportArgs),

    /// Change the master password
    Passwd,

    /// Show vault status
    Status(StatusArgs),

    /// Permanently delete the vault and all records
    Reset(ResetArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_name = "SHELL")]
        shell: Shell,
    },
}

/// Arguments for the `init` command
#[derive(Args)]
pub struct InitArgs {
    /// Path where the vault will be created
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Do not write a config file
    #[arg(long)]
    pub no_config: bool,
}

/// Record types accepted by `add`
#[derive(Subcommand)]
pub enum AddCommand {
    /// Add a website or service login
    Password(AddPasswordArgs),

    /// Add a secure note
    Note(AddNoteArgs),

    /// Add a recurring subscription
    Subscription(AddSubscriptionArgs),

    /// Add an expense
    Expense(AddExpenseArgs),
}

/// Options shared by every `add` subcommand
#[derive(Args)]
pub struct RecordIdArg {
    /// Record ID (generated when omitted)
    #[arg(long)]
    pub id: Option<String>,
}

#[derive(Args)]
pub struct AddPasswordArgs {
    #[command(flatten)]
    pub record: RecordIdArg,

    /// Site or service name
    #[arg(long)]
    pub site: String,

    /// Account username
    #[arg(long)]
    pub username: String,

    /// Account password (prompted or read from STRONGBOX_ENTRY_PASSWORD when omitted)
    #[arg(long)]
    pub password: Option<String>,

    /// Login URL
    #[arg(long)]
    pub url: Option<String>,

    /// Free-form notes
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args)]
pub struct AddNoteArgs {
    #[command(flatten)]
    pub record: RecordIdArg,

    /// Note title
    #[arg(long)]
    pub title: String,

    /// Note body (read from stdin when omitted)
    #[arg(long)]
    pub body: Option<String>,
}

#[derive(Args)]
pub struct AddSubscriptionArgs {
    #[command(flatten)]
    pub record: RecordIdArg,

    /// Subscription name
    #[arg(long)]
    pub name: String,

    /// Amount per billing cycle (e.g. 12.99)
    #[arg(long)]
    pub amount: String,

    /// Three-letter currency code
    #[arg(long, default_value = "USD")]
    pub currency: String,

    /// Billing cycle (weekly, monthly, quarterly, yearly)
    #[arg(long, default_value = "monthly")]
    pub cycle: String,

    /// Next due date (YYYY-MM-DD)
    #[arg(long)]
    pub next_due: Option<String>,
}

#[derive(Args)]
pub struct AddExpenseArgs {
    #[command(flatten)]
    pub record: RecordIdArg,

    /// What the money was spent on
    #[arg(long)]
    pub description: String,

    /// Amount (e.g. 4.50)
    #[arg(long)]
    pub amount: String,

    /// Three-letter currency code
    #[arg(long, default_value = "USD")]
    pub currency: String,

    /// Date of the expense (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    pub date: Option<String>,

    /// Optional tag
    #[arg(long)]
    pub tag: Option<String>,
}

/// Arguments for the `get` command
#[derive(Args)]
pub struct GetArgs {
    /// Record category (password, note, subscription, expense, or custom)
    #[arg(value_name = "CATEGORY")]
    pub category: String,

    /// Record ID
    #[arg(value_name = "ID")]
    pub id: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `list` command
#[derive(Args)]
pub struct ListArgs {
    /// Filter by category
    #[arg(value_name = "CATEGORY")]
    pub category: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Decrypt and include record contents
    #[arg(long)]
    pub decrypt: bool,
}

/// Arguments for the `remove` command
#[derive(Args)]
pub struct RemoveArgs {
    /// Record category
    #[arg(value_name = "CATEGORY")]
    pub category: String,

    /// Record ID
    #[arg(value_name = "ID")]
    pub id: String,
}

/// Arguments for the `export` command
#[derive(Args)]
pub struct ExportArgs {
    /// Destination bundle file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

/// Arguments for the `import` command
#[derive(Args)]
pub struct ImportArgs {
    /// Bundle file to import
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

/// Arguments for the `status` command
#[derive(Args)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `reset` command
#[derive(Args)]
pub struct ResetArgs {
    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add_password() {
        let cli = Cli::try_parse_from([
            "strongbox",
            "add",
            "password",
            "--site",
            "example.com",
            "--username",
            "alice",
            "--id",
            "p1",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Add(AddCommand::Password(args))) => {
                assert_eq!(args.site, "example.com");
                assert_eq!(args.record.id.as_deref(), Some("p1"));
                assert!(args.password.is_none());
            }
            _ => panic!("expected add password"),
        }
    }

    #[test]
    fn test_global_vault_flag() {
        let cli = Cli::try_parse_from(["strongbox", "list", "--vault", "/tmp/v.db", "note"]).unwrap();
        assert_eq!(cli.vault, Some(PathBuf::from("/tmp/v.db")));
    }
}
