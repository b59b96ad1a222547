use std::io::{IsTerminal, Read};

use chrono::NaiveDate;
use secrecy::ExposeSecret;
use serde_json::{json, Value};

use strongbox_core::models::{
    format_amount, normalize_currency, parse_amount_cents, BillingCycle, ExpenseEntry, NoteEntry,
    PasswordEntry, SubscriptionEntry, VaultItem,
};
use strongbox_core::{Category, RecordId, RecordSummary, VaultService};

use crate::app::AppContext;
use crate::cli::{AddCommand, GetArgs, ListArgs, RecordIdArg, RemoveArgs};
use crate::password::read_entry_password;
use crate::ui::{format_millis, kv, table};

pub fn handle_add(ctx: &AppContext<'_>, command: &AddCommand) -> anyhow::Result<()> {
    let vault = ctx.open_unlocked()?;

    let id = match command {
        AddCommand::Password(args) => {
            let password = match args.password.clone() {
                Some(password) => password,
                None => read_entry_password()?.expose_secret().to_string(),
            };
            let entry = PasswordEntry {
                site: args.site.clone(),
                username: args.username.clone(),
                password,
                url: args.url.clone(),
                notes: args.notes.clone(),
            };
            store_item(&vault, &args.record, &entry)?
        }
        AddCommand::Note(args) => {
            let entry = NoteEntry {
                title: args.title.clone(),
                body: read_note_body(args.body.clone())?,
            };
            store_item(&vault, &args.record, &entry)?
        }
        AddCommand::Subscription(args) => {
            let entry = SubscriptionEntry {
                name: args.name.clone(),
                amount_cents: parse_amount_cents(&args.amount)?,
                currency: normalize_currency(&args.currency)?,
                billing_cycle: args.cycle.parse::<BillingCycle>()?,
                next_due: args.next_due.as_deref().map(parse_date).transpose()?,
            };
            store_item(&vault, &args.record, &entry)?
        }
        AddCommand::Expense(args) => {
            let spent_on = match args.date.as_deref() {
                Some(value) => parse_date(value)?,
                None => chrono::Local::now().date_naive(),
            };
            let entry = ExpenseEntry {
                description: args.description.clone(),
                amount_cents: parse_amount_cents(&args.amount)?,
                currency: normalize_currency(&args.currency)?,
                spent_on,
                tag: args.tag.clone(),
            };
            store_item(&vault, &args.record, &entry)?
        }
    };
    vault.lock();

    if ctx.quiet() {
        println!("{}", id);
    } else {
        println!("Added {}", id);
    }
    Ok(())
}

pub fn handle_get(ctx: &AppContext<'_>, args: &GetArgs) -> anyhow::Result<()> {
    let category: Category = args.category.parse()?;
    let id = RecordId::new(args.id.clone())?;
    let vault = ctx.open_unlocked()?;

    let data: Value = vault.load(&category, &id)?;
    vault.lock();

    if args.json {
        let output = json!({
            "id": &id,
            "category": &category,
            "data": &data,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    kv("ID", id.as_str());
    kv("Category", category.as_str());
    match &category {
        Category::Password => print_password(serde_json::from_value(data)?),
        Category::Note => print_note(serde_json::from_value(data)?),
        Category::Subscription => print_subscription(&serde_json::from_value(data)?),
        Category::Expense => print_expense(&serde_json::from_value(data)?),
        Category::Custom(_) => println!("{}", serde_json::to_string_pretty(&data)?),
    }
    Ok(())
}

pub fn handle_list(ctx: &AppContext<'_>, args: &ListArgs) -> anyhow::Result<()> {
    let category = args
        .category
        .as_deref()
        .map(str::parse::<Category>)
        .transpose()?;

    if !args.decrypt {
        let vault = ctx.open_existing()?;
        let summaries = vault.list_records(category.as_ref())?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        } else if summaries.is_empty() {
            print_empty(ctx);
        } else {
            let rows: Vec<Vec<String>> = summaries.iter().map(summary_row).collect();
            println!("{}", table(&["ID", "CATEGORY", "MODIFIED"], &rows));
        }
        return Ok(());
    }

    let vault = ctx.open_unlocked()?;
    let entries = decrypt_all(&vault, category.as_ref())?;
    vault.lock();

    if args.json {
        let output: Vec<Value> = entries
            .iter()
            .map(|(summary, data)| {
                json!({
                    "id": &summary.id,
                    "category": &summary.category,
                    "last_modified": summary.last_modified,
                    "data": data,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if entries.is_empty() {
        print_empty(ctx);
    } else {
        let rows: Vec<Vec<String>> = entries
            .iter()
            .map(|(summary, data)| {
                let mut row = summary_row(summary);
                row.push(record_label(&summary.category, data));
                row
            })
            .collect();
        println!(
            "{}",
            table(&["ID", "CATEGORY", "MODIFIED", "LABEL"], &rows)
        );
    }
    Ok(())
}

pub fn handle_remove(ctx: &AppContext<'_>, args: &RemoveArgs) -> anyhow::Result<()> {
    let category: Category = args.category.parse()?;
    let id = RecordId::new(args.id.clone())?;
    let vault = ctx.open_unlocked()?;

    vault.remove(&category, &id)?;
    vault.lock();

    if !ctx.quiet() {
        println!("Removed {} {}", category, id);
    }
    Ok(())
}

fn store_item<T: VaultItem>(
    vault: &VaultService,
    record: &RecordIdArg,
    item: &T,
) -> anyhow::Result<RecordId> {
    match record.id.as_deref() {
        Some(value) => {
            let id = RecordId::new(value)?;
            vault.save_item(&id, item)?;
            Ok(id)
        }
        None => Ok(vault.add_item(item)?),
    }
}

fn decrypt_all(
    vault: &VaultService,
    category: Option<&Category>,
) -> anyhow::Result<Vec<(RecordSummary, Value)>> {
    if let Some(category) = category {
        return Ok(vault.list_decrypted(category)?);
    }
    let mut entries = Vec::new();
    for summary in vault.list_all()? {
        let data: Value = vault.load(&summary.category, &summary.id)?;
        entries.push((summary, data));
    }
    Ok(entries)
}

fn parse_date(value: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!("Invalid date (expected YYYY-MM-DD): {}", value))
}

fn read_note_body(body: Option<String>) -> anyhow::Result<String> {
    if let Some(body) = body {
        return Ok(body);
    }
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Err(anyhow::anyhow!(
            "No note body provided. Use --body or pipe the note on stdin."
        ));
    }
    let mut body = String::new();
    stdin
        .lock()
        .read_to_string(&mut body)
        .map_err(|e| anyhow::anyhow!("Failed to read note from stdin: {}", e))?;
    Ok(body.trim_end_matches('\n').to_string())
}

fn summary_row(summary: &RecordSummary) -> Vec<String> {
    vec![
        summary.id.to_string(),
        summary.category.to_string(),
        format_millis(summary.last_modified),
    ]
}

/// Short human label for a decrypted record.
fn record_label(category: &Category, data: &Value) -> String {
    let field = match category {
        Category::Password => "site",
        Category::Note => "title",
        Category::Subscription => "name",
        Category::Expense => "description",
        Category::Custom(_) => return String::new(),
    };
    data.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn print_empty(ctx: &AppContext<'_>) {
    if !ctx.quiet() {
        println!("No records found.");
    }
}

fn print_password(entry: PasswordEntry) {
    kv("Site", &entry.site);
    kv("Username", &entry.username);
    kv("Password", &entry.password);
    if let Some(url) = entry.url.as_deref() {
        kv("URL", url);
    }
    if let Some(notes) = entry.notes.as_deref() {
        kv("Notes", notes);
    }
}

fn print_note(entry: NoteEntry) {
    kv("Title", &entry.title);
    println!();
    println!("{}", entry.body);
}

fn print_subscription(entry: &SubscriptionEntry) {
    kv("Name", &entry.name);
    kv("Amount", &format_amount(entry.amount_cents, &entry.currency));
    kv("Cycle", entry.billing_cycle.as_str());
    kv(
        "Per year",
        &format_amount(
            entry.billing_cycle.yearly_cents(entry.amount_cents),
            &entry.currency,
        ),
    );
    if let Some(next_due) = entry.next_due {
        kv("Next due", &next_due.to_string());
    }
}

fn print_expense(entry: &ExpenseEntry) {
    kv("Description", &entry.description);
    kv("Amount", &format_amount(entry.amount_cents, &entry.currency));
    kv("Date", &entry.spent_on.to_string());
    if let Some(tag) = entry.tag.as_deref() {
        kv("Tag", tag);
    }
}
