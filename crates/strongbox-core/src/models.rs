//! Typed payloads for the built-in categories.
//!
//! These are the plaintext shapes serialized into record envelopes. The vault
//! itself stores any `Serialize` value; implementing [`VaultItem`] ties a type
//! to its category for the typed helpers on [`VaultService`](crate::vault::VaultService).

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, VaultError};
use crate::storage::Category;

/// A payload type stored under a fixed category.
pub trait VaultItem: Serialize + DeserializeOwned {
    const CATEGORY: Category;
}

/// Website or service login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct PasswordEntry {
    pub site: String,
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl fmt::Debug for PasswordEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordEntry")
            .field("site", &self.site)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("url", &self.url)
            .field("notes", &self.notes.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl VaultItem for PasswordEntry {
    const CATEGORY: Category = Category::Password;
}

/// Free-form secure note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct NoteEntry {
    pub title: String,
    pub body: String,
}

impl VaultItem for NoteEntry {
    const CATEGORY: Category = Category::Note;
}

/// How often a subscription bills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Weekly => "weekly",
            BillingCycle::Monthly => "monthly",
            BillingCycle::Quarterly => "quarterly",
            BillingCycle::Yearly => "yearly",
        }
    }

    /// Approximate yearly cost of one cycle's `amount_cents`.
    pub fn yearly_cents(&self, amount_cents: i64) -> i64 {
        let per_year = match self {
            BillingCycle::Weekly => 52,
            BillingCycle::Monthly => 12,
            BillingCycle::Quarterly => 4,
            BillingCycle::Yearly => 1,
        };
        amount_cents.saturating_mul(per_year)
    }
}

impl FromStr for BillingCycle {
    type Err = VaultError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(BillingCycle::Weekly),
            "monthly" => Ok(BillingCycle::Monthly),
            "quarterly" => Ok(BillingCycle::Quarterly),
            "yearly" | "annual" | "annually" => Ok(BillingCycle::Yearly),
            other => Err(VaultError::InvalidParams(format!(
                "Unknown billing cycle: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recurring subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionEntry {
    pub name: String,
    pub amount_cents: i64,
    /// ISO 4217 code
    pub currency: String,
    pub billing_cycle: BillingCycle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_due: Option<NaiveDate>,
}

impl VaultItem for SubscriptionEntry {
    const CATEGORY: Category = Category::Subscription;
}

/// One-off expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseEntry {
    pub description: String,
    pub amount_cents: i64,
    /// ISO 4217 code
    pub currency: String,
    pub spent_on: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl VaultItem for ExpenseEntry {
    const CATEGORY: Category = Category::Expense;
}

/// Normalize a three-letter currency code to uppercase.
pub fn normalize_currency(code: &str) -> Result<String> {
    let code = code.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(VaultError::InvalidParams(format!(
            "Currency must be a three-letter code: {}",
            code
        )));
    }
    Ok(code.to_ascii_uppercase())
}

/// Parse an amount such as `12`, `12.5` or `12.34` into cents.
pub fn parse_amount_cents(amount: &str) -> Result<i64> {
    let invalid = || VaultError::InvalidParams(format!("Invalid amount: {}", amount));
    let amount = amount.trim();
    let (negative, digits) = match amount.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, amount),
    };

    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() || fraction.len() > 2 {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }

    let whole: i64 = whole.parse().map_err(|_| invalid())?;
    let fraction: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => fraction.parse().map_err(|_| invalid())?,
    };
    let cents = whole
        .checked_mul(100)
        .and_then(|c| c.checked_add(fraction))
        .ok_or_else(invalid)?;
    Ok(if negative { -cents } else { cents })
}

/// Render cents as `12.34 EUR`.
pub fn format_amount(amount_cents: i64, currency: &str) -> String {
    let sign = if amount_cents < 0 { "-" } else { "" };
    let abs = amount_cents.unsigned_abs();
    format!("{}{}.{:02} {}", sign, abs / 100, abs % 100, currency)
}
