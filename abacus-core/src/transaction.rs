//! Transaction types shared across the workspace.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Direction of a ledger entry as the bank reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditDebitIndicator {
    Credit,
    Debit,
}

impl CreditDebitIndicator {
    /// Apply this direction's sign to a non-negative minor-unit amount.
    pub fn signed(self, amount: i64) -> i64 {
        match self {
            CreditDebitIndicator::Credit => amount,
            CreditDebitIndicator::Debit => -amount,
        }
    }

    /// Parse the vendor token, case-insensitively. Unknown tokens yield None.
    pub fn from_vendor(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "credit" => Some(CreditDebitIndicator::Credit),
            "debit" => Some(CreditDebitIndicator::Debit),
            _ => None,
        }
    }
}

/// Vendor transaction subtypes the importer accepts.
///
/// The statement parser drops any entry whose subtype is outside this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionSubtype {
    Payment,
    DebitCard,
    CreditCard,
    StandingOrder,
    DirectDebit,
    Twint,
    Atm,
    Fee,
}

impl TransactionSubtype {
    /// Parse the vendor token, e.g. "DEBIT_CARD". Unknown tokens yield None.
    pub fn from_vendor(token: &str) -> Option<Self> {
        match token {
            "PAYMENT" => Some(TransactionSubtype::Payment),
            "DEBIT_CARD" => Some(TransactionSubtype::DebitCard),
            "CREDIT_CARD" => Some(TransactionSubtype::CreditCard),
            "STANDING_ORDER" => Some(TransactionSubtype::StandingOrder),
            "DIRECT_DEBIT" => Some(TransactionSubtype::DirectDebit),
            "TWINT" => Some(TransactionSubtype::Twint),
            "ATM" => Some(TransactionSubtype::Atm),
            "FEE" => Some(TransactionSubtype::Fee),
            _ => None,
        }
    }
}

/// Spending categories assigned by enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Groceries,
    Dining,
    Transport,
    Shopping,
    Entertainment,
    Health,
    Insurance,
    Utilities,
    Housing,
    Travel,
    Salary,
    Fees,
    Subscriptions,
    Other,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Groceries => "groceries",
            Category::Dining => "dining",
            Category::Transport => "transport",
            Category::Shopping => "shopping",
            Category::Entertainment => "entertainment",
            Category::Health => "health",
            Category::Insurance => "insurance",
            Category::Utilities => "utilities",
            Category::Housing => "housing",
            Category::Travel => "travel",
            Category::Salary => "salary",
            Category::Fees => "fees",
            Category::Subscriptions => "subscriptions",
            Category::Other => "other",
        }
    }
}

/// One bank-ledger line item.
///
/// `id` comes from the statement's native transaction identifier and is
/// stable across re-imports; it is the dedup key. `amount` is minor currency
/// units (cents) and never negative; `signed_amount` is the denormalized
/// signed form and must always equal `credit_debit_indicator.signed(amount)`.
///
/// The enrichment-owned fields (`category`, `display_name`, `domain`,
/// `subscription_id`) start out absent and are overwritten wholesale each
/// time enrichment runs. `transaction_additional_details` is the raw bank
/// description and is immutable once imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub statement_type: String,
    pub account_iban: String,
    pub currency: String,
    pub date: NaiveDate,
    pub transaction_subtype: TransactionSubtype,
    pub transaction_additional_details: String,
    pub amount: i64,
    pub credit_debit_indicator: CreditDebitIndicator,
    pub signed_amount: i64,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub subscription_id: Option<i64>,
}

impl Transaction {
    /// True once a review commit (or enrichment match) has linked this
    /// transaction to a subscription.
    pub fn is_linked(&self) -> bool {
        self.subscription_id.is_some()
    }

    /// The name shown to users: the enriched display name when present,
    /// otherwise the raw bank description.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .unwrap_or(&self.transaction_additional_details)
    }
}
