use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Base currency; also the currency of rules created without one.
pub const DEFAULT_CURRENCY: &str = "THB";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub account_id: i64,
    pub category_id: Option<i64>,
    pub kind: TransactionKind,
    pub amount_original: Decimal,
    pub currency_code: String,
    /// Amount converted to the base currency.
    pub amount_base: Decimal,
    pub rate_used: Decimal,
    pub merchant: Option<String>,
    pub note: Option<String>,
    pub occurred_at: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// For recording new transactions (no id or timestamps)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub account_id: i64,
    pub category_id: Option<i64>,
    pub kind: TransactionKind,
    pub amount_original: Decimal,
    pub currency_code: String,
    pub amount_base: Decimal,
    pub rate_used: Decimal,
    pub merchant: Option<String>,
    pub note: Option<String>,
    pub occurred_at: NaiveDate,
}

impl NewTransaction {
    /// A transaction already denominated in the base currency.
    pub fn in_base_currency(
        account_id: i64,
        kind: TransactionKind,
        amount: Decimal,
        currency_code: impl Into<String>,
        occurred_at: NaiveDate,
    ) -> Self {
        Self {
            account_id,
            category_id: None,
            kind,
            amount_original: amount,
            currency_code: currency_code.into(),
            amount_base: amount,
            rate_used: Decimal::ONE,
            merchant: None,
            note: None,
            occurred_at,
        }
    }
}
