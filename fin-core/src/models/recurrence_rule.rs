use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::TransactionKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }
}

/// A transaction template that fires on a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub id: i64,
    pub account_id: i64,
    pub category_id: Option<i64>,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub currency_code: String,
    pub merchant: Option<String>,
    pub note: Option<String>,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    /// Anchor day for monthly rules (1..=31).
    pub day_of_month: Option<u32>,
    /// Anchor weekday for weekly rules, 0 = Sunday .. 6 = Saturday.
    pub day_of_week: Option<u32>,
    pub end_date: Option<NaiveDate>,
    pub next_occurrence: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurrenceRule {
    /// Active and scheduled on or before `today`.
    pub fn is_due(
        &self,
        today: NaiveDate,
    ) -> bool {
        self.is_active && self.next_occurrence <= today
    }

    /// The end date lies strictly before `today`.
    pub fn has_expired(
        &self,
        today: NaiveDate,
    ) -> bool {
        self.end_date.is_some_and(|end| end < today)
    }
}

/// For creating new rules (no id, schedule state or timestamps)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecurrenceRule {
    pub account_id: i64,
    pub category_id: Option<i64>,
    pub kind: TransactionKind,
    pub amount: Decimal,
    /// Falls back to the configured default currency when `None`.
    pub currency_code: Option<String>,
    pub merchant: Option<String>,
    pub note: Option<String>,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub day_of_month: Option<u32>,
    pub day_of_week: Option<u32>,
    pub end_date: Option<NaiveDate>,
}
