use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A deduction claimed against gross income, before capping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionInput {
    pub name: String,
    /// Claimed amount.
    pub amount: Decimal,
    /// Fixed ceiling on the applied amount.
    pub cap_amount: Option<Decimal>,
    /// Ceiling expressed as a fraction of gross income (e.g. `0.30`).
    pub cap_percent: Option<Decimal>,
}

impl DeductionInput {
    /// An uncapped deduction.
    pub fn new(
        name: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            name: name.into(),
            amount,
            cap_amount: None,
            cap_percent: None,
        }
    }

    pub fn with_cap_amount(
        mut self,
        cap: Decimal,
    ) -> Self {
        self.cap_amount = Some(cap);
        self
    }

    pub fn with_cap_percent(
        mut self,
        percent: Decimal,
    ) -> Self {
        self.cap_percent = Some(percent);
        self
    }
}

/// A deduction after its caps have been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedDeduction {
    #[serde(flatten)]
    pub input: DeductionInput,
    pub applied_amount: Decimal,
}

/// A deduction the user has recorded for a tax year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxDeduction {
    pub id: i64,
    pub tax_year: i32,
    pub name: String,
    /// Preset category id (see [`crate::calculations::deductions::DEDUCTION_CATEGORIES`]).
    pub category: String,
    pub amount: Option<Decimal>,
    pub cap_amount: Option<Decimal>,
    pub cap_percent: Option<Decimal>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// For recording new deductions (no id or timestamps)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTaxDeduction {
    pub tax_year: i32,
    pub name: String,
    pub category: String,
    pub amount: Option<Decimal>,
    pub cap_amount: Option<Decimal>,
    pub cap_percent: Option<Decimal>,
    pub description: Option<String>,
}
