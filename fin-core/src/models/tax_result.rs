use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::AppliedDeduction;

/// Outcome of a progressive tax calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxResult {
    pub taxable_income: Decimal,
    pub total_deductions: Decimal,
    pub tax: Decimal,
    /// `tax / gross_income`, rounded to two decimal places.
    pub effective_rate: Decimal,
    pub deductions: Vec<AppliedDeduction>,
}
