//! Deduction presets and the merge step that feeds the tax calculator.
//!
//! The calculator only sees a flat list of [`DeductionInput`]s. That list is
//! built here from three sources, in order: the statutory allowances every
//! taxpayer receives, the deductions a user has recorded for the year, and
//! any ad hoc deductions supplied for a single calculation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{DeductionInput, TaxDeduction};

/// A preset deduction category with its statutory ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeductionCategory {
    pub id: &'static str,
    pub name: &'static str,
    /// Fixed ceiling in baht.
    max_cap: Option<i64>,
    /// Ceiling as a whole-number percentage of gross income.
    max_percent: Option<i64>,
}

impl DeductionCategory {
    const fn new(
        id: &'static str,
        name: &'static str,
        max_cap: Option<i64>,
        max_percent: Option<i64>,
    ) -> Self {
        Self {
            id,
            name,
            max_cap,
            max_percent,
        }
    }

    pub fn cap_amount(&self) -> Option<Decimal> {
        self.max_cap.map(Decimal::from)
    }

    /// The percentage ceiling as a fraction (30% is `0.30`).
    pub fn cap_percent(&self) -> Option<Decimal> {
        self.max_percent.map(|pct| Decimal::new(pct, 2))
    }
}

/// Thai deduction categories.
pub const DEDUCTION_CATEGORIES: &[DeductionCategory] = &[
    DeductionCategory::new("insurance", "Life Insurance Premium", Some(100_000), None),
    DeductionCategory::new("health_insurance", "Health Insurance Premium", Some(25_000), None),
    DeductionCategory::new(
        "parents_health_insurance",
        "Parents Health Insurance",
        Some(15_000),
        None,
    ),
    DeductionCategory::new("ssf", "SSF (Super Savings Fund)", Some(200_000), None),
    DeductionCategory::new("rmf", "RMF (Retirement Mutual Fund)", None, Some(30)),
    DeductionCategory::new("pvd", "PVD (Provident Fund)", Some(500_000), None),
    DeductionCategory::new("social_security", "Social Security", Some(9_000), None),
    DeductionCategory::new(
        "housing_loan_interest",
        "Housing Loan Interest",
        Some(100_000),
        None,
    ),
    DeductionCategory::new("donation", "Donation", None, Some(10)),
    DeductionCategory::new("education_donation", "Education Donation (2x)", None, Some(10)),
    DeductionCategory::new("easy_e_receipt", "Easy E-Receipt", Some(50_000), None),
    DeductionCategory::new("other", "Other Deductions", None, None),
];

/// Looks up a preset category by id.
pub fn find_category(id: &str) -> Option<&'static DeductionCategory> {
    DEDUCTION_CATEGORIES.iter().find(|category| category.id == id)
}

/// Allowances granted to every taxpayer, independent of recorded deductions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardAllowances {
    pub personal_allowance: Decimal,
    /// Share of gross income deductible as expenses.
    pub expense_deduction_rate: Decimal,
    pub expense_deduction_cap: Decimal,
}

impl Default for StandardAllowances {
    fn default() -> Self {
        Self {
            personal_allowance: Decimal::from(60_000),
            expense_deduction_rate: Decimal::new(50, 2),
            expense_deduction_cap: Decimal::from(100_000),
        }
    }
}

impl StandardAllowances {
    /// The personal allowance and the expense deduction for `gross_income`.
    pub fn deductions(
        &self,
        gross_income: Decimal,
    ) -> Vec<DeductionInput> {
        let rate_pct = (self.expense_deduction_rate * Decimal::ONE_HUNDRED).normalize();

        vec![
            DeductionInput::new("Personal allowance", self.personal_allowance)
                .with_cap_amount(self.personal_allowance),
            DeductionInput::new(
                format!("Expense deduction ({rate_pct}%)"),
                gross_income * self.expense_deduction_rate,
            )
            .with_cap_amount(self.expense_deduction_cap),
        ]
    }
}

impl From<&TaxDeduction> for DeductionInput {
    /// A recorded deduction claims its stated amount, or its fixed cap when
    /// no amount was recorded.
    fn from(stored: &TaxDeduction) -> Self {
        Self {
            name: stored.name.clone(),
            amount: stored
                .amount
                .or(stored.cap_amount)
                .unwrap_or(Decimal::ZERO),
            cap_amount: stored.cap_amount,
            cap_percent: stored.cap_percent,
        }
    }
}

/// Concatenates standard, stored and ad hoc deductions, in that order.
pub fn merge_deductions(
    standard: Vec<DeductionInput>,
    stored: &[TaxDeduction],
    custom: &[DeductionInput],
) -> Vec<DeductionInput> {
    let mut merged = standard;
    merged.reserve(stored.len() + custom.len());
    merged.extend(stored.iter().map(DeductionInput::from));
    merged.extend_from_slice(custom);
    merged
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn stored(
        name: &str,
        amount: Option<Decimal>,
        cap_amount: Option<Decimal>,
    ) -> TaxDeduction {
        TaxDeduction {
            id: 1,
            tax_year: 2025,
            name: name.to_string(),
            category: "other".to_string(),
            amount,
            cap_amount,
            cap_percent: None,
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn finds_known_category() {
        let rmf = find_category("rmf").expect("rmf preset");

        assert_eq!(rmf.cap_amount(), None);
        assert_eq!(rmf.cap_percent(), Some(dec!(0.30)));
    }

    #[test]
    fn unknown_category_is_none() {
        assert!(find_category("lottery").is_none());
    }

    #[test]
    fn category_ids_are_unique() {
        let mut ids: Vec<_> = DEDUCTION_CATEGORIES.iter().map(|c| c.id).collect();
        ids.sort_unstable();
        ids.dedup();

        assert_eq!(ids.len(), DEDUCTION_CATEGORIES.len());
    }

    #[test]
    fn standard_deductions_for_high_income() {
        let deductions = StandardAllowances::default().deductions(dec!(1000000));

        assert_eq!(deductions.len(), 2);
        assert_eq!(deductions[0].name, "Personal allowance");
        assert_eq!(deductions[0].amount, dec!(60000));
        assert_eq!(deductions[0].cap_amount, Some(dec!(60000)));
        assert_eq!(deductions[1].name, "Expense deduction (50%)");
        assert_eq!(deductions[1].amount, dec!(500000));
        assert_eq!(deductions[1].cap_amount, Some(dec!(100000)));
    }

    #[test]
    fn stored_deduction_uses_amount_when_present() {
        let input = DeductionInput::from(&stored("SSF", Some(dec!(80000)), Some(dec!(200000))));

        assert_eq!(input.amount, dec!(80000));
        assert_eq!(input.cap_amount, Some(dec!(200000)));
    }

    #[test]
    fn stored_deduction_falls_back_to_cap() {
        let input = DeductionInput::from(&stored("Social Security", None, Some(dec!(9000))));

        assert_eq!(input.amount, dec!(9000));
    }

    #[test]
    fn stored_deduction_without_amount_or_cap_claims_nothing() {
        let input = DeductionInput::from(&stored("Other", None, None));

        assert_eq!(input.amount, dec!(0));
    }

    #[test]
    fn merge_keeps_source_order() {
        let standard = StandardAllowances::default().deductions(dec!(300000));
        let recorded = vec![stored("Life insurance", Some(dec!(20000)), Some(dec!(100000)))];
        let custom = vec![DeductionInput::new("One-off", dec!(1000))];

        let merged = merge_deductions(standard, &recorded, &custom);

        let names: Vec<_> = merged.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Personal allowance",
                "Expense deduction (50%)",
                "Life insurance",
                "One-off"
            ]
        );
    }
}
