//! Progressive personal income tax for Thailand.
//!
//! Gross income is reduced by capped deductions and the remainder is taxed
//! band by band: only the slice of taxable income that falls inside a
//! bracket is charged at that bracket's rate.
//!
//! | Taxable income (THB)      | Rate |
//! |---------------------------|------|
//! | 0 – 150,000               | 0%   |
//! | 150,000 – 300,000         | 5%   |
//! | 300,000 – 500,000         | 10%  |
//! | 500,000 – 750,000         | 15%  |
//! | 750,000 – 1,000,000       | 20%  |
//! | 1,000,000 – 2,000,000     | 25%  |
//! | 2,000,000 – 5,000,000     | 30%  |
//! | over 5,000,000            | 35%  |
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use fin_core::DeductionInput;
//! use fin_core::calculations::thai_tax::{ThaiTaxCalculator, default_th_brackets};
//!
//! let brackets = default_th_brackets();
//! let deductions = vec![
//!     DeductionInput::new("Personal allowance", dec!(60000)).with_cap_amount(dec!(60000)),
//!     DeductionInput::new("Expense deduction (50%)", dec!(500000)).with_cap_amount(dec!(100000)),
//! ];
//!
//! let result = ThaiTaxCalculator::new(&brackets).calculate(dec!(1000000), &deductions);
//!
//! assert_eq!(result.total_deductions, dec!(160000));
//! assert_eq!(result.taxable_income, dec!(840000));
//! assert_eq!(result.tax, dec!(83000));
//! ```

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use crate::calculations::common::{max, min_cap, round_half_up};
use crate::models::{AppliedDeduction, DeductionInput, TaxBracket, TaxResult};

/// Problems found by [`validate_bracket_table`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BracketTableError {
    #[error("no tax brackets provided")]
    Empty,

    #[error("first bracket must start at 0, found {0}")]
    FirstBracketNotZero(Decimal),

    #[error("bracket {index} starts at {found}, expected {expected}")]
    NotContiguous {
        index: usize,
        expected: Decimal,
        found: Decimal,
    },

    #[error("bracket {0} is unbounded but is not the last bracket")]
    UnboundedBeforeLast(usize),

    #[error("last bracket must be unbounded")]
    LastBracketBounded,

    #[error("bracket {index} has rate {rate} outside [0, 1]")]
    RateOutOfRange { index: usize, rate: Decimal },
}

/// The Thai personal income tax schedule.
pub fn default_th_brackets() -> Vec<TaxBracket> {
    let band = |min: i64, max: Option<i64>, rate_pct: i64| {
        TaxBracket::new(
            Decimal::from(min),
            max.map(Decimal::from),
            Decimal::new(rate_pct, 2),
        )
    };

    vec![
        band(0, Some(150_000), 0),
        band(150_000, Some(300_000), 5),
        band(300_000, Some(500_000), 10),
        band(500_000, Some(750_000), 15),
        band(750_000, Some(1_000_000), 20),
        band(1_000_000, Some(2_000_000), 25),
        band(2_000_000, Some(5_000_000), 30),
        band(5_000_000, None, 35),
    ]
}

/// Checks that `brackets` is ascending, gap-free, starts at zero and ends
/// with an unbounded bracket.
///
/// The calculator itself does not call this; bracket tables are validated
/// when they are loaded.
pub fn validate_bracket_table(brackets: &[TaxBracket]) -> Result<(), BracketTableError> {
    let first = brackets.first().ok_or(BracketTableError::Empty)?;
    if !first.min_income.is_zero() {
        return Err(BracketTableError::FirstBracketNotZero(first.min_income));
    }

    let last_index = brackets.len() - 1;
    for (index, bracket) in brackets.iter().enumerate() {
        if bracket.tax_rate < Decimal::ZERO || bracket.tax_rate > Decimal::ONE {
            return Err(BracketTableError::RateOutOfRange {
                index,
                rate: bracket.tax_rate,
            });
        }

        match (bracket.max_income, index == last_index) {
            (None, false) => return Err(BracketTableError::UnboundedBeforeLast(index)),
            (Some(_), true) => return Err(BracketTableError::LastBracketBounded),
            (Some(expected), false) => {
                let found = brackets[index + 1].min_income;
                if found != expected {
                    return Err(BracketTableError::NotContiguous {
                        index: index + 1,
                        expected,
                        found,
                    });
                }
            }
            (None, true) => {}
        }
    }

    Ok(())
}

/// Applies a deduction's fixed and percentage caps.
///
/// The applied amount is the claimed amount clipped to both caps, never
/// negative, rounded to two decimal places. A zero `cap_percent` is read as
/// "no percentage cap".
pub fn apply_deduction_cap(
    gross_income: Decimal,
    deduction: &DeductionInput,
) -> AppliedDeduction {
    let percent_cap = deduction
        .cap_percent
        .filter(|percent| !percent.is_zero())
        .map(|percent| gross_income * percent);

    let capped = min_cap(min_cap(deduction.amount, percent_cap), deduction.cap_amount);

    AppliedDeduction {
        input: deduction.clone(),
        applied_amount: round_half_up(max(capped, Decimal::ZERO)),
    }
}

/// Computes tax with an explicit bracket table.
///
/// Shorthand for `ThaiTaxCalculator::new(brackets).calculate(..)`.
pub fn calculate_tax(
    gross_income: Decimal,
    deductions: &[DeductionInput],
    brackets: &[TaxBracket],
) -> TaxResult {
    ThaiTaxCalculator::new(brackets).calculate(gross_income, deductions)
}

/// Calculator bound to one bracket table.
///
/// Brackets should be sorted by `min_income`, contiguous, and end with an
/// unbounded bracket. Malformed tables produce meaningless results rather
/// than errors.
#[derive(Debug, Clone)]
pub struct ThaiTaxCalculator<'a> {
    brackets: &'a [TaxBracket],
}

impl<'a> ThaiTaxCalculator<'a> {
    pub fn new(brackets: &'a [TaxBracket]) -> Self {
        Self { brackets }
    }

    /// Calculates tax owed on `gross_income` after `deductions`.
    pub fn calculate(
        &self,
        gross_income: Decimal,
        deductions: &[DeductionInput],
    ) -> TaxResult {
        let applied: Vec<AppliedDeduction> = deductions
            .iter()
            .map(|deduction| apply_deduction_cap(gross_income, deduction))
            .collect();

        let total_deductions: Decimal = applied.iter().map(|d| d.applied_amount).sum();
        let taxable_income = max(gross_income - total_deductions, Decimal::ZERO);
        let tax = round_half_up(self.bracket_tax(taxable_income));
        let effective_rate = self.effective_rate(tax, gross_income);

        debug!(
            %gross_income,
            %total_deductions,
            %taxable_income,
            %tax,
            "calculated income tax"
        );

        TaxResult {
            taxable_income: round_half_up(taxable_income),
            total_deductions: round_half_up(total_deductions),
            tax,
            effective_rate,
            deductions: applied,
        }
    }

    /// Sums the marginal tax of every bracket the income reaches.
    fn bracket_tax(
        &self,
        taxable_income: Decimal,
    ) -> Decimal {
        self.brackets
            .iter()
            .filter_map(|bracket| {
                let above_floor = max(taxable_income - bracket.min_income, Decimal::ZERO);
                let in_bracket = min_cap(above_floor, bracket.width());
                (in_bracket > Decimal::ZERO).then(|| in_bracket * bracket.tax_rate)
            })
            .sum()
    }

    /// `tax / gross_income` rounded to two decimal places, or zero without income.
    fn effective_rate(
        &self,
        tax: Decimal,
        gross_income: Decimal,
    ) -> Decimal {
        if gross_income > Decimal::ZERO {
            round_half_up(tax / gross_income)
        } else {
            Decimal::ZERO
        }
    }
}
