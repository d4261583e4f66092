//! Tax estimation against stored data.
//!
//! Pulls the year's bracket table and recorded deductions from a
//! [`FinanceRepository`], merges them with the standard allowances and any
//! ad hoc deductions, and runs the calculator.

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::calculations::deductions::{StandardAllowances, merge_deductions};
use crate::calculations::thai_tax::{ThaiTaxCalculator, default_th_brackets};
use crate::db::repository::{FinanceRepository, RepositoryError};
use crate::models::{DeductionInput, TaxBracket, TaxResult};

pub struct TaxPlanner<'a, R: ?Sized> {
    repo: &'a R,
    allowances: StandardAllowances,
}

impl<'a, R: FinanceRepository + ?Sized> TaxPlanner<'a, R> {
    pub fn new(
        repo: &'a R,
        allowances: StandardAllowances,
    ) -> Self {
        Self { repo, allowances }
    }

    /// The stored bracket table for `tax_year`, or the built-in Thai table
    /// when none has been loaded.
    pub async fn brackets_for(
        &self,
        tax_year: i32,
    ) -> Result<Vec<TaxBracket>, RepositoryError> {
        let stored = self.repo.get_tax_brackets(tax_year).await?;
        if stored.is_empty() {
            debug!(tax_year, "no stored brackets, using built-in table");
            return Ok(default_th_brackets());
        }
        Ok(stored)
    }

    /// Estimates tax for `gross_income` in `tax_year`.
    pub async fn estimate(
        &self,
        gross_income: Decimal,
        tax_year: i32,
        custom: &[DeductionInput],
    ) -> Result<TaxResult, RepositoryError> {
        let brackets = self.brackets_for(tax_year).await?;
        let stored = self.repo.list_deductions(tax_year).await?;

        let deductions = merge_deductions(self.allowances.deductions(gross_income), &stored, custom);
        let result = ThaiTaxCalculator::new(&brackets).calculate(gross_income, &deductions);

        info!(
            tax_year,
            stored_deductions = stored.len(),
            custom_deductions = custom.len(),
            tax = %result.tax,
            "estimated tax"
        );
        Ok(result)
    }
}
