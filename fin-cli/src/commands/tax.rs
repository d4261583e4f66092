use std::fmt::Write;

use anyhow::{Context as _, Result};
use fin_core::TaxResult;
use fin_core::calculations::TaxPlanner;
use fin_core::calculations::income::annual_income;
use rust_decimal::Decimal;
use tracing::debug;

use super::Context;
use crate::cli::TaxArgs;
use crate::utils::{format_amount, format_percent};

pub async fn run(
    args: TaxArgs,
    ctx: &Context<'_>,
) -> Result<String> {
    let year = ctx.year_or_current(args.year);

    let gross = match args.income {
        Some(income) => income,
        None => {
            let transactions = ctx
                .repo
                .list_transactions(Some(year))
                .await
                .context("reading recorded income")?;
            let income = annual_income(&transactions, year);
            debug!(year, %income, "using recorded income");
            income
        }
    };

    let result = TaxPlanner::new(ctx.repo, ctx.config.tax.clone())
        .estimate(gross, year, &args.deductions)
        .await
        .with_context(|| format!("estimating tax for {year}"))?;

    Ok(render(year, gross, &result))
}

pub fn render(
    year: i32,
    gross: Decimal,
    result: &TaxResult,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Tax estimate for {year}");
    let _ = writeln!(out, "  {:<34}{:>16}", "Gross income", format_amount(gross));
    if !result.deductions.is_empty() {
        let _ = writeln!(out, "  Deductions");
        for deduction in &result.deductions {
            let _ = writeln!(
                out,
                "    {:<32}{:>16}",
                deduction.input.name,
                format_amount(deduction.applied_amount)
            );
        }
    }
    let _ = writeln!(out, "  {:<34}{:>16}", "Total deductions", format_amount(result.total_deductions));
    let _ = writeln!(out, "  {:<34}{:>16}", "Taxable income", format_amount(result.taxable_income));
    let _ = writeln!(out, "  {:<34}{:>16}", "Tax", format_amount(result.tax));
    let _ = writeln!(out, "  {:<34}{:>16}", "Effective rate", format_percent(result.effective_rate));
    out
}
