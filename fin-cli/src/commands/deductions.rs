use std::fmt::Write;

use anyhow::{Context as _, Result, anyhow, bail};
use fin_core::calculations::{DEDUCTION_CATEGORIES, DeductionCategory, find_category};
use fin_core::{NewTaxDeduction, TaxDeduction};
use rust_decimal::Decimal;
use tracing::info;

use super::{Context, lookup_error};
use crate::cli::{AddDeductionArgs, DeductionsCommand};
use crate::utils::{format_amount, format_percent, opt_amount_display};

pub async fn run(
    command: DeductionsCommand,
    ctx: &Context<'_>,
) -> Result<String> {
    match command {
        DeductionsCommand::List { year } => {
            let year = ctx.year_or_current(year);
            let deductions = ctx
                .repo
                .list_deductions(year)
                .await
                .context("listing deductions")?;
            Ok(render_list(year, &deductions))
        }
        DeductionsCommand::Add(args) => {
            let deduction = new_deduction(args, ctx.year_or_current(None))?;
            let created = ctx
                .repo
                .create_deduction(deduction)
                .await
                .context("recording deduction")?;
            info!(id = created.id, tax_year = created.tax_year, "recorded deduction");
            Ok(format!(
                "Recorded deduction #{}: {} ({})\n",
                created.id, created.name, created.tax_year
            ))
        }
        DeductionsCommand::Delete { id } => {
            ctx.repo
                .delete_deduction(id)
                .await
                .map_err(|e| lookup_error(e, "deduction", id))?;
            Ok(format!("Deleted deduction #{id}\n"))
        }
        DeductionsCommand::Categories => Ok(render_categories(DEDUCTION_CATEGORIES)),
    }
}

/// Builds the record, defaulting name and caps from the preset category.
pub fn new_deduction(
    args: AddDeductionArgs,
    current_year: i32,
) -> Result<NewTaxDeduction> {
    let category = find_category(&args.category).ok_or_else(|| {
        anyhow!(
            "unknown deduction category '{}' (see `fin deductions categories`)",
            args.category
        )
    })?;

    for (label, value) in [("amount", args.amount), ("cap", args.cap), ("pct", args.pct)] {
        if value.is_some_and(|v| v < Decimal::ZERO) {
            bail!("--{label} must not be negative");
        }
    }

    Ok(NewTaxDeduction {
        tax_year: args.year.unwrap_or(current_year),
        name: args.name.unwrap_or_else(|| category.name.to_string()),
        category: category.id.to_string(),
        amount: args.amount,
        cap_amount: args.cap.or_else(|| category.cap_amount()),
        cap_percent: args
            .pct
            .map(|pct| pct / Decimal::ONE_HUNDRED)
            .or_else(|| category.cap_percent()),
        description: args.description,
    })
}

pub fn render_list(
    year: i32,
    deductions: &[TaxDeduction],
) -> String {
    if deductions.is_empty() {
        return format!("No deductions recorded for {year}.\n");
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>4}  {:<28} {:<24} {:>14} {:>14} {:>6}",
        "ID", "Name", "Category", "Amount", "Cap", "Cap %"
    );
    for d in deductions {
        let _ = writeln!(
            out,
            "{:>4}  {:<28} {:<24} {:>14} {:>14} {:>6}",
            d.id,
            d.name,
            d.category,
            opt_amount_display(d.amount),
            opt_amount_display(d.cap_amount),
            d.cap_percent.map(format_percent).unwrap_or_else(|| "-".to_string()),
        );
    }
    out
}

fn cap_description(category: &DeductionCategory) -> String {
    match (category.cap_amount(), category.cap_percent()) {
        (Some(amount), Some(pct)) => {
            format!("{} or {} of income", format_amount(amount), format_percent(pct))
        }
        (Some(amount), None) => format_amount(amount),
        (None, Some(pct)) => format!("{} of income", format_percent(pct)),
        (None, None) => "no cap".to_string(),
    }
}

pub fn render_categories(categories: &[DeductionCategory]) -> String {
    let mut out = String::new();
    for category in categories {
        let _ = writeln!(
            out,
            "{:<26} {:<32} {}",
            category.id,
            category.name,
            cap_description(category)
        );
    }
    out
}
