use anyhow::{Context as _, Result};
use fin_core::calculations::income::annual_income;

use super::Context;
use crate::utils::format_amount;

pub async fn run(
    year: Option<i32>,
    ctx: &Context<'_>,
) -> Result<String> {
    let year = ctx.year_or_current(year);
    let transactions = ctx
        .repo
        .list_transactions(Some(year))
        .await
        .context("reading transactions")?;

    let income = annual_income(&transactions, year);
    Ok(format!(
        "Income for {year}: {} {}\n",
        format_amount(income),
        ctx.config.defaults.currency_code
    ))
}
