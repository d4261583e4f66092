use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::{Transaction, TransactionKind};

/// First and last calendar day of `year`.
pub fn year_bounds(year: i32) -> Option<(NaiveDate, NaiveDate)> {
    Some((
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year, 12, 31)?,
    ))
}

/// Sum of base-currency income booked within `year`.
pub fn annual_income(
    transactions: &[Transaction],
    year: i32,
) -> Decimal {
    let Some((start, end)) = year_bounds(year) else {
        return Decimal::ZERO;
    };

    transactions
        .iter()
        .filter(|tx| tx.kind == TransactionKind::Income)
        .filter(|tx| tx.occurred_at >= start && tx.occurred_at <= end)
        .map(|tx| tx.amount_base)
        .sum()
}
