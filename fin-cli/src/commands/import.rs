//! CSV import of transactions.
//!
//! Headers are matched by name, so column order does not matter.
//!
//! | Column          | Required | Notes                                   |
//! |-----------------|----------|-----------------------------------------|
//! | `occurred_at`   | yes      | `YYYY-MM-DD`                            |
//! | `kind`          | yes      | `income` or `expense`                   |
//! | `amount`        | yes      | decimal, `,` thousands separators ok    |
//! | `currency_code` | no       | defaults to the configured currency     |
//! | `merchant`      | no       |                                         |
//! | `note`          | no       |                                         |
//! | `account_id`    | no       | defaults to `--account`                 |
//!
//! ```csv
//! occurred_at,kind,amount,merchant,note
//! 2025-01-25,income,"50,000.00",Employer,Salary
//! 2025-01-31,expense,15000,Landlord,Rent
//! ```

use std::path::Path;

use anyhow::Context as _;
use chrono::NaiveDate;
use fin_core::{FinanceRepository, NewTransaction, TransactionKind};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use crate::utils::parse_decimal;

#[derive(Debug, Deserialize)]
struct CsvRow {
    occurred_at: NaiveDate,
    kind: String,
    amount: String,
    #[serde(default)]
    currency_code: Option<String>,
    #[serde(default)]
    merchant: Option<String>,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    account_id: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// Bad structure, missing required column, or a type mismatch.
    #[error("CSV parse error: {0}")]
    Parse(#[from] csv::Error),

    /// Rows are numbered from 1, the header not counted.
    #[error("unrecognised kind '{kind}' on row {row} (expected income or expense)")]
    InvalidKind { kind: String, row: usize },

    #[error("invalid amount on row {row}: {message}")]
    InvalidAmount { row: usize, message: String },
}

/// Defaults for cells a row leaves empty.
#[derive(Debug, Clone)]
pub struct ImportDefaults {
    pub account_id: i64,
    pub currency_code: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn convert_row(
    row: CsvRow,
    row_number: usize,
    defaults: &ImportDefaults,
) -> Result<NewTransaction, ImportError> {
    let kind = TransactionKind::parse(&row.kind.to_ascii_lowercase()).ok_or_else(|| {
        ImportError::InvalidKind {
            kind: row.kind.clone(),
            row: row_number,
        }
    })?;

    let amount = parse_decimal(&row.amount)
        .map_err(|e| ImportError::InvalidAmount {
            row: row_number,
            message: e.to_string(),
        })
        .and_then(|amount| {
            if amount <= Decimal::ZERO {
                Err(ImportError::InvalidAmount {
                    row: row_number,
                    message: format!("'{}' is not positive", row.amount),
                })
            } else {
                Ok(amount)
            }
        })?;

    let currency = non_empty(row.currency_code).unwrap_or_else(|| defaults.currency_code.clone());
    let mut transaction = NewTransaction::in_base_currency(
        row.account_id.unwrap_or(defaults.account_id),
        kind,
        amount,
        currency,
        row.occurred_at,
    );
    transaction.merchant = non_empty(row.merchant);
    transaction.note = non_empty(row.note);
    Ok(transaction)
}

/// Parses CSV text into transactions, in file order.
///
/// # Errors
///
/// Fails on the first malformed row; nothing is returned for the rest.
pub fn parse_transactions(
    input: &str,
    defaults: &ImportDefaults,
) -> Result<Vec<NewTransaction>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(input.as_bytes());

    reader
        .deserialize::<CsvRow>()
        .enumerate()
        .map(|(idx, result)| convert_row(result?, idx + 1, defaults))
        .collect()
}

/// Reads `path` and records every row. The whole file is parsed first, so
/// a bad row means nothing is recorded.
pub async fn import_file<R: FinanceRepository + ?Sized>(
    repo: &R,
    path: &Path,
    defaults: &ImportDefaults,
) -> anyhow::Result<usize> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read '{}'", path.display()))?;
    let transactions = parse_transactions(&contents, defaults)
        .with_context(|| format!("invalid transactions file '{}'", path.display()))?;

    for transaction in &transactions {
        repo.insert_transaction(transaction)
            .await
            .with_context(|| format!("recording transaction of {}", transaction.occurred_at))?;
    }

    info!(path = %path.display(), count = transactions.len(), "imported transactions");
    Ok(transactions.len())
}
