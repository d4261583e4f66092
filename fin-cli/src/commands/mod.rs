//! Subcommand implementations.
//!
//! Each command runs against a [`Context`] and returns the text to print,
//! which keeps them testable against an in-memory database.

pub mod deductions;
pub mod import;
pub mod income;
pub mod recurring;
pub mod tax;
pub mod transactions;

use anyhow::{Result, anyhow};
use chrono::{Datelike, NaiveDate};
use fin_core::{FinanceRepository, RepositoryError};

use crate::cli::Command;
use crate::config::AppConfig;

pub struct Context<'a> {
    pub repo: &'a dyn FinanceRepository,
    pub config: &'a AppConfig,
    pub today: NaiveDate,
}

impl Context<'_> {
    /// `year`, or the current calendar year.
    pub fn year_or_current(
        &self,
        year: Option<i32>,
    ) -> i32 {
        year.unwrap_or_else(|| self.today.year())
    }

    pub fn currency_or_default(
        &self,
        currency: Option<String>,
    ) -> String {
        currency
            .filter(|code| !code.trim().is_empty())
            .unwrap_or_else(|| self.config.defaults.currency_code.clone())
    }
}

pub async fn execute(
    command: Command,
    ctx: &Context<'_>,
) -> Result<String> {
    match command {
        Command::Tax(args) => tax::run(args, ctx).await,
        Command::Income { year } => income::run(year, ctx).await,
        Command::Deductions(command) => deductions::run(command, ctx).await,
        Command::Recurring(command) => recurring::run(command, ctx).await,
        Command::Transactions(command) => transactions::run(command, ctx).await,
    }
}

/// Turns `NotFound` into a message naming the record.
fn lookup_error(
    err: RepositoryError,
    what: &str,
    id: i64,
) -> anyhow::Error {
    match err {
        RepositoryError::NotFound => anyhow!("no {what} with id {id}"),
        other => anyhow::Error::new(other).context(format!("{what} {id}")),
    }
}
