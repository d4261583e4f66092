use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use fin_core::{DeductionInput, Frequency, TransactionKind};
use rust_decimal::Decimal;

use crate::utils::{parse_decimal, parse_deduction_arg};

/// Personal finance planner: Thai income tax estimates and recurring
/// transactions.
#[derive(Debug, Parser)]
#[command(name = "fin", version)]
pub struct Cli {
    /// Configuration file [default: fin.toml when present].
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Database backend, overriding the config file.
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Database connection string, overriding the config file.
    /// For SQLite this is a file path (e.g. `finance.db`) or `:memory:`.
    #[arg(long, global = true)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Estimate income tax for a year.
    Tax(TaxArgs),

    /// Show income recorded for a year.
    Income {
        /// Tax year [default: current year].
        #[arg(long)]
        year: Option<i32>,
    },

    /// Manage recorded deductions.
    #[command(subcommand)]
    Deductions(DeductionsCommand),

    /// Manage recurring transactions.
    #[command(subcommand)]
    Recurring(RecurringCommand),

    /// Record and list transactions.
    #[command(subcommand)]
    Transactions(TransactionsCommand),
}

#[derive(Debug, Args)]
pub struct TaxArgs {
    /// Gross income [default: income recorded for the year].
    #[arg(long, value_parser = parse_decimal)]
    pub income: Option<Decimal>,

    /// Tax year [default: current year].
    #[arg(long)]
    pub year: Option<i32>,

    /// Extra deduction for this estimate only, as `Name=amount[;cap=X][;pct=Y]`.
    /// May be repeated.
    #[arg(long = "deduction", value_name = "DEDUCTION", value_parser = parse_deduction_arg)]
    pub deductions: Vec<DeductionInput>,
}

#[derive(Debug, Subcommand)]
pub enum DeductionsCommand {
    /// List deductions recorded for a year.
    List {
        #[arg(long)]
        year: Option<i32>,
    },

    /// Record a deduction.
    Add(AddDeductionArgs),

    /// Delete a recorded deduction.
    Delete { id: i64 },

    /// Show the preset deduction categories and their caps.
    Categories,
}

#[derive(Debug, Args)]
pub struct AddDeductionArgs {
    /// Preset category id (see `fin deductions categories`).
    #[arg(long, default_value = "other")]
    pub category: String,

    /// Display name [default: the category's name].
    #[arg(long)]
    pub name: Option<String>,

    /// Amount claimed.
    #[arg(long, value_parser = parse_decimal)]
    pub amount: Option<Decimal>,

    /// Fixed cap [default: the category's cap].
    #[arg(long, value_parser = parse_decimal)]
    pub cap: Option<Decimal>,

    /// Cap as a percentage of gross income, e.g. `30` [default: the category's].
    #[arg(long, value_parser = parse_decimal)]
    pub pct: Option<Decimal>,

    /// Tax year [default: current year].
    #[arg(long)]
    pub year: Option<i32>,

    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum RecurringCommand {
    /// List recurring transactions, soonest first.
    List,

    /// Create a recurring transaction.
    Add(AddRecurringArgs),

    /// Stop a rule from firing.
    Pause { id: i64 },

    /// Let a paused rule fire again.
    Resume { id: i64 },

    /// Delete a rule. Transactions it already generated are kept.
    Delete { id: i64 },

    /// Fire every due rule once.
    Process {
        /// Process as of this date [default: today].
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

#[derive(Debug, Args)]
pub struct AddRecurringArgs {
    #[arg(long, value_enum)]
    pub kind: KindArg,

    #[arg(long, value_parser = parse_decimal)]
    pub amount: Decimal,

    #[arg(long, value_enum)]
    pub frequency: FrequencyArg,

    /// First date the rule applies [default: today].
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last date the rule may fire.
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Day of the month for monthly rules (1-31).
    #[arg(long)]
    pub day_of_month: Option<u32>,

    /// Weekday for weekly rules: `0`-`6` from Sunday, or a name such as `mon`.
    #[arg(long, value_parser = parse_weekday)]
    pub day_of_week: Option<u32>,

    #[arg(long, default_value_t = 1)]
    pub account: i64,

    #[arg(long)]
    pub category: Option<i64>,

    /// Currency [default: from config].
    #[arg(long)]
    pub currency: Option<String>,

    #[arg(long)]
    pub merchant: Option<String>,

    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum TransactionsCommand {
    /// List transactions, newest first.
    List {
        /// Only this calendar year.
        #[arg(long)]
        year: Option<i32>,
    },

    /// Record a transaction in the base currency.
    Add(AddTransactionArgs),

    /// Record every row of a CSV file.
    Import {
        file: PathBuf,

        /// Account for rows without an `account_id`.
        #[arg(long, default_value_t = 1)]
        account: i64,
    },
}

#[derive(Debug, Args)]
pub struct AddTransactionArgs {
    #[arg(long, value_enum)]
    pub kind: KindArg,

    #[arg(long, value_parser = parse_decimal)]
    pub amount: Decimal,

    /// [default: today]
    #[arg(long)]
    pub date: Option<NaiveDate>,

    #[arg(long, default_value_t = 1)]
    pub account: i64,

    #[arg(long)]
    pub category: Option<i64>,

    /// Currency [default: from config].
    #[arg(long)]
    pub currency: Option<String>,

    #[arg(long)]
    pub merchant: Option<String>,

    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Income,
    Expense,
}

impl From<KindArg> for TransactionKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Income => TransactionKind::Income,
            KindArg::Expense => TransactionKind::Expense,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FrequencyArg {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl From<FrequencyArg> for Frequency {
    fn from(frequency: FrequencyArg) -> Self {
        match frequency {
            FrequencyArg::Daily => Frequency::Daily,
            FrequencyArg::Weekly => Frequency::Weekly,
            FrequencyArg::Monthly => Frequency::Monthly,
            FrequencyArg::Yearly => Frequency::Yearly,
        }
    }
}

pub const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// `0`..`6` counted from Sunday, or a weekday name of three letters or more.
fn parse_weekday(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Ok(index) = s.parse::<u32>() {
        return Ok(index);
    }

    let lower = s.to_ascii_lowercase();
    WEEKDAY_NAMES
        .iter()
        .position(|name| lower.len() >= 3 && lower.starts_with(&name.to_ascii_lowercase()))
        .map(|index| index as u32)
        .ok_or_else(|| format!("'{s}' is not a weekday"))
}
