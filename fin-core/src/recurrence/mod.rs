//! Recurring transactions: rule creation and scheduled firing.

pub mod process;
pub mod schedule;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use crate::db::repository::{FinanceRepository, RepositoryError};
use crate::models::{Frequency, NewRecurrenceRule, RecurrenceRule};

pub use process::{
    AUTO_NOTE_PREFIX, ProcessOutcome, ProcessReport, RecurrenceProcessor, RuleAction, RuleFailure,
    process_due_recurrences,
};
pub use schedule::{initial_next_occurrence, initial_next_occurrence_from_today, next_after_firing};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecurrenceError {
    #[error("Amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    #[error("Day of month must be between 1 and 31, got {0}")]
    InvalidDayOfMonth(u32),

    #[error("Day of week must be between 0 (Sunday) and 6 (Saturday), got {0}")]
    InvalidDayOfWeek(u32),

    #[error("End date {end} is before start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Checks a rule before it is stored.
pub fn validate_new_rule(rule: &NewRecurrenceRule) -> Result<(), RecurrenceError> {
    if rule.amount <= Decimal::ZERO {
        return Err(RecurrenceError::InvalidAmount(rule.amount));
    }
    if let Some(day) = rule.day_of_month.filter(|day| !(1..=31).contains(day)) {
        return Err(RecurrenceError::InvalidDayOfMonth(day));
    }
    if let Some(day) = rule.day_of_week.filter(|day| *day > 6) {
        return Err(RecurrenceError::InvalidDayOfWeek(day));
    }
    if let Some(end) = rule.end_date.filter(|end| *end < rule.start_date) {
        return Err(RecurrenceError::EndBeforeStart {
            start: rule.start_date,
            end,
        });
    }
    Ok(())
}

/// Validates and stores a new rule, scheduling its first occurrence
/// relative to `today`. A rule without a currency gets `default_currency`.
pub async fn create_rule<R: FinanceRepository + ?Sized>(
    repo: &R,
    mut rule: NewRecurrenceRule,
    default_currency: &str,
    today: NaiveDate,
) -> Result<RecurrenceRule, RecurrenceError> {
    validate_new_rule(&rule)?;
    if rule.currency_code.as_deref().is_none_or(str::is_empty) {
        rule.currency_code = Some(default_currency.to_string());
    }

    // Only the anchor that belongs to the frequency is kept.
    if rule.frequency != Frequency::Monthly {
        rule.day_of_month = None;
    }
    if rule.frequency != Frequency::Weekly {
        rule.day_of_week = None;
    }

    let next = initial_next_occurrence(
        rule.frequency,
        rule.start_date,
        rule.day_of_month,
        rule.day_of_week,
        today,
    );
    let created = repo.create_recurrence_rule(&rule, next).await?;

    info!(
        rule_id = created.id,
        frequency = created.frequency.as_str(),
        next_occurrence = %created.next_occurrence,
        "created recurrence rule"
    );
    Ok(created)
}
