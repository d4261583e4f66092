//! Firing due recurrence rules.
//!
//! Each due rule fires at most once per pass: it generates one transaction
//! dated at its scheduled occurrence and moves to the following period. A
//! rule that has been dormant for several periods therefore needs several
//! passes to catch up.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::repository::{FinanceRepository, RepositoryError};
use crate::models::{NewTransaction, RecurrenceRule};
use crate::recurrence::schedule::next_after_firing;

/// Marker prepended to notes of generated transactions.
pub const AUTO_NOTE_PREFIX: &str = "[Auto]";

/// Note for a transaction generated from a rule with the given note.
pub fn generated_note(note: Option<&str>) -> String {
    match note {
        Some(note) if !note.is_empty() => format!("{AUTO_NOTE_PREFIX} {note}"),
        _ => format!("{AUTO_NOTE_PREFIX} Recurring transaction"),
    }
}

/// The transaction a rule generates for its current `next_occurrence`.
pub fn generated_transaction(rule: &RecurrenceRule) -> NewTransaction {
    NewTransaction {
        account_id: rule.account_id,
        category_id: rule.category_id,
        kind: rule.kind,
        amount_original: rule.amount,
        currency_code: rule.currency_code.clone(),
        amount_base: rule.amount,
        rate_used: rust_decimal::Decimal::ONE,
        merchant: rule.merchant.clone(),
        note: Some(generated_note(rule.note.as_deref())),
        occurred_at: rule.next_occurrence,
    }
}

/// What a processing pass does with one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleAction {
    /// The rule ended before today; switch it off without firing.
    Deactivate,
    /// Record `transaction` and move the rule to `next_occurrence`.
    Fire {
        transaction: NewTransaction,
        next_occurrence: NaiveDate,
    },
}

/// Decides what to do with `rule` on `today`; `None` when it is not due.
pub fn plan_rule(
    rule: &RecurrenceRule,
    today: NaiveDate,
) -> Option<RuleAction> {
    if !rule.is_due(today) {
        return None;
    }
    if rule.has_expired(today) {
        return Some(RuleAction::Deactivate);
    }

    Some(RuleAction::Fire {
        transaction: generated_transaction(rule),
        next_occurrence: next_after_firing(rule.frequency, rule.next_occurrence, rule.day_of_month),
    })
}

/// Result of [`process_due_recurrences`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub fired_count: usize,
    /// Rules that were advanced or deactivated, in their new state.
    pub updated_rules: Vec<RecurrenceRule>,
    pub generated_transactions: Vec<NewTransaction>,
}

/// Applies one processing pass to `rules` in memory.
pub fn process_due_recurrences(
    today: NaiveDate,
    rules: &[RecurrenceRule],
) -> ProcessOutcome {
    let mut outcome = ProcessOutcome::default();

    for rule in rules {
        match plan_rule(rule, today) {
            None => {}
            Some(RuleAction::Deactivate) => {
                outcome.updated_rules.push(RecurrenceRule {
                    is_active: false,
                    ..rule.clone()
                });
            }
            Some(RuleAction::Fire {
                transaction,
                next_occurrence,
            }) => {
                outcome.generated_transactions.push(transaction);
                outcome.updated_rules.push(RecurrenceRule {
                    next_occurrence,
                    ..rule.clone()
                });
                outcome.fired_count += 1;
            }
        }
    }

    outcome
}

/// A rule that could not be processed; it stays as it was for the next pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFailure {
    pub rule_id: i64,
    pub error: String,
}

/// Summary of a persisted processing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    pub fired: usize,
    pub deactivated: usize,
    pub failures: Vec<RuleFailure>,
}

/// Runs processing passes against a repository.
pub struct RecurrenceProcessor<'a, R: ?Sized> {
    repo: &'a R,
}

impl<'a, R: FinanceRepository + ?Sized> RecurrenceProcessor<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Fires every rule due on `today`, once.
    ///
    /// Only loading the due rules can fail the whole pass. A failure while
    /// handling a single rule is logged and reported in
    /// [`ProcessReport::failures`]; the remaining rules are still processed.
    /// A failed rule keeps its `next_occurrence` and has no transaction
    /// recorded, so the next pass retries the same occurrence.
    pub async fn run(
        &self,
        today: NaiveDate,
    ) -> Result<ProcessReport, RepositoryError> {
        let due = self.repo.list_due_recurrence_rules(today).await?;
        debug!(%today, due = due.len(), "processing recurrence rules");

        let mut report = ProcessReport::default();
        for rule in &due {
            let Some(action) = plan_rule(rule, today) else {
                continue;
            };

            match self.apply(rule, action).await {
                Ok(Applied::Fired) => report.fired += 1,
                Ok(Applied::Deactivated) => report.deactivated += 1,
                Err(error) => {
                    warn!(rule_id = rule.id, %error, "recurrence rule failed");
                    report.failures.push(RuleFailure {
                        rule_id: rule.id,
                        error: error.to_string(),
                    });
                }
            }
        }

        info!(
            fired = report.fired,
            deactivated = report.deactivated,
            failed = report.failures.len(),
            "recurrence processing finished"
        );
        Ok(report)
    }

    async fn apply(
        &self,
        rule: &RecurrenceRule,
        action: RuleAction,
    ) -> Result<Applied, RepositoryError> {
        match action {
            RuleAction::Deactivate => {
                self.repo.set_recurrence_active(rule.id, false).await?;
                info!(rule_id = rule.id, end_date = ?rule.end_date, "deactivated expired rule");
                Ok(Applied::Deactivated)
            }
            RuleAction::Fire {
                transaction,
                next_occurrence,
            } => {
                let created = self
                    .repo
                    .fire_recurrence(rule.id, &transaction, next_occurrence)
                    .await?;
                debug!(
                    rule_id = rule.id,
                    transaction_id = created.id,
                    occurred_at = %transaction.occurred_at,
                    %next_occurrence,
                    "fired recurrence rule"
                );
                Ok(Applied::Fired)
            }
        }
    }
}

enum Applied {
    Fired,
    Deactivated,
}
