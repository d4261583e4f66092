use std::fmt::Write;

use anyhow::{Context as _, Result};
use fin_core::recurrence::{ProcessReport, RecurrenceProcessor, create_rule};
use fin_core::{Frequency, NewRecurrenceRule, RecurrenceRule};
use tracing::info;

use super::{Context, lookup_error};
use crate::cli::{AddRecurringArgs, RecurringCommand, WEEKDAY_NAMES};
use crate::utils::format_amount;

pub async fn run(
    command: RecurringCommand,
    ctx: &Context<'_>,
) -> Result<String> {
    match command {
        RecurringCommand::List => {
            let rules = ctx
                .repo
                .list_recurrence_rules()
                .await
                .context("listing recurring transactions")?;
            Ok(render_list(&rules))
        }
        RecurringCommand::Add(args) => {
            let rule = new_rule(args, ctx);
            let created = create_rule(ctx.repo, rule, &ctx.config.defaults.currency_code, ctx.today)
                .await
                .context("creating recurring transaction")?;
            Ok(format!(
                "Created recurring transaction #{}: {}, next on {}\n",
                created.id,
                describe_schedule(&created),
                created.next_occurrence
            ))
        }
        RecurringCommand::Pause { id } => set_active(ctx, id, false).await,
        RecurringCommand::Resume { id } => set_active(ctx, id, true).await,
        RecurringCommand::Delete { id } => {
            ctx.repo
                .delete_recurrence_rule(id)
                .await
                .map_err(|e| lookup_error(e, "recurring transaction", id))?;
            Ok(format!("Deleted recurring transaction #{id}\n"))
        }
        RecurringCommand::Process { today } => {
            let today = today.unwrap_or(ctx.today);
            let report = RecurrenceProcessor::new(ctx.repo)
                .run(today)
                .await
                .context("processing recurring transactions")?;
            Ok(render_report(&report))
        }
    }
}

fn new_rule(
    args: AddRecurringArgs,
    ctx: &Context<'_>,
) -> NewRecurrenceRule {
    NewRecurrenceRule {
        account_id: args.account,
        category_id: args.category,
        kind: args.kind.into(),
        amount: args.amount,
        currency_code: args.currency,
        merchant: args.merchant,
        note: args.note,
        frequency: args.frequency.into(),
        start_date: args.start.unwrap_or(ctx.today),
        day_of_month: args.day_of_month,
        day_of_week: args.day_of_week,
        end_date: args.end,
    }
}

async fn set_active(
    ctx: &Context<'_>,
    id: i64,
    is_active: bool,
) -> Result<String> {
    ctx.repo
        .set_recurrence_active(id, is_active)
        .await
        .map_err(|e| lookup_error(e, "recurring transaction", id))?;
    info!(rule_id = id, is_active, "toggled recurring transaction");

    let verb = if is_active { "Resumed" } else { "Paused" };
    Ok(format!("{verb} recurring transaction #{id}\n"))
}

/// Human-readable schedule: `Every Mon`, `Day 15 of each month`, `Daily`.
pub fn describe_schedule(rule: &RecurrenceRule) -> String {
    match rule.frequency {
        Frequency::Daily => "Daily".to_string(),
        Frequency::Weekly => rule
            .day_of_week
            .and_then(|day| WEEKDAY_NAMES.get(day as usize))
            .map(|name| format!("Every {name}"))
            .unwrap_or_else(|| "Weekly".to_string()),
        Frequency::Monthly => rule
            .day_of_month
            .map(|day| format!("Day {day} of each month"))
            .unwrap_or_else(|| "Monthly".to_string()),
        Frequency::Yearly => "Yearly".to_string(),
    }
}

pub fn render_list(rules: &[RecurrenceRule]) -> String {
    if rules.is_empty() {
        return "No recurring transactions set up.\n".to_string();
    }

    let mut out = String::new();
    for rule in rules {
        let label = rule
            .merchant
            .as_deref()
            .or(rule.note.as_deref())
            .unwrap_or("(unnamed)");
        let status = if rule.is_active { "" } else { "  [paused]" };
        let _ = writeln!(
            out,
            "#{:<4} {:<7} {:>14} {}  {:<24} next {}  {}{}",
            rule.id,
            rule.kind.as_str(),
            format_amount(rule.amount),
            rule.currency_code,
            describe_schedule(rule),
            rule.next_occurrence,
            label,
            status
        );
    }
    out
}

pub fn render_report(report: &ProcessReport) -> String {
    let mut out = format!(
        "Fired {} rule(s), deactivated {}.\n",
        report.fired, report.deactivated
    );
    for failure in &report.failures {
        let _ = writeln!(out, "  rule #{} failed: {}", failure.rule_id, failure.error);
    }
    out
}
