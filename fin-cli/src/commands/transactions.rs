use std::fmt::Write;

use anyhow::{Context as _, Result, bail};
use fin_core::{NewTransaction, Transaction, TransactionKind};
use rust_decimal::Decimal;

use super::Context;
use super::import::{ImportDefaults, import_file};
use crate::cli::{AddTransactionArgs, TransactionsCommand};
use crate::utils::format_amount;

pub async fn run(
    command: TransactionsCommand,
    ctx: &Context<'_>,
) -> Result<String> {
    match command {
        TransactionsCommand::List { year } => {
            let transactions = ctx
                .repo
                .list_transactions(year)
                .await
                .context("listing transactions")?;
            Ok(render_list(&transactions))
        }
        TransactionsCommand::Add(args) => {
            let transaction = new_transaction(args, ctx)?;
            let created = ctx
                .repo
                .insert_transaction(&transaction)
                .await
                .context("recording transaction")?;
            Ok(format!(
                "Recorded {} #{}: {} {} on {}\n",
                created.kind.as_str(),
                created.id,
                format_amount(created.amount_original),
                created.currency_code,
                created.occurred_at
            ))
        }
        TransactionsCommand::Import { file, account } => {
            let defaults = ImportDefaults {
                account_id: account,
                currency_code: ctx.config.defaults.currency_code.clone(),
            };
            let count = import_file(ctx.repo, &file, &defaults).await?;
            Ok(format!("Imported {count} transaction(s) from {}\n", file.display()))
        }
    }
}

fn new_transaction(
    args: AddTransactionArgs,
    ctx: &Context<'_>,
) -> Result<NewTransaction> {
    if args.amount <= Decimal::ZERO {
        bail!("--amount must be positive");
    }

    let mut transaction = NewTransaction::in_base_currency(
        args.account,
        args.kind.into(),
        args.amount,
        ctx.currency_or_default(args.currency),
        args.date.unwrap_or(ctx.today),
    );
    transaction.category_id = args.category;
    transaction.merchant = args.merchant;
    transaction.note = args.note;
    Ok(transaction)
}

pub fn render_list(transactions: &[Transaction]) -> String {
    if transactions.is_empty() {
        return "No transactions.\n".to_string();
    }

    let mut out = String::new();
    for tx in transactions {
        let signed = match tx.kind {
            TransactionKind::Income => tx.amount_base,
            TransactionKind::Expense => -tx.amount_base,
        };
        let description = [tx.merchant.as_deref(), tx.note.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" - ");
        let _ = writeln!(
            out,
            "{}  #{:<5} {:>16} {}  {}",
            tx.occurred_at,
            tx.id,
            format_amount(signed),
            tx.currency_code,
            description
        );
    }
    out
}
