use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;

use fin_core::calculations::{StandardAllowances, TaxPlanner};
use fin_core::recurrence::{RecurrenceError, RecurrenceProcessor, create_rule};
use fin_core::{
    FinanceRepository, Frequency, NewRecurrenceRule, NewTaxDeduction, NewTransaction,
    RecurrenceRule, RepositoryError, TaxBracket, TaxDeduction, Transaction, TransactionKind,
};

#[derive(Default)]
struct State {
    brackets: Vec<(i32, TaxBracket)>,
    deductions: Vec<TaxDeduction>,
    transactions: Vec<Transaction>,
    rules: Vec<RecurrenceRule>,
    next_id: i64,
}

/// Keeps everything in memory. Rules listed in `failing_rules` cannot be
/// fired until they are recovered.
#[derive(Default)]
struct MemoryRepository {
    state: Mutex<State>,
    failing_rules: Mutex<HashSet<i64>>,
}

impl MemoryRepository {
    fn with_failing_rules(ids: &[i64]) -> Self {
        Self {
            failing_rules: Mutex::new(ids.iter().copied().collect()),
            ..Self::default()
        }
    }

    fn recover(
        &self,
        id: i64,
    ) {
        self.failing_rules.lock().expect("failing rules lock").remove(&id);
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("state lock")
    }
}

impl State {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn store_transaction(
        &mut self,
        transaction: &NewTransaction,
    ) -> Transaction {
        let stored = Transaction {
            id: self.allocate_id(),
            account_id: transaction.account_id,
            category_id: transaction.category_id,
            kind: transaction.kind,
            amount_original: transaction.amount_original,
            currency_code: transaction.currency_code.clone(),
            amount_base: transaction.amount_base,
            rate_used: transaction.rate_used,
            merchant: transaction.merchant.clone(),
            note: transaction.note.clone(),
            occurred_at: transaction.occurred_at,
            created_at: Utc::now(),
        };
        self.transactions.push(stored.clone());
        stored
    }

    fn rule_mut(
        &mut self,
        id: i64,
    ) -> Result<&mut RecurrenceRule, RepositoryError> {
        self.rules
            .iter_mut()
            .find(|rule| rule.id == id)
            .ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl FinanceRepository for MemoryRepository {
    async fn get_tax_brackets(
        &self,
        tax_year: i32,
    ) -> Result<Vec<TaxBracket>, RepositoryError> {
        Ok(self
            .state()
            .brackets
            .iter()
            .filter(|(year, _)| *year == tax_year)
            .map(|(_, bracket)| bracket.clone())
            .collect())
    }

    async fn list_bracket_years(&self) -> Result<Vec<i32>, RepositoryError> {
        let mut years: Vec<_> = self.state().brackets.iter().map(|(year, _)| *year).collect();
        years.sort_unstable();
        years.dedup();
        Ok(years)
    }

    async fn insert_tax_bracket(
        &self,
        tax_year: i32,
        bracket: &TaxBracket,
    ) -> Result<(), RepositoryError> {
        self.state().brackets.push((tax_year, bracket.clone()));
        Ok(())
    }

    async fn delete_tax_brackets(
        &self,
        tax_year: i32,
    ) -> Result<(), RepositoryError> {
        self.state().brackets.retain(|(year, _)| *year != tax_year);
        Ok(())
    }

    async fn create_deduction(
        &self,
        deduction: NewTaxDeduction,
    ) -> Result<TaxDeduction, RepositoryError> {
        let mut state = self.state();
        let stored = TaxDeduction {
            id: state.allocate_id(),
            tax_year: deduction.tax_year,
            name: deduction.name,
            category: deduction.category,
            amount: deduction.amount,
            cap_amount: deduction.cap_amount,
            cap_percent: deduction.cap_percent,
            description: deduction.description,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        state.deductions.push(stored.clone());
        Ok(stored)
    }

    async fn get_deduction(
        &self,
        id: i64,
    ) -> Result<TaxDeduction, RepositoryError> {
        self.state()
            .deductions
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_deductions(
        &self,
        tax_year: i32,
    ) -> Result<Vec<TaxDeduction>, RepositoryError> {
        Ok(self
            .state()
            .deductions
            .iter()
            .filter(|d| d.tax_year == tax_year)
            .cloned()
            .collect())
    }

    async fn delete_deduction(
        &self,
        id: i64,
    ) -> Result<(), RepositoryError> {
        self.state().deductions.retain(|d| d.id != id);
        Ok(())
    }

    async fn insert_transaction(
        &self,
        transaction: &NewTransaction,
    ) -> Result<Transaction, RepositoryError> {
        Ok(self.state().store_transaction(transaction))
    }

    async fn list_transactions(
        &self,
        year: Option<i32>,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        use chrono::Datelike;
        Ok(self
            .state()
            .transactions
            .iter()
            .filter(|tx| year.is_none_or(|year| tx.occurred_at.year() == year))
            .cloned()
            .collect())
    }

    async fn create_recurrence_rule(
        &self,
        rule: &NewRecurrenceRule,
        next_occurrence: NaiveDate,
    ) -> Result<RecurrenceRule, RepositoryError> {
        let mut state = self.state();
        let stored = RecurrenceRule {
            id: state.allocate_id(),
            account_id: rule.account_id,
            category_id: rule.category_id,
            kind: rule.kind,
            amount: rule.amount,
            currency_code: rule.currency_code.clone().unwrap_or_default(),
            merchant: rule.merchant.clone(),
            note: rule.note.clone(),
            frequency: rule.frequency,
            start_date: rule.start_date,
            day_of_month: rule.day_of_month,
            day_of_week: rule.day_of_week,
            end_date: rule.end_date,
            next_occurrence,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        state.rules.push(stored.clone());
        Ok(stored)
    }

    async fn get_recurrence_rule(
        &self,
        id: i64,
    ) -> Result<RecurrenceRule, RepositoryError> {
        self.state().rule_mut(id).map(|rule| rule.clone())
    }

    async fn list_recurrence_rules(&self) -> Result<Vec<RecurrenceRule>, RepositoryError> {
        let mut rules = self.state().rules.clone();
        rules.sort_by_key(|rule| rule.next_occurrence);
        Ok(rules)
    }

    async fn list_due_recurrence_rules(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<RecurrenceRule>, RepositoryError> {
        Ok(self
            .state()
            .rules
            .iter()
            .filter(|rule| rule.is_due(today))
            .cloned()
            .collect())
    }

    async fn set_recurrence_active(
        &self,
        id: i64,
        is_active: bool,
    ) -> Result<(), RepositoryError> {
        self.state().rule_mut(id)?.is_active = is_active;
        Ok(())
    }

    async fn fire_recurrence(
        &self,
        id: i64,
        transaction: &NewTransaction,
        next_occurrence: NaiveDate,
    ) -> Result<Transaction, RepositoryError> {
        if self.failing_rules.lock().expect("failing rules lock").contains(&id) {
            return Err(RepositoryError::Database("disk I/O error".to_string()));
        }
        let mut state = self.state();
        state.rule_mut(id)?.next_occurrence = next_occurrence;
        Ok(state.store_transaction(transaction))
    }

    async fn delete_recurrence_rule(
        &self,
        id: i64,
    ) -> Result<(), RepositoryError> {
        self.state().rules.retain(|rule| rule.id != id);
        Ok(())
    }
}

fn date(s: &str) -> NaiveDate {
    s.parse().expect("valid test date")
}

fn monthly_rent(start: &str) -> NewRecurrenceRule {
    NewRecurrenceRule {
        account_id: 1,
        category_id: None,
        kind: TransactionKind::Expense,
        amount: dec!(12000),
        currency_code: None,
        merchant: None,
        note: Some("Rent".to_string()),
        frequency: Frequency::Monthly,
        start_date: date(start),
        day_of_month: Some(1),
        day_of_week: None,
        end_date: None,
    }
}

#[tokio::test]
async fn create_rule_fills_currency_and_first_occurrence() {
    let repo = MemoryRepository::default();

    let rule = create_rule(&repo, monthly_rent("2025-01-01"), "THB", date("2025-03-20"))
        .await
        .expect("create rule");

    assert_eq!(rule.currency_code, "THB");
    assert_eq!(rule.next_occurrence, date("2025-04-01"));
    assert!(rule.is_active);
}

#[tokio::test]
async fn create_rule_drops_anchor_of_other_frequency() {
    let repo = MemoryRepository::default();
    let weekly = NewRecurrenceRule {
        frequency: Frequency::Weekly,
        day_of_week: Some(1),
        ..monthly_rent("2025-01-01")
    };

    let rule = create_rule(&repo, weekly, "THB", date("2025-03-20"))
        .await
        .expect("create rule");

    assert_eq!(rule.day_of_month, None);
    assert_eq!(rule.day_of_week, Some(1));
    assert_eq!(rule.next_occurrence, date("2025-03-24"));
}

#[tokio::test]
async fn create_rule_rejects_invalid_rule_without_storing() {
    let repo = MemoryRepository::default();
    let invalid = NewRecurrenceRule {
        amount: dec!(-5),
        ..monthly_rent("2025-01-01")
    };

    let result = create_rule(&repo, invalid, "THB", date("2025-03-20")).await;

    assert_eq!(result, Err(RecurrenceError::InvalidAmount(dec!(-5))));
    assert!(repo.list_recurrence_rules().await.expect("list").is_empty());
}

#[tokio::test]
async fn processor_fires_due_rule_and_advances_one_month() {
    let repo = MemoryRepository::default();
    let rule = create_rule(&repo, monthly_rent("2025-04-01"), "THB", date("2025-03-20"))
        .await
        .expect("create rule");

    let report = RecurrenceProcessor::new(&repo)
        .run(date("2025-04-02"))
        .await
        .expect("process");

    assert_eq!(report.fired, 1);
    assert_eq!(report.deactivated, 0);
    assert!(report.failures.is_empty());

    let transactions = repo.list_transactions(Some(2025)).await.expect("list");
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].occurred_at, date("2025-04-01"));
    assert_eq!(transactions[0].note.as_deref(), Some("[Auto] Rent"));
    assert_eq!(transactions[0].currency_code, "THB");

    let advanced = repo.get_recurrence_rule(rule.id).await.expect("rule");
    assert_eq!(advanced.next_occurrence, date("2025-05-01"));
}

#[tokio::test]
async fn second_pass_on_same_day_fires_nothing_new() {
    let repo = MemoryRepository::default();
    create_rule(&repo, monthly_rent("2025-04-01"), "THB", date("2025-03-20"))
        .await
        .expect("create rule");
    let processor = RecurrenceProcessor::new(&repo);

    processor.run(date("2025-04-02")).await.expect("first pass");
    let report = processor.run(date("2025-04-02")).await.expect("second pass");

    assert_eq!(report.fired, 0);
    assert_eq!(repo.list_transactions(None).await.expect("list").len(), 1);
}

#[tokio::test]
async fn expired_rule_is_deactivated_without_firing() {
    let repo = MemoryRepository::default();
    let ending = NewRecurrenceRule {
        end_date: Some(date("2025-04-15")),
        ..monthly_rent("2025-04-01")
    };
    let rule = repo
        .create_recurrence_rule(&ending, date("2025-05-01"))
        .await
        .expect("store rule");

    let report = RecurrenceProcessor::new(&repo)
        .run(date("2025-05-02"))
        .await
        .expect("process");

    assert_eq!(report.fired, 0);
    assert_eq!(report.deactivated, 1);
    assert!(repo.list_transactions(None).await.expect("list").is_empty());
    assert!(!repo.get_recurrence_rule(rule.id).await.expect("rule").is_active);
}

#[tokio::test]
async fn failing_rule_does_not_stop_the_others() {
    // Ids are allocated from 1, so the first rule created is rule 1.
    let repo = MemoryRepository::with_failing_rules(&[1]);
    let broken = create_rule(&repo, monthly_rent("2025-04-01"), "THB", date("2025-03-01"))
        .await
        .expect("create broken rule");
    let healthy = create_rule(&repo, monthly_rent("2025-04-01"), "THB", date("2025-03-01"))
        .await
        .expect("create healthy rule");
    assert_eq!(broken.id, 1);
    assert_eq!(broken.next_occurrence, date("2025-04-01"));

    let report = RecurrenceProcessor::new(&repo)
        .run(date("2025-04-02"))
        .await
        .expect("process");

    assert_eq!(report.fired, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].rule_id, broken.id);
    assert!(report.failures[0].error.contains("disk I/O error"));

    let healthy = repo.get_recurrence_rule(healthy.id).await.expect("rule");
    assert_eq!(healthy.next_occurrence, date("2025-05-01"));
    let broken = repo.get_recurrence_rule(broken.id).await.expect("rule");
    assert_eq!(broken.next_occurrence, date("2025-04-01"));

    let transactions = repo.list_transactions(None).await.expect("list");
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].occurred_at, date("2025-04-01"));
}

#[tokio::test]
async fn failed_rule_is_retried_without_duplicates() {
    let repo = MemoryRepository::with_failing_rules(&[1]);
    let rule = create_rule(&repo, monthly_rent("2025-04-01"), "THB", date("2025-03-01"))
        .await
        .expect("create rule");
    let processor = RecurrenceProcessor::new(&repo);
    let today = date("2025-04-02");

    for _ in 0..2 {
        let report = processor.run(today).await.expect("process");
        assert_eq!(report.fired, 0);
        assert_eq!(report.failures.len(), 1);
    }
    assert!(repo.list_transactions(None).await.expect("list").is_empty());
    assert_eq!(
        repo.get_recurrence_rule(rule.id).await.expect("rule").next_occurrence,
        date("2025-04-01")
    );

    repo.recover(rule.id);
    let report = processor.run(today).await.expect("process");

    assert_eq!(report.fired, 1);
    let dates: Vec<_> = repo
        .list_transactions(None)
        .await
        .expect("list")
        .into_iter()
        .map(|tx| tx.occurred_at)
        .collect();
    assert_eq!(dates, vec![date("2025-04-01")]);
    assert_eq!(
        repo.get_recurrence_rule(rule.id).await.expect("rule").next_occurrence,
        date("2025-05-01")
    );
}

#[tokio::test]
async fn planner_uses_built_in_brackets_and_recorded_deductions() {
    let repo = MemoryRepository::default();
    repo.create_deduction(NewTaxDeduction {
        tax_year: 2025,
        name: "Social Security".to_string(),
        category: "social_security".to_string(),
        amount: None,
        cap_amount: Some(dec!(9000)),
        cap_percent: None,
        description: None,
    })
    .await
    .expect("store deduction");

    let planner = TaxPlanner::new(&repo, StandardAllowances::default());
    let result = planner.estimate(dec!(600000), 2025, &[]).await.expect("estimate");

    // 600000 - 60000 - 100000 - 9000 = 431000
    assert_eq!(result.total_deductions, dec!(169000));
    assert_eq!(result.taxable_income, dec!(431000));
    // 150000 @ 5% + 131000 @ 10% = 7500 + 13100
    assert_eq!(result.tax, dec!(20600));
    assert_eq!(result.deductions.len(), 3);
}

#[tokio::test]
async fn planner_prefers_stored_brackets() {
    let repo = MemoryRepository::default();
    repo.insert_tax_bracket(2030, &TaxBracket::new(dec!(0), None, dec!(0.10)))
        .await
        .expect("store bracket");

    let planner = TaxPlanner::new(&repo, StandardAllowances::default());
    let result = planner.estimate(dec!(400000), 2030, &[]).await.expect("estimate");

    // 400000 - 60000 - 100000 = 240000 at a flat 10%
    assert_eq!(result.tax, dec!(24000));
}
