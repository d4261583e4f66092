use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{
    NewRecurrenceRule, NewTaxDeduction, NewTransaction, RecurrenceRule, TaxBracket, TaxDeduction,
    Transaction,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

#[async_trait]
pub trait FinanceRepository: Send + Sync {
    // Tax brackets
    async fn get_tax_brackets(&self, tax_year: i32) -> Result<Vec<TaxBracket>, RepositoryError>;
    async fn list_bracket_years(&self) -> Result<Vec<i32>, RepositoryError>;
    async fn insert_tax_bracket(
        &self,
        tax_year: i32,
        bracket: &TaxBracket,
    ) -> Result<(), RepositoryError>;
    async fn delete_tax_brackets(&self, tax_year: i32) -> Result<(), RepositoryError>;

    // Recorded deductions
    async fn create_deduction(
        &self,
        deduction: NewTaxDeduction,
    ) -> Result<TaxDeduction, RepositoryError>;
    async fn get_deduction(&self, id: i64) -> Result<TaxDeduction, RepositoryError>;
    async fn list_deductions(&self, tax_year: i32) -> Result<Vec<TaxDeduction>, RepositoryError>;
    async fn delete_deduction(&self, id: i64) -> Result<(), RepositoryError>;

    // Transactions
    async fn insert_transaction(
        &self,
        transaction: &NewTransaction,
    ) -> Result<Transaction, RepositoryError>;
    async fn list_transactions(
        &self,
        year: Option<i32>,
    ) -> Result<Vec<Transaction>, RepositoryError>;

    // Recurrence rules
    async fn create_recurrence_rule(
        &self,
        rule: &NewRecurrenceRule,
        next_occurrence: NaiveDate,
    ) -> Result<RecurrenceRule, RepositoryError>;
    async fn get_recurrence_rule(&self, id: i64) -> Result<RecurrenceRule, RepositoryError>;
    /// All rules, soonest `next_occurrence` first.
    async fn list_recurrence_rules(&self) -> Result<Vec<RecurrenceRule>, RepositoryError>;
    /// Active rules with `next_occurrence <= today`.
    async fn list_due_recurrence_rules(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<RecurrenceRule>, RepositoryError>;
    async fn set_recurrence_active(&self, id: i64, is_active: bool)
    -> Result<(), RepositoryError>;
    /// Records `transaction` and moves rule `id` to `next_occurrence` as one
    /// unit: either both are stored or neither is.
    async fn fire_recurrence(
        &self,
        id: i64,
        transaction: &NewTransaction,
        next_occurrence: NaiveDate,
    ) -> Result<Transaction, RepositoryError>;
    async fn delete_recurrence_rule(&self, id: i64) -> Result<(), RepositoryError>;
}
