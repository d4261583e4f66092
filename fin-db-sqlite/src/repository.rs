use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use fin_core::calculations::income::year_bounds;
use fin_core::{
    FinanceRepository, Frequency, NewRecurrenceRule, NewTaxDeduction, NewTransaction,
    RecurrenceRule, RepositoryError, TaxBracket, TaxDeduction, Transaction, TransactionKind,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;
use tracing::debug;

use crate::decimal::{decimal_to_text, get_decimal, get_optional_decimal};

const TRANSACTION_COLUMNS: &str = "id, account_id, category_id, kind, amount_original,
    currency_code, amount_base, rate_used, merchant, note, occurred_at, created_at";

const RULE_COLUMNS: &str = "id, account_id, category_id, kind, amount, currency_code,
    merchant, note, frequency, start_date, day_of_month, day_of_week, end_date,
    next_occurrence, is_active, created_at, updated_at";

const DEDUCTION_COLUMNS: &str = "id, tax_year, name, category, amount, cap_amount,
    cap_percent, description, created_at, updated_at";

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Opens `database_url`, creating the file if needed.
    ///
    /// Accepts a bare path (`finance.db`), a `sqlite:` URL, or `:memory:`.
    /// In-memory databases get a single connection so every query sees the
    /// same data.
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database location: {database_url}"))?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = database_url.contains(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to database: {database_url}"))?;

        debug!(database_url, in_memory, "opened sqlite database");
        Ok(Self { pool })
    }

    pub async fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Load and execute all SQL seed files from the specified directory.
    /// Files are executed in alphabetical order by filename. A missing
    /// directory is not an error.
    pub async fn run_seeds(
        &self,
        seeds_dir: &Path,
    ) -> Result<()> {
        if !seeds_dir.is_dir() {
            debug!(seeds_dir = %seeds_dir.display(), "no seeds directory");
            return Ok(());
        }

        let mut entries: Vec<_> = std::fs::read_dir(seeds_dir)
            .with_context(|| format!("Failed to read seeds directory '{}'", seeds_dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "sql"))
            .collect();

        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let sql = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read seed file '{}'", path.display()))?;

            sqlx::raw_sql(&sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to execute seed file '{}'", path.display()))?;
            debug!(seed = %path.display(), "applied seed file");
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn db_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Database(e.to_string())
}

fn get<'r, T>(
    row: &'r SqliteRow,
    column: &str,
) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column)
        .map_err(|e| RepositoryError::Database(format!("Failed to get {column}: {e}")))
}

fn get_day(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<u32>, RepositoryError> {
    get::<Option<i64>>(row, column)?
        .map(|day| {
            u32::try_from(day)
                .map_err(|_| RepositoryError::Database(format!("Invalid {column}: {day}")))
        })
        .transpose()
}

fn get_kind(row: &SqliteRow) -> Result<TransactionKind, RepositoryError> {
    let kind: String = get(row, "kind")?;
    TransactionKind::parse(&kind)
        .ok_or_else(|| RepositoryError::Database(format!("Invalid transaction kind: {kind}")))
}

fn row_to_bracket(row: &SqliteRow) -> Result<TaxBracket, RepositoryError> {
    Ok(TaxBracket {
        min_income: get_decimal(row, "min_income")?,
        max_income: get_optional_decimal(row, "max_income")?,
        tax_rate: get_decimal(row, "tax_rate")?,
    })
}

fn row_to_deduction(row: &SqliteRow) -> Result<TaxDeduction, RepositoryError> {
    Ok(TaxDeduction {
        id: get(row, "id")?,
        tax_year: get(row, "tax_year")?,
        name: get(row, "name")?,
        category: get(row, "category")?,
        amount: get_optional_decimal(row, "amount")?,
        cap_amount: get_optional_decimal(row, "cap_amount")?,
        cap_percent: get_optional_decimal(row, "cap_percent")?,
        description: get(row, "description")?,
        created_at: get::<DateTime<Utc>>(row, "created_at")?,
        updated_at: get::<DateTime<Utc>>(row, "updated_at")?,
    })
}

fn row_to_transaction(row: &SqliteRow) -> Result<Transaction, RepositoryError> {
    Ok(Transaction {
        id: get(row, "id")?,
        account_id: get(row, "account_id")?,
        category_id: get(row, "category_id")?,
        kind: get_kind(row)?,
        amount_original: get_decimal(row, "amount_original")?,
        currency_code: get(row, "currency_code")?,
        amount_base: get_decimal(row, "amount_base")?,
        rate_used: get_decimal(row, "rate_used")?,
        merchant: get(row, "merchant")?,
        note: get(row, "note")?,
        occurred_at: get::<NaiveDate>(row, "occurred_at")?,
        created_at: get::<DateTime<Utc>>(row, "created_at")?,
    })
}

fn row_to_rule(row: &SqliteRow) -> Result<RecurrenceRule, RepositoryError> {
    let frequency: String = get(row, "frequency")?;
    Ok(RecurrenceRule {
        id: get(row, "id")?,
        account_id: get(row, "account_id")?,
        category_id: get(row, "category_id")?,
        kind: get_kind(row)?,
        amount: get_decimal(row, "amount")?,
        currency_code: get(row, "currency_code")?,
        merchant: get(row, "merchant")?,
        note: get(row, "note")?,
        frequency: Frequency::parse(&frequency)
            .ok_or_else(|| RepositoryError::Database(format!("Invalid frequency: {frequency}")))?,
        start_date: get::<NaiveDate>(row, "start_date")?,
        day_of_month: get_day(row, "day_of_month")?,
        day_of_week: get_day(row, "day_of_week")?,
        end_date: get::<Option<NaiveDate>>(row, "end_date")?,
        next_occurrence: get::<NaiveDate>(row, "next_occurrence")?,
        is_active: get(row, "is_active")?,
        created_at: get::<DateTime<Utc>>(row, "created_at")?,
        updated_at: get::<DateTime<Utc>>(row, "updated_at")?,
    })
}

fn expect_one_row(rows_affected: u64) -> Result<(), RepositoryError> {
    if rows_affected == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Inserts on `conn` so callers can run it inside a transaction.
async fn insert_transaction_on(
    conn: &mut SqliteConnection,
    transaction: &NewTransaction,
) -> Result<Transaction, RepositoryError> {
    let result = sqlx::query(
        "INSERT INTO transactions (
            account_id, category_id, kind, amount_original, currency_code,
            amount_base, rate_used, merchant, note, occurred_at, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(transaction.account_id)
    .bind(transaction.category_id)
    .bind(transaction.kind.as_str())
    .bind(decimal_to_text(transaction.amount_original))
    .bind(&transaction.currency_code)
    .bind(decimal_to_text(transaction.amount_base))
    .bind(decimal_to_text(transaction.rate_used))
    .bind(&transaction.merchant)
    .bind(&transaction.note)
    .bind(transaction.occurred_at)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;

    let row = sqlx::query(&format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?"))
        .bind(result.last_insert_rowid())
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error)?;

    row_to_transaction(&row)
}

#[async_trait]
impl FinanceRepository for SqliteRepository {
    async fn get_tax_brackets(
        &self,
        tax_year: i32,
    ) -> Result<Vec<TaxBracket>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT min_income, max_income, tax_rate
             FROM tax_brackets
             WHERE tax_year = ?
             ORDER BY CAST(min_income AS REAL)",
        )
        .bind(tax_year)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(row_to_bracket).collect()
    }

    async fn list_bracket_years(&self) -> Result<Vec<i32>, RepositoryError> {
        let rows = sqlx::query("SELECT DISTINCT tax_year FROM tax_brackets ORDER BY tax_year")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        rows.iter().map(|row| get(row, "tax_year")).collect()
    }

    async fn insert_tax_bracket(
        &self,
        tax_year: i32,
        bracket: &TaxBracket,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO tax_brackets (tax_year, min_income, max_income, tax_rate)
             VALUES (?, ?, ?, ?)",
        )
        .bind(tax_year)
        .bind(decimal_to_text(bracket.min_income))
        .bind(bracket.max_income.map(decimal_to_text))
        .bind(decimal_to_text(bracket.tax_rate))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn delete_tax_brackets(
        &self,
        tax_year: i32,
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM tax_brackets WHERE tax_year = ?")
            .bind(tax_year)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(())
    }

    async fn create_deduction(
        &self,
        deduction: NewTaxDeduction,
    ) -> Result<TaxDeduction, RepositoryError> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO tax_deductions (
                tax_year, name, category, amount, cap_amount, cap_percent,
                description, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(deduction.tax_year)
        .bind(&deduction.name)
        .bind(&deduction.category)
        .bind(deduction.amount.map(decimal_to_text))
        .bind(deduction.cap_amount.map(decimal_to_text))
        .bind(deduction.cap_percent.map(decimal_to_text))
        .bind(&deduction.description)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        self.get_deduction(result.last_insert_rowid()).await
    }

    async fn get_deduction(
        &self,
        id: i64,
    ) -> Result<TaxDeduction, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {DEDUCTION_COLUMNS} FROM tax_deductions WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or(RepositoryError::NotFound)?;

        row_to_deduction(&row)
    }

    async fn list_deductions(
        &self,
        tax_year: i32,
    ) -> Result<Vec<TaxDeduction>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {DEDUCTION_COLUMNS} FROM tax_deductions WHERE tax_year = ? ORDER BY id"
        ))
        .bind(tax_year)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(row_to_deduction).collect()
    }

    async fn delete_deduction(
        &self,
        id: i64,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM tax_deductions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        expect_one_row(result.rows_affected())
    }

    async fn insert_transaction(
        &self,
        transaction: &NewTransaction,
    ) -> Result<Transaction, RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        insert_transaction_on(&mut conn, transaction).await
    }

    async fn list_transactions(
        &self,
        year: Option<i32>,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let rows = match year {
            Some(year) => {
                let Some((start, end)) = year_bounds(year) else {
                    return Ok(Vec::new());
                };
                sqlx::query(&format!(
                    "SELECT {TRANSACTION_COLUMNS} FROM transactions
                     WHERE occurred_at BETWEEN ? AND ?
                     ORDER BY occurred_at DESC, id DESC"
                ))
                .bind(start)
                .bind(end)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {TRANSACTION_COLUMNS} FROM transactions
                     ORDER BY occurred_at DESC, id DESC"
                ))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(db_error)?;

        rows.iter().map(row_to_transaction).collect()
    }

    async fn create_recurrence_rule(
        &self,
        rule: &NewRecurrenceRule,
        next_occurrence: NaiveDate,
    ) -> Result<RecurrenceRule, RepositoryError> {
        let now = Utc::now();
        let currency = rule
            .currency_code
            .as_deref()
            .unwrap_or(fin_core::DEFAULT_CURRENCY);

        let result = sqlx::query(
            "INSERT INTO recurring_transactions (
                account_id, category_id, kind, amount, currency_code, merchant, note,
                frequency, start_date, day_of_month, day_of_week, end_date,
                next_occurrence, is_active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(rule.account_id)
        .bind(rule.category_id)
        .bind(rule.kind.as_str())
        .bind(decimal_to_text(rule.amount))
        .bind(currency)
        .bind(&rule.merchant)
        .bind(&rule.note)
        .bind(rule.frequency.as_str())
        .bind(rule.start_date)
        .bind(rule.day_of_month.map(i64::from))
        .bind(rule.day_of_week.map(i64::from))
        .bind(rule.end_date)
        .bind(next_occurrence)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        self.get_recurrence_rule(result.last_insert_rowid()).await
    }

    async fn get_recurrence_rule(
        &self,
        id: i64,
    ) -> Result<RecurrenceRule, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {RULE_COLUMNS} FROM recurring_transactions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or(RepositoryError::NotFound)?;

        row_to_rule(&row)
    }

    async fn list_recurrence_rules(&self) -> Result<Vec<RecurrenceRule>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {RULE_COLUMNS} FROM recurring_transactions ORDER BY next_occurrence, id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(row_to_rule).collect()
    }

    async fn list_due_recurrence_rules(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<RecurrenceRule>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {RULE_COLUMNS} FROM recurring_transactions
             WHERE is_active = 1 AND next_occurrence <= ?
             ORDER BY next_occurrence, id"
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(row_to_rule).collect()
    }

    async fn set_recurrence_active(
        &self,
        id: i64,
        is_active: bool,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE recurring_transactions SET is_active = ?, updated_at = ? WHERE id = ?",
        )
        .bind(is_active)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        expect_one_row(result.rows_affected())
    }

    async fn fire_recurrence(
        &self,
        id: i64,
        transaction: &NewTransaction,
        next_occurrence: NaiveDate,
    ) -> Result<Transaction, RepositoryError> {
        // Dropping `tx` without commit rolls both statements back.
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let result = sqlx::query(
            "UPDATE recurring_transactions SET next_occurrence = ?, updated_at = ? WHERE id = ?",
        )
        .bind(next_occurrence)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        expect_one_row(result.rows_affected())?;

        let created = insert_transaction_on(&mut tx, transaction).await?;

        tx.commit().await.map_err(db_error)?;
        Ok(created)
    }

    async fn delete_recurrence_rule(
        &self,
        id: i64,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM recurring_transactions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        expect_one_row(result.rows_affected())
    }
}
