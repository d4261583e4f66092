use std::collections::BTreeMap;
use std::io::Read;

use fin_core::calculations::{BracketTableError, validate_bracket_table};
use fin_core::{FinanceRepository, RepositoryError, TaxBracket};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur when loading tax bracket data.
#[derive(Debug, Error)]
pub enum BracketLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Invalid bracket table for {tax_year}: {source}")]
    InvalidTable {
        tax_year: i32,
        #[source]
        source: BracketTableError,
    },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<csv::Error> for BracketLoaderError {
    fn from(err: csv::Error) -> Self {
        BracketLoaderError::CsvParse(err.to_string())
    }
}

/// A single row of a bracket CSV file.
///
/// - `tax_year`: the tax year (e.g., 2025)
/// - `min_income`: lower bound of the bracket
/// - `max_income`: upper bound, empty for the top bracket
/// - `rate`: marginal rate as a fraction (e.g., 0.05 for 5%)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BracketRecord {
    pub tax_year: i32,
    pub min_income: Decimal,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub max_income: Option<Decimal>,
    pub rate: Decimal,
}

impl BracketRecord {
    fn to_bracket(&self) -> TaxBracket {
        TaxBracket::new(self.min_income, self.max_income, self.rate)
    }
}

fn deserialize_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<Decimal>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Loads bracket tables from CSV through any [`FinanceRepository`].
pub struct BracketLoader;

impl BracketLoader {
    /// Parse bracket records from a CSV reader.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<BracketRecord>, BracketLoaderError> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: BracketRecord = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Groups records by year, each year's brackets sorted by `min_income`.
    pub fn tables(records: &[BracketRecord]) -> BTreeMap<i32, Vec<TaxBracket>> {
        let mut tables: BTreeMap<i32, Vec<TaxBracket>> = BTreeMap::new();
        for record in records {
            tables.entry(record.tax_year).or_default().push(record.to_bracket());
        }
        for brackets in tables.values_mut() {
            brackets.sort_by(|a, b| a.min_income.cmp(&b.min_income));
        }
        tables
    }

    /// Replace the bracket table of every year present in `records`.
    ///
    /// Every year is validated before anything is written, so a bad table
    /// leaves the database untouched. Loading the same file twice gives the
    /// same result. Returns the number of brackets inserted.
    pub async fn load<R: FinanceRepository + ?Sized>(
        repo: &R,
        records: &[BracketRecord],
    ) -> Result<usize, BracketLoaderError> {
        let tables = Self::tables(records);

        for (&tax_year, brackets) in &tables {
            validate_bracket_table(brackets)
                .map_err(|source| BracketLoaderError::InvalidTable { tax_year, source })?;
        }

        let mut inserted = 0;
        for (tax_year, brackets) in tables {
            repo.delete_tax_brackets(tax_year).await?;
            for bracket in &brackets {
                repo.insert_tax_bracket(tax_year, bracket).await?;
                inserted += 1;
            }
            debug!(tax_year, brackets = brackets.len(), "replaced bracket table");
        }

        info!(inserted, "loaded tax brackets");
        Ok(inserted)
    }
}
