use anyhow::{Context as _, Result};
use chrono::NaiveDate;
use fin_core::FinanceRepository;
use fin_core::db::{DbConfig, RepositoryRegistry};
use fin_db_sqlite::SqliteRepositoryFactory;
use tracing::debug;

use crate::cli::Command;
use crate::commands::{self, Context};
use crate::config::AppConfig;

/// Registry with every storage backend compiled into the binary.
pub fn build_registry() -> RepositoryRegistry {
    let mut registry = RepositoryRegistry::new();
    registry.register(Box::new(SqliteRepositoryFactory));
    registry
}

pub async fn open_repository(config: &DbConfig) -> Result<Box<dyn FinanceRepository>> {
    debug!(backend = %config.backend, "connecting to database");
    build_registry().create(config).await.with_context(|| {
        format!(
            "opening {} database '{}'",
            config.backend, config.connection_string
        )
    })
}

/// Opens the configured database and runs one command, returning its output.
pub async fn run(
    command: Command,
    config: &AppConfig,
    today: NaiveDate,
) -> Result<String> {
    let repo = open_repository(&config.database).await?;
    let ctx = Context {
        repo: repo.as_ref(),
        config,
        today,
    };
    commands::execute(command, &ctx).await
}
