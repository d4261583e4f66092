pub mod calculations;
pub mod db;
pub mod models;
pub mod recurrence;

pub use db::repository::{FinanceRepository, RepositoryError};
pub use models::*;
