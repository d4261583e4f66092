//! Bulk loading of reference data such as tax bracket tables.

mod loader;

pub use loader::{BracketLoader, BracketLoaderError, BracketRecord};
