//! Tax calculations and the helpers around them.
//!
//! The calculators here are pure: they take explicit bracket tables and
//! deduction lists and never touch storage. [`planner`] is the one place
//! that gathers inputs from a repository before calculating.

pub mod common;
pub mod deductions;
pub mod income;
pub mod planner;
pub mod thai_tax;

pub use deductions::{
    DEDUCTION_CATEGORIES, DeductionCategory, StandardAllowances, find_category, merge_deductions,
};
pub use planner::TaxPlanner;
pub use thai_tax::{
    BracketTableError, ThaiTaxCalculator, apply_deduction_cap, calculate_tax, default_th_brackets,
    validate_bracket_table,
};
