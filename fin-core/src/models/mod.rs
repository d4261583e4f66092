mod deduction;
mod recurrence_rule;
mod tax_bracket;
mod tax_result;
mod transaction;

pub use deduction::{AppliedDeduction, DeductionInput, NewTaxDeduction, TaxDeduction};
pub use recurrence_rule::{Frequency, NewRecurrenceRule, RecurrenceRule};
pub use tax_bracket::TaxBracket;
pub use tax_result::TaxResult;
pub use transaction::{DEFAULT_CURRENCY, NewTransaction, Transaction, TransactionKind};
