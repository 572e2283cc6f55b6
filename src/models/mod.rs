mod entry;
mod month;
mod transaction;

pub use entry::{checked_amount_add, to_ledger_precision, LedgerEntry, LedgerKey, LEDGER_SCALE};
pub use month::Month;
pub use transaction::Transaction;
