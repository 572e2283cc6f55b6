//! Monthly category ledgers for a personal budget.
//!
//! Each (budget, category, month) owns a budgeted amount and a carryover
//! balance equal to the previous month's carryover plus this month's budgeted
//! amount and transaction activity. [`ledger`] keeps that running balance true
//! as months are created and re-budgeted; [`Database::recompute_all`] rebuilds
//! it from recorded activity when the incremental path cannot be trusted.

pub mod activity;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod run;

pub use activity::{ActivityReader, TransactionTable};
pub use db::Database;
pub use error::{LedgerError, Result};
pub use models::{LedgerEntry, LedgerKey, Month};
