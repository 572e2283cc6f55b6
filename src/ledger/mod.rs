//! Incremental maintenance of category ledgers.
//!
//! Every category ledger keeps the running balance
//! `carryover[m] = carryover[m - 1] + budgeted[m] + activity[m]` across its
//! months. The operations here change one month and push the resulting delta
//! into every later month, so the balance holds without re-reading history.
//!
//! The free functions take the caller's transaction. The `Database` methods of
//! the same name run each one in its own transaction.
mod recompute;

pub use recompute::{recompute_category, verify, Drift, RecomputeReport, SkippedGroup};

use rusqlite::{ErrorCode, Transaction};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::activity::ActivityReader;
use crate::db::{self, Database, Span};
use crate::error::{LedgerError, Result};
use crate::models::{checked_amount_add, to_ledger_precision, LedgerEntry, LedgerKey};

/// What [`set_budgeted`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum BudgetChange {
    Created(LedgerEntry),
    Updated { diff: Decimal },
    Unchanged,
}

/// Create the entry for `key`.
///
/// Its carryover starts from the nearest earlier month's carryover plus
/// `budgeted` and `initial_carryover`, and every later month of the same
/// category ledger is shifted by `budgeted + initial_carryover`, so a month
/// inserted out of order is still counted by the months after it.
pub fn create_month(
    tx: &Transaction<'_>,
    key: &LedgerKey,
    budgeted: Decimal,
    initial_carryover: Decimal,
) -> Result<LedgerEntry> {
    insert_month(
        tx,
        key,
        to_ledger_precision(budgeted),
        to_ledger_precision(initial_carryover),
    )
}

/// `create_month` for amounts already at ledger precision.
fn insert_month(
    tx: &Transaction<'_>,
    key: &LedgerKey,
    budgeted: Decimal,
    initial_carryover: Decimal,
) -> Result<LedgerEntry> {
    if db::find_entry(tx, key)?.is_some() {
        return Err(LedgerError::AlreadyExists(key.clone()));
    }

    let delta = checked_amount_add(key, budgeted, initial_carryover)?;
    let prior = db::prior_carryover(tx, key)?;
    let carryover = checked_amount_add(key, prior, delta)?;
    let id = db::insert_entry(tx, key, budgeted, carryover)
        .map_err(|e| unique_violation_as_exists(e, key))?;

    let shifted = db::shift_carryover(tx, key, Span::After, delta)?;
    info!(%key, %budgeted, %initial_carryover, shifted, "created ledger month");

    db::find_entry_by_id(tx, id)?
        .ok_or(LedgerError::Store(rusqlite::Error::QueryReturnedNoRows))
}

/// Change the budgeted amount of an existing month.
///
/// The month and every later month move by the difference; earlier months
/// are never touched. A missing entry is `NotFound` and changes nothing.
pub fn update_budgeted(tx: &Transaction<'_>, key: &LedgerKey, new_budgeted: Decimal) -> Result<()> {
    let new_budgeted = to_ledger_precision(new_budgeted);
    let entry = db::find_entry(tx, key)?.ok_or_else(|| LedgerError::NotFound(key.clone()))?;

    let diff = new_budgeted
        .checked_sub(entry.budgeted)
        .ok_or_else(|| LedgerError::AmountOutOfRange(key.clone()))?;
    if diff.is_zero() {
        debug!(%key, "budgeted unchanged, skipping");
        return Ok(());
    }

    let carryover = checked_amount_add(key, entry.carryover_balance, diff)?;
    db::set_budgeted_and_carryover(tx, entry.id, new_budgeted, carryover)?;
    let shifted = db::shift_carryover(tx, key, Span::After, diff)?;
    debug!(%key, %diff, shifted, "updated budgeted");
    Ok(())
}

/// Set a month's budgeted amount, creating the month when it has no entry yet.
pub fn set_budgeted(
    tx: &Transaction<'_>,
    key: &LedgerKey,
    new_budgeted: Decimal,
) -> Result<BudgetChange> {
    let new_budgeted = to_ledger_precision(new_budgeted);
    match db::find_entry(tx, key)? {
        None => Ok(BudgetChange::Created(create_month(
            tx,
            key,
            new_budgeted,
            Decimal::ZERO,
        )?)),
        Some(entry) if entry.budgeted == new_budgeted => Ok(BudgetChange::Unchanged),
        Some(entry) => {
            let diff = new_budgeted
                .checked_sub(entry.budgeted)
                .ok_or_else(|| LedgerError::AmountOutOfRange(key.clone()))?;
            update_budgeted(tx, key, new_budgeted)?;
            Ok(BudgetChange::Updated { diff })
        }
    }
}

/// Account for a transaction of `amount` recorded in `key`'s month.
///
/// `amount` is applied as given, so it must be the amount the activity reader
/// will sum for the transaction ([`crate::models::Transaction`] keeps amounts at
/// ledger precision). Pass the negated amount when a transaction is removed.
/// The month and every later month move by `amount`. A month without an entry
/// is created with nothing budgeted, seeded with `amount` on top of the prior
/// carryover.
pub fn apply_activity(tx: &Transaction<'_>, key: &LedgerKey, amount: Decimal) -> Result<()> {
    if amount.is_zero() {
        debug!(%key, "zero activity, skipping");
        return Ok(());
    }

    if db::find_entry(tx, key)?.is_none() {
        insert_month(tx, key, Decimal::ZERO, amount)?;
        return Ok(());
    }

    let shifted = db::shift_carryover(tx, key, Span::From, amount)?;
    debug!(%key, %amount, shifted, "applied activity");
    Ok(())
}

/// Account for an edited transaction that was worth `from.1` in `from.0` and
/// is now worth `to.1` in `to.0`.
pub fn move_activity(
    tx: &Transaction<'_>,
    from: (&LedgerKey, Decimal),
    to: (&LedgerKey, Decimal),
) -> Result<()> {
    let (from_key, from_amount) = from;
    let (to_key, to_amount) = to;
    if from_key == to_key && from_amount == to_amount {
        debug!(key = %from_key, "activity unchanged, skipping");
        return Ok(());
    }
    apply_activity(tx, from_key, -from_amount)?;
    apply_activity(tx, to_key, to_amount)
}

/// Run `op` until it stops failing with `TransactionAborted`, at most
/// `attempts` times. Other errors are returned straight away.
pub fn retry_aborted<T>(attempts: u32, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Err(e) if e.is_retryable() && attempt < attempts => {
                warn!(attempt, attempts, error = %e, "transaction aborted, retrying");
                attempt += 1;
            }
            result => return result,
        }
    }
}

fn unique_violation_as_exists(err: LedgerError, key: &LedgerKey) -> LedgerError {
    match &err {
        LedgerError::Store(e) if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
            LedgerError::AlreadyExists(key.clone())
        }
        _ => err,
    }
}

impl Database {
    pub fn create_month(
        &mut self,
        key: &LedgerKey,
        budgeted: Decimal,
        initial_carryover: Decimal,
    ) -> Result<LedgerEntry> {
        self.in_transaction(|tx| create_month(tx, key, budgeted, initial_carryover))
    }

    pub fn update_budgeted(&mut self, key: &LedgerKey, new_budgeted: Decimal) -> Result<()> {
        self.in_transaction(|tx| update_budgeted(tx, key, new_budgeted))
    }

    pub fn set_budgeted(&mut self, key: &LedgerKey, new_budgeted: Decimal) -> Result<BudgetChange> {
        self.in_transaction(|tx| set_budgeted(tx, key, new_budgeted))
    }

    pub fn apply_activity(&mut self, key: &LedgerKey, amount: Decimal) -> Result<()> {
        self.in_transaction(|tx| apply_activity(tx, key, amount))
    }

    /// Rebuild every carryover from budgeted amounts and `activity`,
    /// optionally for one budget only. See [`RecomputeReport`].
    pub fn recompute_all(
        &mut self,
        activity: &dyn ActivityReader,
        budget_id: Option<&str>,
    ) -> Result<RecomputeReport> {
        recompute::recompute_all(self, activity, budget_id)
    }

    /// Rebuild one category ledger in a single transaction. Returns the
    /// number of entries whose carryover changed.
    pub fn recompute_category(
        &mut self,
        activity: &dyn ActivityReader,
        budget_id: &str,
        category_id: &str,
    ) -> Result<usize> {
        self.in_transaction(|tx| recompute_category(tx, activity, budget_id, category_id))
    }
}
