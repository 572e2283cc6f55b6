use rusqlite::{Connection, Transaction};
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::activity::ActivityReader;
use crate::db::{self, Database};
use crate::error::{LedgerError, Result};
use crate::models::{checked_amount_add, to_ledger_precision, LedgerEntry, LedgerKey};

/// A category ledger the recompute could not rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedGroup {
    pub budget_id: String,
    pub category_id: String,
    pub reason: String,
}

/// Outcome of [`Database::recompute_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecomputeReport {
    /// Category ledgers rebuilt and committed.
    pub groups_recomputed: usize,
    /// Entries whose stored carryover differed and was rewritten.
    pub entries_changed: usize,
    /// Ledgers left as they were because their activity could not be read.
    pub skipped: Vec<SkippedGroup>,
}

impl RecomputeReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// An entry whose stored carryover disagrees with its replayed value.
#[derive(Debug, Clone, PartialEq)]
pub struct Drift {
    pub key: LedgerKey,
    pub stored: Decimal,
    pub expected: Decimal,
}

/// Replay one category ledger oldest month first, pairing every entry with
/// the carryover it should hold.
///
/// The running sum is kept at full precision; only the value paired with each
/// entry is rounded.
fn replay(
    conn: &Connection,
    activity: &dyn ActivityReader,
    budget_id: &str,
    category_id: &str,
) -> Result<Vec<(LedgerEntry, Decimal)>> {
    let mut carry = Decimal::ZERO;
    db::list_entries(conn, budget_id, category_id)?
        .into_iter()
        .map(|entry| -> Result<(LedgerEntry, Decimal)> {
            let key = entry.key();
            let month_activity = activity.sum_activity(conn, &key)?;
            let month_total = checked_amount_add(&key, entry.budgeted, month_activity)?;
            carry = checked_amount_add(&key, carry, month_total)?;
            Ok((entry, to_ledger_precision(carry)))
        })
        .collect()
}

/// Rebuild one category ledger inside the caller's transaction. Returns the
/// number of entries rewritten.
pub fn recompute_category(
    tx: &Transaction<'_>,
    activity: &dyn ActivityReader,
    budget_id: &str,
    category_id: &str,
) -> Result<usize> {
    let mut changed = 0;
    for (entry, expected) in replay(tx, activity, budget_id, category_id)? {
        if entry.carryover_balance != expected {
            db::set_carryover(tx, entry.id, expected)?;
            changed += 1;
        }
    }
    Ok(changed)
}

/// Each category ledger is rebuilt and committed in its own transaction.
///
/// A ledger whose activity cannot be read is rolled back, logged and listed in
/// the report, and the run moves on. Any other failure stops the run: ledgers
/// committed before it stay rebuilt, later ones are untouched.
pub(super) fn recompute_all(
    db: &mut Database,
    activity: &dyn ActivityReader,
    budget_id: Option<&str>,
) -> Result<RecomputeReport> {
    let mut report = RecomputeReport::default();

    for (budget, category) in db.get_groups(budget_id)? {
        let tx = db.begin()?;
        match recompute_category(&tx, activity, &budget, &category) {
            Ok(changed) => {
                tx.commit()?;
                report.groups_recomputed += 1;
                report.entries_changed += changed;
            }
            Err(LedgerError::ActivityReadFailure { key, reason }) => {
                drop(tx);
                warn!(
                    budget_id = %budget,
                    category_id = %category,
                    %key,
                    %reason,
                    "activity unreadable, ledger skipped and left stale"
                );
                report.skipped.push(SkippedGroup {
                    budget_id: budget,
                    category_id: category,
                    reason: format!("{key}: {reason}"),
                });
            }
            Err(e) => {
                error!(
                    budget_id = %budget,
                    category_id = %category,
                    error = %e,
                    "recompute stopped"
                );
                return Err(e);
            }
        }
    }

    info!(
        groups = report.groups_recomputed,
        changed = report.entries_changed,
        skipped = report.skipped.len(),
        "recompute finished"
    );
    Ok(report)
}

/// Every entry whose carryover differs from what a recompute would write.
/// Nothing is changed.
pub fn verify(
    conn: &Connection,
    activity: &dyn ActivityReader,
    budget_id: Option<&str>,
) -> Result<Vec<Drift>> {
    let mut drifts = Vec::new();
    for (budget, category) in db::list_groups(conn, budget_id)? {
        for (entry, expected) in replay(conn, activity, &budget, &category)? {
            if entry.carryover_balance != expected {
                drifts.push(Drift {
                    key: entry.key(),
                    stored: entry.carryover_balance,
                    expected,
                });
            }
        }
    }
    Ok(drifts)
}

#[cfg(test)]
mod tests;
