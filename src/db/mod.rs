mod schema;

use anyhow::Context;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Result;
use crate::models::*;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path, busy_timeout: Duration) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to set database pragmas")?;
        conn.busy_timeout(busy_timeout)
            .context("Failed to set busy timeout")?;
        let mut db = Self { conn };
        db.migrate().context("Database migration failed")?;
        Ok(db)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&mut self) -> anyhow::Result<()> {
        let has_version_table: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;

        if !has_version_table {
            // Fresh database - apply full schema
            self.conn.execute_batch(schema::SCHEMA_V1)?;
            self.conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::CURRENT_VERSION],
            )?;
            return Ok(());
        }

        let current: i32 = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?
            .unwrap_or(0);

        for &(from_version, sql) in schema::MIGRATIONS {
            if current <= from_version {
                self.conn.execute_batch(sql)?;
            }
        }

        if current < schema::CURRENT_VERSION {
            self.conn.execute(
                "UPDATE schema_version SET version = ?1",
                params![schema::CURRENT_VERSION],
            )?;
        }

        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Begin a write transaction.
    ///
    /// The write lock is taken at `BEGIN`, so the whole read-modify-propagate
    /// sequence of an operation runs without another writer interleaving.
    /// Dropping the transaction without committing rolls it back.
    pub fn begin(&mut self) -> Result<rusqlite::Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    /// Run `op` inside its own write transaction, committing on success.
    pub fn in_transaction<T>(
        &mut self,
        op: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let tx = self.begin()?;
        let value = op(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    // ── Ledger entries ────────────────────────────────────────

    pub fn get_entry(&self, key: &LedgerKey) -> Result<Option<LedgerEntry>> {
        find_entry(&self.conn, key)
    }

    /// All months of one category ledger, oldest first.
    pub fn get_entries(&self, budget_id: &str, category_id: &str) -> Result<Vec<LedgerEntry>> {
        list_entries(&self.conn, budget_id, category_id)
    }

    /// Every (budget, category) pair that has at least one ledger entry.
    pub fn get_groups(&self, budget_id: Option<&str>) -> Result<Vec<(String, String)>> {
        list_groups(&self.conn, budget_id)
    }

    /// The carryover at the end of `month`, carried forward from the latest
    /// earlier month when `month` itself has no entry.
    pub fn carryover_as_of(
        &self,
        budget_id: &str,
        category_id: &str,
        month: &Month,
    ) -> Result<Decimal> {
        let carryover = self
            .conn
            .query_row(
                "SELECT carryover_balance FROM monthly_ledger
                 WHERE budget_id = ?1 AND category_id = ?2 AND month <= ?3
                 ORDER BY month DESC LIMIT 1",
                params![budget_id, category_id, month],
                |row| decimal_column(row, 0),
            )
            .optional()?;
        Ok(carryover.unwrap_or_default())
    }

    // ── Transactions ──────────────────────────────────────────

    pub fn insert_transaction(&self, txn: &Transaction) -> Result<i64> {
        insert_transaction(&self.conn, txn)
    }
}

/// Which later rows a carryover shift touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Span {
    /// Months strictly after the key's month.
    After,
    /// The key's month and every later one.
    From,
}

pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub(crate) fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let s: String = row.get(idx)?;
    Decimal::from_str(&s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<LedgerEntry> {
    Ok(LedgerEntry {
        id: row.get(0)?,
        budget_id: row.get(1)?,
        category_id: row.get(2)?,
        month: row.get(3)?,
        budgeted: decimal_column(row, 4)?,
        carryover_balance: decimal_column(row, 5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

pub(crate) fn find_entry(conn: &Connection, key: &LedgerKey) -> Result<Option<LedgerEntry>> {
    let entry = conn
        .query_row(
            "SELECT id, budget_id, category_id, month, budgeted, carryover_balance, created_at, updated_at
             FROM monthly_ledger
             WHERE budget_id = ?1 AND category_id = ?2 AND month = ?3",
            params![key.budget_id, key.category_id, key.month],
            entry_from_row,
        )
        .optional()?;
    Ok(entry)
}

pub(crate) fn find_entry_by_id(conn: &Connection, id: i64) -> Result<Option<LedgerEntry>> {
    let entry = conn
        .query_row(
            "SELECT id, budget_id, category_id, month, budgeted, carryover_balance, created_at, updated_at
             FROM monthly_ledger WHERE id = ?1",
            params![id],
            entry_from_row,
        )
        .optional()?;
    Ok(entry)
}

pub(crate) fn list_entries(
    conn: &Connection,
    budget_id: &str,
    category_id: &str,
) -> Result<Vec<LedgerEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, budget_id, category_id, month, budgeted, carryover_balance, created_at, updated_at
         FROM monthly_ledger
         WHERE budget_id = ?1 AND category_id = ?2
         ORDER BY month",
    )?;
    let rows = stmt.query_map(params![budget_id, category_id], entry_from_row)?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub(crate) fn list_groups(
    conn: &Connection,
    budget_id: Option<&str>,
) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT budget_id, category_id FROM monthly_ledger
         WHERE ?1 IS NULL OR budget_id = ?1
         ORDER BY budget_id, category_id",
    )?;
    let rows = stmt.query_map(params![budget_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Carryover of the nearest month strictly before `key.month`, or zero.
pub(crate) fn prior_carryover(conn: &Connection, key: &LedgerKey) -> Result<Decimal> {
    let carryover = conn
        .query_row(
            "SELECT carryover_balance FROM monthly_ledger
             WHERE budget_id = ?1 AND category_id = ?2 AND month < ?3
             ORDER BY month DESC LIMIT 1",
            params![key.budget_id, key.category_id, key.month],
            |row| decimal_column(row, 0),
        )
        .optional()?;
    Ok(carryover.unwrap_or_default())
}

pub(crate) fn insert_entry(
    conn: &Connection,
    key: &LedgerKey,
    budgeted: Decimal,
    carryover: Decimal,
) -> Result<i64> {
    let ts = now();
    conn.execute(
        "INSERT INTO monthly_ledger (budget_id, category_id, month, budgeted, carryover_balance, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            key.budget_id,
            key.category_id,
            key.month,
            budgeted.to_string(),
            carryover.to_string(),
            ts,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn set_budgeted_and_carryover(
    conn: &Connection,
    id: i64,
    budgeted: Decimal,
    carryover: Decimal,
) -> Result<()> {
    conn.execute(
        "UPDATE monthly_ledger SET budgeted = ?1, carryover_balance = ?2, updated_at = ?3
         WHERE id = ?4",
        params![budgeted.to_string(), carryover.to_string(), now(), id],
    )?;
    Ok(())
}

pub(crate) fn set_carryover(conn: &Connection, id: i64, carryover: Decimal) -> Result<()> {
    conn.execute(
        "UPDATE monthly_ledger SET carryover_balance = ?1, updated_at = ?2 WHERE id = ?3",
        params![carryover.to_string(), now(), id],
    )?;
    Ok(())
}

/// Add `delta` to the carryover of every month in `span` of the key's
/// category ledger. Returns the number of rows changed.
pub(crate) fn shift_carryover(
    conn: &Connection,
    key: &LedgerKey,
    span: Span,
    delta: Decimal,
) -> Result<usize> {
    if delta.is_zero() {
        return Ok(0);
    }
    let sql = match span {
        Span::After => {
            "SELECT id, carryover_balance FROM monthly_ledger
             WHERE budget_id = ?1 AND category_id = ?2 AND month > ?3
             ORDER BY month"
        }
        Span::From => {
            "SELECT id, carryover_balance FROM monthly_ledger
             WHERE budget_id = ?1 AND category_id = ?2 AND month >= ?3
             ORDER BY month"
        }
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(
            params![key.budget_id, key.category_id, key.month],
            |row| Ok((row.get::<_, i64>(0)?, decimal_column(row, 1)?)),
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for &(id, carryover) in &rows {
        set_carryover(conn, id, checked_amount_add(key, carryover, delta)?)?;
    }
    Ok(rows.len())
}

pub(crate) fn insert_transaction(conn: &Connection, txn: &Transaction) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions (budget_id, category_id, date, description, amount, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            txn.budget_id,
            txn.category_id,
            txn.date,
            txn.description,
            to_ledger_precision(txn.amount).to_string(),
            txn.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}
