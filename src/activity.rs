//! The activity contract between the ledger and the transaction store.
//!
//! Activity for a ledger key is the signed sum of the amounts of every
//! transaction recorded in that budget, category and month. The engine only
//! ever reads it.
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{LedgerError, Result};
use crate::models::LedgerKey;

pub trait ActivityReader {
    /// Sum of transaction amounts for `key`, zero when there are none.
    ///
    /// `conn` is the connection of the transaction the caller is running in,
    /// so a store living in the same database sees a consistent snapshot.
    fn sum_activity(&self, conn: &Connection, key: &LedgerKey) -> Result<Decimal>;
}

/// Reads activity from the `transactions` table.
///
/// Months are matched by equality on the `YYYY-MM` prefix of the date, so
/// `2025-1` can never pick up `2025-10` through `2025-19`. Amounts are summed
/// as decimals rather than with SQLite's floating point `SUM`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionTable;

impl ActivityReader for TransactionTable {
    fn sum_activity(&self, conn: &Connection, key: &LedgerKey) -> Result<Decimal> {
        let failure = |reason: String| LedgerError::ActivityReadFailure {
            key: key.clone(),
            reason,
        };

        let mut stmt = conn
            .prepare_cached(
                "SELECT amount FROM transactions
                 WHERE budget_id = ?1 AND category_id = ?2 AND substr(date, 1, 7) = ?3",
            )
            .map_err(|e| failure(e.to_string()))?;
        let amounts = stmt
            .query_map(
                params![key.budget_id, key.category_id, key.month],
                |row| row.get::<_, String>(0),
            )
            .map_err(|e| failure(e.to_string()))?;

        let mut total = Decimal::ZERO;
        for amount in amounts {
            let amount = amount.map_err(|e| failure(e.to_string()))?;
            let amount = Decimal::from_str(&amount)
                .map_err(|e| failure(format!("bad amount \"{amount}\": {e}")))?;
            total = total
                .checked_add(amount)
                .ok_or_else(|| failure("activity total out of range".to_string()))?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use rust_decimal_macros::dec;

    use super::*;
    use crate::db::Database;
    use crate::models::Transaction;

    fn record(db: &Database, category: &str, date: &str, amount: Decimal) {
        let txn = Transaction::new(
            "b".into(),
            Some(category.into()),
            date.into(),
            String::new(),
            amount,
        );
        db.insert_transaction(&txn).unwrap();
    }

    #[test]
    fn test_no_transactions_is_zero() {
        let db = Database::open_in_memory().unwrap();
        let key = LedgerKey::parse("b", "groceries", "2025-07").unwrap();
        let total = TransactionTable.sum_activity(db.connection(), &key).unwrap();
        assert_eq!(total, Decimal::ZERO);
    }

    #[test]
    fn test_sums_signed_amounts_for_the_month() {
        let db = Database::open_in_memory().unwrap();
        record(&db, "groceries", "2025-07-01", dec!(-120.45));
        record(&db, "groceries", "2025-07-31", dec!(-10.10));
        record(&db, "groceries", "2025-07-15", dec!(25.00));
        record(&db, "groceries", "2025-08-01", dec!(-999));
        record(&db, "dining", "2025-07-10", dec!(-50));

        let key = LedgerKey::parse("b", "groceries", "2025-07").unwrap();
        let total = TransactionTable.sum_activity(db.connection(), &key).unwrap();
        assert_eq!(total, dec!(-105.55));
    }

    #[test]
    fn test_month_is_matched_exactly() {
        let db = Database::open_in_memory().unwrap();
        record(&db, "groceries", "2025-01-05", dec!(-1));
        record(&db, "groceries", "2025-10-05", dec!(-10));
        record(&db, "groceries", "2025-11-05", dec!(-100));

        let key = LedgerKey::parse("b", "groceries", "2025-01").unwrap();
        let total = TransactionTable.sum_activity(db.connection(), &key).unwrap();
        assert_eq!(total, dec!(-1));
    }

    #[test]
    fn test_other_budget_is_ignored() {
        let db = Database::open_in_memory().unwrap();
        record(&db, "groceries", "2025-07-05", dec!(-5));
        let txn = Transaction::new(
            "other".into(),
            Some("groceries".into()),
            "2025-07-05".into(),
            String::new(),
            dec!(-500),
        );
        db.insert_transaction(&txn).unwrap();

        let key = LedgerKey::parse("b", "groceries", "2025-07").unwrap();
        let total = TransactionTable.sum_activity(db.connection(), &key).unwrap();
        assert_eq!(total, dec!(-5));
    }

    #[test]
    fn test_corrupt_amount_is_a_read_failure() {
        let db = Database::open_in_memory().unwrap();
        db.connection()
            .execute(
                "INSERT INTO transactions (budget_id, category_id, date, amount, created_at)
                 VALUES ('b', 'groceries', '2025-07-02', 'twelve', '')",
                [],
            )
            .unwrap();

        let key = LedgerKey::parse("b", "groceries", "2025-07").unwrap();
        let err = TransactionTable
            .sum_activity(db.connection(), &key)
            .unwrap_err();
        assert!(matches!(err, LedgerError::ActivityReadFailure { key: ref k, .. } if *k == key));
    }

    #[test]
    fn test_total_out_of_range_is_a_read_failure() {
        let db = Database::open_in_memory().unwrap();
        for date in ["2025-07-01", "2025-07-02"] {
            db.connection()
                .execute(
                    "INSERT INTO transactions (budget_id, category_id, date, amount, created_at)
                     VALUES ('b', 'groceries', ?1, ?2, '')",
                    params![date, Decimal::MAX.to_string()],
                )
                .unwrap();
        }

        let key = LedgerKey::parse("b", "groceries", "2025-07").unwrap();
        let err = TransactionTable
            .sum_activity(db.connection(), &key)
            .unwrap_err();
        assert!(matches!(err, LedgerError::ActivityReadFailure { .. }));
    }
}
