#![allow(clippy::unwrap_used)]

use rust_decimal_macros::dec;

use super::*;
use crate::activity::TransactionTable;
use crate::models::Transaction;

fn key(budget: &str, category: &str, month: &str) -> LedgerKey {
    LedgerKey::parse(budget, category, month).unwrap()
}

fn record(db: &Database, budget: &str, category: &str, date: &str, amount: Decimal) {
    let txn = Transaction::new(
        budget.into(),
        Some(category.into()),
        date.into(),
        String::new(),
        amount,
    );
    db.insert_transaction(&txn).unwrap();
}

/// Insert an amount exactly as given, bypassing the rounding `Transaction`
/// applies. Transaction stores outside this crate may keep sub-cent amounts.
fn record_raw(db: &Database, budget: &str, category: &str, date: &str, amount: &str) {
    db.connection()
        .execute(
            "INSERT INTO transactions (budget_id, category_id, date, amount, created_at)
             VALUES (?1, ?2, ?3, ?4, '')",
            rusqlite::params![budget, category, date, amount],
        )
        .unwrap();
}

fn carryovers(db: &Database, budget: &str, category: &str) -> Vec<Decimal> {
    db.get_entries(budget, category)
        .unwrap()
        .into_iter()
        .map(|e| e.carryover_balance)
        .collect()
}

/// Reports a read failure for one category and defers to the transaction
/// table for every other.
struct UnreadableCategory(&'static str);

impl ActivityReader for UnreadableCategory {
    fn sum_activity(&self, conn: &Connection, key: &LedgerKey) -> Result<Decimal> {
        if key.category_id == self.0 {
            return Err(LedgerError::ActivityReadFailure {
                key: key.clone(),
                reason: "activity store offline".into(),
            });
        }
        TransactionTable.sum_activity(conn, key)
    }
}

/// Fails with a store-level error for one category.
struct BrokenStore(&'static str);

impl ActivityReader for BrokenStore {
    fn sum_activity(&self, conn: &Connection, key: &LedgerKey) -> Result<Decimal> {
        if key.category_id == self.0 {
            return Err(LedgerError::Store(rusqlite::Error::InvalidQuery));
        }
        TransactionTable.sum_activity(conn, key)
    }
}

#[test]
fn test_recompute_rebuilds_the_fixture_from_activity() {
    let mut db = Database::open_in_memory().unwrap();
    for (month, budgeted) in [
        ("2025-05", dec!(1000)),
        ("2025-06", dec!(2500)),
        ("2025-07", dec!(2000)),
        ("2025-08", dec!(1000)),
    ] {
        // Stale carryovers that ignore activity entirely.
        db::insert_entry(db.connection(), &key("b", "groceries", month), budgeted, budgeted).unwrap();
    }
    record(&db, "b", "groceries", "2025-05-12", dec!(-1000));
    record(&db, "b", "groceries", "2025-06-03", dec!(-2000));
    record(&db, "b", "groceries", "2025-06-28", dec!(-500));
    record(&db, "b", "groceries", "2025-07-19", dec!(-7000));
    record(&db, "b", "groceries", "2025-08-01", dec!(4500));

    let report = db.recompute_all(&TransactionTable, None).unwrap();
    assert_eq!(
        report,
        RecomputeReport {
            groups_recomputed: 1,
            entries_changed: 4,
            skipped: vec![],
        }
    );
    assert_eq!(
        carryovers(&db, "b", "groceries"),
        vec![dec!(0), dec!(0), dec!(-5000), dec!(500)]
    );
}

#[test]
fn test_recompute_agrees_with_incremental_maintenance() {
    let mut db = Database::open_in_memory().unwrap();
    let plan = [
        ("2025-03", dec!(400), "2025-03-09", dec!(-120.40)),
        ("2025-01", dec!(250), "2025-01-21", dec!(-75.25)),
        ("2025-02", dec!(300), "2025-02-14", dec!(-310.00)),
        ("2025-04", dec!(0), "2025-04-02", dec!(18.60)),
    ];
    for (month, budgeted, date, amount) in plan {
        let k = key("b", "utilities", month);
        db.create_month(&k, budgeted, Decimal::ZERO).unwrap();
        record(&db, "b", "utilities", date, amount);
        db.apply_activity(&k, amount).unwrap();
    }
    db.update_budgeted(&key("b", "utilities", "2025-02"), dec!(275.50)).unwrap();

    let before = db.get_entries("b", "utilities").unwrap();
    assert!(verify(db.connection(), &TransactionTable, None).unwrap().is_empty());

    let report = db.recompute_all(&TransactionTable, None).unwrap();
    assert_eq!(report.entries_changed, 0);
    assert_eq!(db.get_entries("b", "utilities").unwrap(), before);
}

#[test]
fn test_running_sum_is_rounded_only_on_write() {
    let mut db = Database::open_in_memory().unwrap();
    for month in ["2025-01", "2025-02", "2025-03"] {
        db::insert_entry(db.connection(), &key("b", "fees", month), Decimal::ZERO, Decimal::ZERO)
            .unwrap();
    }
    record_raw(&db, "b", "fees", "2025-01-10", "0.004");
    record_raw(&db, "b", "fees", "2025-02-10", "0.004");
    record_raw(&db, "b", "fees", "2025-03-10", "0.004");

    db.recompute_all(&TransactionTable, None).unwrap();
    // 0.004, 0.008, 0.012 rounded on the way out, not 0.00 three times.
    assert_eq!(
        carryovers(&db, "b", "fees"),
        vec![dec!(0.00), dec!(0.01), dec!(0.01)]
    );
}

#[test]
fn test_midpoints_round_away_from_zero() {
    let mut db = Database::open_in_memory().unwrap();
    db::insert_entry(db.connection(), &key("b", "fees", "2025-01"), Decimal::ZERO, Decimal::ZERO)
        .unwrap();
    db::insert_entry(db.connection(), &key("b", "refunds", "2025-01"), Decimal::ZERO, Decimal::ZERO)
        .unwrap();
    record_raw(&db, "b", "fees", "2025-01-10", "-0.005");
    record_raw(&db, "b", "refunds", "2025-01-10", "2.675");

    db.recompute_all(&TransactionTable, None).unwrap();
    assert_eq!(carryovers(&db, "b", "fees"), vec![dec!(-0.01)]);
    assert_eq!(carryovers(&db, "b", "refunds"), vec![dec!(2.68)]);
}

#[test]
fn test_recompute_scoped_to_one_budget() {
    let mut db = Database::open_in_memory().unwrap();
    for budget in ["home", "work"] {
        db::insert_entry(db.connection(), &key(budget, "travel", "2025-01"), dec!(100), dec!(999))
            .unwrap();
    }

    let report = db.recompute_all(&TransactionTable, Some("home")).unwrap();
    assert_eq!(report.groups_recomputed, 1);
    assert_eq!(carryovers(&db, "home", "travel"), vec![dec!(100)]);
    assert_eq!(carryovers(&db, "work", "travel"), vec![dec!(999)]);
}

#[test]
fn test_unreadable_group_is_skipped_and_others_commit() {
    let mut db = Database::open_in_memory().unwrap();
    for category in ["dining", "groceries", "rent"] {
        db::insert_entry(db.connection(), &key("b", category, "2025-01"), dec!(10), dec!(-1))
            .unwrap();
        db::insert_entry(db.connection(), &key("b", category, "2025-02"), dec!(10), dec!(-1))
            .unwrap();
    }

    let report = db
        .recompute_all(&UnreadableCategory("groceries"), None)
        .unwrap();
    assert!(!report.is_complete());
    assert_eq!(report.groups_recomputed, 2);
    assert_eq!(report.entries_changed, 4);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].budget_id, "b");
    assert_eq!(report.skipped[0].category_id, "groceries");
    assert!(report.skipped[0].reason.contains("activity store offline"));

    assert_eq!(carryovers(&db, "b", "dining"), vec![dec!(10), dec!(20)]);
    assert_eq!(carryovers(&db, "b", "groceries"), vec![dec!(-1), dec!(-1)]);
    assert_eq!(carryovers(&db, "b", "rent"), vec![dec!(10), dec!(20)]);
}

#[test]
fn test_store_failure_stops_the_run() {
    let mut db = Database::open_in_memory().unwrap();
    for category in ["dining", "groceries", "rent"] {
        db::insert_entry(db.connection(), &key("b", category, "2025-01"), dec!(10), dec!(-1))
            .unwrap();
    }

    let err = db.recompute_all(&BrokenStore("groceries"), None).unwrap_err();
    assert!(matches!(err, LedgerError::Store(_)));

    // Groups are visited in order: the one before the failure is committed,
    // the failing one and everything after it are untouched.
    assert_eq!(carryovers(&db, "b", "dining"), vec![dec!(10)]);
    assert_eq!(carryovers(&db, "b", "groceries"), vec![dec!(-1)]);
    assert_eq!(carryovers(&db, "b", "rent"), vec![dec!(-1)]);
}

#[test]
fn test_unchanged_rows_are_not_rewritten() {
    let mut db = Database::open_in_memory().unwrap();
    db::insert_entry(db.connection(), &key("b", "rent", "2025-01"), dec!(10), dec!(10)).unwrap();
    db::insert_entry(db.connection(), &key("b", "rent", "2025-02"), dec!(10), dec!(5)).unwrap();
    db.connection()
        .execute("UPDATE monthly_ledger SET updated_at = 'old'", [])
        .unwrap();

    let changed = db.recompute_category(&TransactionTable, "b", "rent").unwrap();
    assert_eq!(changed, 1);

    let entries = db.get_entries("b", "rent").unwrap();
    assert_eq!(entries[0].updated_at, "old");
    assert_ne!(entries[1].updated_at, "old");
    assert_eq!(entries[1].carryover_balance, dec!(20));
}

#[test]
fn test_recompute_category_in_callers_transaction() {
    let mut db = Database::open_in_memory().unwrap();
    db::insert_entry(db.connection(), &key("b", "rent", "2025-01"), dec!(10), dec!(0)).unwrap();

    {
        let tx = db.begin().unwrap();
        assert_eq!(recompute_category(&tx, &TransactionTable, "b", "rent").unwrap(), 1);
        // Dropped without commit.
    }
    assert_eq!(carryovers(&db, "b", "rent"), vec![dec!(0)]);
}

#[test]
fn test_recompute_of_empty_database() {
    let mut db = Database::open_in_memory().unwrap();
    let report = db.recompute_all(&TransactionTable, None).unwrap();
    assert_eq!(report, RecomputeReport::default());
    assert!(report.is_complete());
}

#[test]
fn test_verify_reports_drift_without_writing() {
    let db = Database::open_in_memory().unwrap();
    db::insert_entry(db.connection(), &key("b", "rent", "2025-01"), dec!(10), dec!(10)).unwrap();
    db::insert_entry(db.connection(), &key("b", "rent", "2025-02"), dec!(10), dec!(20)).unwrap();
    db::insert_entry(db.connection(), &key("c", "rent", "2025-01"), dec!(10), dec!(0)).unwrap();
    record(&db, "b", "rent", "2025-02-01", dec!(-4));

    let drifts = verify(db.connection(), &TransactionTable, Some("b")).unwrap();
    assert_eq!(
        drifts,
        vec![Drift {
            key: key("b", "rent", "2025-02"),
            stored: dec!(20),
            expected: dec!(16),
        }]
    );
    assert_eq!(carryovers(&db, "b", "rent"), vec![dec!(10), dec!(20)]);

    assert_eq!(verify(db.connection(), &TransactionTable, None).unwrap().len(), 2);
}

#[test]
fn test_overflowing_balance_stops_the_run() {
    let mut db = Database::open_in_memory().unwrap();
    db::insert_entry(db.connection(), &key("b", "rent", "2025-01"), Decimal::MAX, Decimal::ZERO)
        .unwrap();
    db::insert_entry(db.connection(), &key("b", "rent", "2025-02"), dec!(1), Decimal::ZERO)
        .unwrap();

    let err = db.recompute_all(&TransactionTable, None).unwrap_err();
    assert!(matches!(err, LedgerError::AmountOutOfRange(ref k) if *k == key("b", "rent", "2025-02")));
    assert_eq!(carryovers(&db, "b", "rent"), vec![Decimal::ZERO, Decimal::ZERO]);

    assert!(matches!(
        verify(db.connection(), &TransactionTable, None),
        Err(LedgerError::AmountOutOfRange(_))
    ));
}
