pub(crate) const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS monthly_ledger (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    budget_id         TEXT NOT NULL,
    category_id       TEXT NOT NULL,
    month             TEXT NOT NULL CHECK (length(month) = 7),
    budgeted          TEXT NOT NULL,
    carryover_balance TEXT NOT NULL,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL,
    UNIQUE(budget_id, category_id, month)
);

CREATE TABLE IF NOT EXISTS transactions (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    budget_id   TEXT NOT NULL,
    category_id TEXT,
    date        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    amount      TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_ledger ON transactions(budget_id, category_id, date);
"#;

pub(crate) const CURRENT_VERSION: i32 = 1;

/// Migrations from version N to N+1.
/// Each entry is (from_version, sql).
pub(crate) const MIGRATIONS: &[(i32, &str)] = &[];
