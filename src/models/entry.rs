use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;

use super::Month;
use crate::error::{LedgerError, Result};

/// Fractional digits kept for every stored amount.
pub const LEDGER_SCALE: u32 = 2;

/// Round to ledger precision, half away from zero.
pub fn to_ledger_precision(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(LEDGER_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `a + b`, or `AmountOutOfRange` for `key` when the sum does not fit.
pub fn checked_amount_add(key: &LedgerKey, a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| LedgerError::AmountOutOfRange(key.clone()))
}

/// The (budget, category, month) triple that identifies one ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerKey {
    pub budget_id: String,
    pub category_id: String,
    pub month: Month,
}

impl LedgerKey {
    pub fn new(budget_id: impl Into<String>, category_id: impl Into<String>, month: Month) -> Self {
        Self {
            budget_id: budget_id.into(),
            category_id: category_id.into(),
            month,
        }
    }

    /// Build a key from raw strings, validating the month.
    pub fn parse(budget_id: &str, category_id: &str, month: &str) -> Result<Self> {
        Ok(Self::new(budget_id, category_id, Month::parse(month)?))
    }

    /// The same category ledger, another month.
    pub fn with_month(&self, month: Month) -> Self {
        Self {
            budget_id: self.budget_id.clone(),
            category_id: self.category_id.clone(),
            month,
        }
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.budget_id, self.category_id, self.month)
    }
}

/// One category's budget for one month.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub id: i64,
    pub budget_id: String,
    pub category_id: String,
    pub month: Month,
    pub budgeted: Decimal,
    /// Balance at the end of `month`: the previous month's carryover plus this
    /// month's budgeted amount and activity.
    pub carryover_balance: Decimal,
    pub created_at: String,
    pub updated_at: String,
}

impl LedgerEntry {
    pub fn key(&self) -> LedgerKey {
        LedgerKey::new(
            self.budget_id.clone(),
            self.category_id.clone(),
            self.month.clone(),
        )
    }
}
