use rust_decimal::Decimal;

use super::{to_ledger_precision, LedgerKey, Month};
use crate::error::Result;

/// A recorded financial transaction, as kept by the surrounding ledger.
///
/// Amounts are signed: debits negative, credits positive, and kept at ledger
/// precision so the activity read back equals the activity applied.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: Option<i64>,
    pub budget_id: String,
    pub category_id: Option<String>,
    /// Format: "YYYY-MM-DD"
    pub date: String,
    pub description: String,
    pub amount: Decimal,
    pub created_at: String,
}

impl Transaction {
    pub fn new(
        budget_id: String,
        category_id: Option<String>,
        date: String,
        description: String,
        amount: Decimal,
    ) -> Self {
        Self {
            id: None,
            budget_id,
            category_id,
            date,
            description,
            amount: to_ledger_precision(amount),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn month(&self) -> Result<Month> {
        Month::from_date(&self.date)
    }

    /// The ledger entry this transaction counts towards, if it is categorized.
    pub fn ledger_key(&self) -> Result<Option<LedgerKey>> {
        let Some(category_id) = &self.category_id else {
            return Ok(None);
        };
        Ok(Some(LedgerKey::new(
            self.budget_id.clone(),
            category_id.clone(),
            self.month()?,
        )))
    }
}
