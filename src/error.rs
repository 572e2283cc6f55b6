//! Error type shared by the ledger store, the incremental updater and the
//! batch recomputer.
use rusqlite::ErrorCode;

use crate::models::LedgerKey;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// The errors that may occur while reading or changing a monthly ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A ledger entry for the exact (budget, category, month) key already exists.
    #[error("ledger entry already exists for {0}")]
    AlreadyExists(LedgerKey),

    /// The entry an update targets does not exist. Nothing was changed.
    #[error("no ledger entry for {0}")]
    NotFound(LedgerKey),

    /// A month or date string that is not a zero padded `YYYY-MM` (or
    /// `YYYY-MM-DD` for dates).
    #[error("invalid month \"{0}\", expected YYYY-MM")]
    InvalidMonth(String),

    /// The store could not take or keep the write lock.
    ///
    /// The whole operation was rolled back and may be retried from the top.
    #[error("transaction aborted by the store: {0}")]
    TransactionAborted(#[source] rusqlite::Error),

    /// The activity reader failed for one key.
    #[error("could not read activity for {key}: {reason}")]
    ActivityReadFailure { key: LedgerKey, reason: String },

    /// A balance for `key` would leave the representable decimal range.
    /// Nothing was changed.
    #[error("amount out of range for {0}")]
    AmountOutOfRange(LedgerKey),

    #[error("ledger store error: {0}")]
    Store(#[source] rusqlite::Error),
}

impl LedgerError {
    /// Whether re-running the failed operation from the top can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransactionAborted(_))
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                Self::TransactionAborted(err)
            }
            _ => Self::Store(err),
        }
    }
}
