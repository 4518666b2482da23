use std::time::Duration;

use sentinel_types::{InvalidTransition, TimestampOutOfRange};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("no signer available: configure a signing account")]
    NoSignerAvailable,
    #[error("authorization denied by operator")]
    AuthorizationDenied,
    #[error("transaction rejected: {0}")]
    CommitRejected(String),
    #[error("transaction not confirmed within {}s", .0.as_secs())]
    ConfirmationTimeout(Duration),
    #[error("ledger reader unavailable: {0}")]
    ReaderUnavailable(String),
    /// Adapter failure (database error, unknown transaction, bad stored data).
    #[error("ledger storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

impl LedgerError {
    pub(crate) fn storage(context: &str, err: impl std::fmt::Display) -> Self {
        LedgerError::Storage(format!("{context}: {err}"))
    }
}

impl From<TimestampOutOfRange> for LedgerError {
    fn from(err: TimestampOutOfRange) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}
