use sentinel_ledger::LedgerError;
use sentinel_predict::PredictError;
use thiserror::Error;

use crate::CommitTicket;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Predict(#[from] PredictError),
    /// The commit failed; the diagnosis is kept and `retry` redeems it again.
    #[error("{source}")]
    Commit {
        #[source]
        source: LedgerError,
        retry: Box<CommitTicket>,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("commit ticket does not belong to the current diagnosis")]
    StaleTicket,
    #[error("a commit is already in flight")]
    CommitInFlight,
}

impl SessionError {
    /// The replacement ticket handed back by a failed commit.
    #[must_use]
    pub fn into_retry_ticket(self) -> Option<CommitTicket> {
        match self {
            SessionError::Commit { retry, .. } => Some(*retry),
            _ => None,
        }
    }
}
