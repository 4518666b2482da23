//! Authorize, commit, await confirmation.

use std::sync::Arc;
use std::time::Duration;

use sentinel_types::{
    CondensedDiagnosis, ConfirmedReceipt, InvalidTransition, TransactionHandle, TxState,
    timestamp_from_secs,
};

use crate::{Authorizer, LedgerError, LedgerWrite, SigningIdentity, TxOutcome};

pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

pub struct LedgerWriter {
    authorizer: Arc<dyn Authorizer>,
    ledger: Arc<dyn LedgerWrite>,
    /// `None` waits indefinitely.
    confirmation_timeout: Option<Duration>,
}

impl LedgerWriter {
    pub fn new(authorizer: Arc<dyn Authorizer>, ledger: Arc<dyn LedgerWrite>) -> Self {
        Self {
            authorizer,
            ledger,
            confirmation_timeout: Some(DEFAULT_CONFIRMATION_TIMEOUT),
        }
    }

    /// A zero duration disables the limit.
    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    #[must_use]
    pub fn confirmation_timeout(&self) -> Option<Duration> {
        self.confirmation_timeout
    }

    pub async fn authorize(&self) -> Result<SigningIdentity, LedgerError> {
        self.authorizer.authorize().await
    }

    /// Submit one write carrying the condensed diagnosis.
    ///
    /// The recommendation is already bounded by [`CondensedDiagnosis`]. The
    /// returned handle is `submitted`; the write is not yet final.
    pub async fn commit(
        &self,
        signer: &SigningIdentity,
        payload: &CondensedDiagnosis,
    ) -> Result<TransactionHandle, LedgerError> {
        let hash = self.ledger.submit(signer, payload).await?;
        tracing::info!(
            tx_hash = %hash,
            account = %signer,
            machine_id = payload.machine_id(),
            prediction = payload.prediction(),
            "Ledger transaction submitted"
        );
        Ok(TransactionHandle::submitted(hash))
    }

    /// Wait for the handle's transaction to be mined.
    ///
    /// Moves the handle to `confirmed` on success and to `failed` on revert,
    /// timeout or adapter error. A handle that is no longer `submitted` is
    /// rejected without touching the ledger.
    pub async fn await_confirmation(
        &self,
        handle: &mut TransactionHandle,
    ) -> Result<ConfirmedReceipt, LedgerError> {
        if handle.state() != TxState::Submitted {
            return Err(InvalidTransition {
                from: handle.state(),
                to: TxState::Confirmed,
            }
            .into());
        }

        let hash = handle.hash().clone();
        let outcome = match self.confirmation_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.ledger.wait(&hash)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    handle.mark_failed()?;
                    tracing::warn!(tx_hash = %hash, timeout_secs = limit.as_secs(), "Confirmation timed out");
                    return Err(LedgerError::ConfirmationTimeout(limit));
                }
            },
            None => self.ledger.wait(&hash).await,
        };

        match outcome {
            Ok(TxOutcome::Mined {
                index,
                timestamp_secs,
            }) => {
                let committed_at = match timestamp_from_secs(timestamp_secs) {
                    Ok(moment) => moment,
                    Err(err) => {
                        handle.mark_failed()?;
                        return Err(err.into());
                    }
                };
                handle.mark_confirmed()?;
                tracing::info!(tx_hash = %hash, index, "Ledger transaction confirmed");
                Ok(ConfirmedReceipt {
                    tx_hash: hash,
                    index,
                    committed_at,
                })
            }
            Ok(TxOutcome::Reverted { reason }) => {
                handle.mark_failed()?;
                tracing::warn!(tx_hash = %hash, %reason, "Ledger transaction reverted");
                Err(LedgerError::CommitRejected(reason))
            }
            Err(err) => {
                handle.mark_failed()?;
                tracing::warn!(tx_hash = %hash, error = %err, "Waiting for confirmation failed");
                Err(err)
            }
        }
    }
}
