//! Prediction-and-commit workflow for one operator session.
//!
//! # State machine
//!
//! ```text
//! Idle ──predict──▶ Predicting ──ok──▶ Predicted ──commit──▶ Committing ──ok──▶ Committed
//!                        │                  ▲                     │
//!                        ▼                  └──── CommitFailed ◀──┘
//!                  PredictFailed
//! ```
//!
//! Committing requires a [`CommitTicket`], which only a successful prediction
//! (or a failed commit handing its diagnosis back) can mint. Committing from
//! any other state is therefore unrepresentable, and a ticket from a
//! discarded diagnosis, or minted by another session, fails with
//! [`SessionError::StaleTicket`] before any ledger call. Listing records is
//! independent of the state machine.
//!
//! Dropping a `commit` future before it settles leaves the session in
//! `CommitFailed` with no ticket. The transaction may still land on the
//! ledger, so committing that diagnosis again requires a fresh prediction.

mod error;
mod progress;
mod state;

use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};

use sentinel_ledger::{LedgerError, LedgerReader, LedgerWriter};
use sentinel_predict::PredictionClient;
use sentinel_types::{CondensedDiagnosis, ConfirmedReceipt, Diagnosis, LedgerRecord, Reading};
use tokio::sync::mpsc;

pub use error::SessionError;
pub use progress::CommitProgress;
pub use state::{CommitTicket, RenderedDiagnosis, SessionPhase};
use state::SessionState;

const COMMIT_INTERRUPTED: &str = "Commit interrupted before confirmation";

/// Generations are drawn from one process-wide counter, so a ticket can only
/// ever match the session that minted it.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

pub struct Session {
    client: PredictionClient,
    writer: LedgerWriter,
    reader: LedgerReader,
    state: SessionState,
    /// Bumped whenever a ticket is minted or the held diagnosis is discarded.
    generation: u64,
    progress: Option<mpsc::UnboundedSender<CommitProgress>>,
}

impl Session {
    pub fn new(client: PredictionClient, writer: LedgerWriter, reader: LedgerReader) -> Self {
        Self {
            client,
            writer,
            reader,
            state: SessionState::Idle,
            generation: next_generation(),
            progress: None,
        }
    }

    /// Deliver commit progress events to `sender`.
    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<CommitProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    /// The held diagnosis, if any.
    #[must_use]
    pub fn diagnosis(&self) -> Option<&Diagnosis> {
        self.state.rendered().map(RenderedDiagnosis::diagnosis)
    }

    /// Formatted recommendation of the held diagnosis; empty when none is held.
    #[must_use]
    pub fn recommendations(&self) -> &[String] {
        self.state
            .rendered()
            .map(RenderedDiagnosis::recommendations)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn receipt(&self) -> Option<&ConfirmedReceipt> {
        match &self.state {
            SessionState::Committed { receipt, .. } => Some(receipt),
            _ => None,
        }
    }

    /// Message of the most recent failure, while in a failed phase.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        match &self.state {
            SessionState::PredictFailed { message } | SessionState::CommitFailed { message, .. } => {
                Some(message)
            }
            _ => None,
        }
    }

    /// Submit a reading and hold the returned diagnosis.
    ///
    /// Any previously held diagnosis is discarded first, which makes every
    /// outstanding ticket stale. Refused while a commit is in flight.
    pub async fn predict(&mut self, reading: &Reading) -> Result<CommitTicket, SessionError> {
        if matches!(self.state, SessionState::Committing(_)) {
            return Err(SessionError::CommitInFlight);
        }

        self.generation = next_generation();
        self.state = SessionState::Predicting;

        match self.client.predict(reading).await {
            Ok(diagnosis) => {
                let rendered = RenderedDiagnosis::new(diagnosis);
                let ticket = self.mint_ticket(&rendered);
                tracing::info!(
                    machine_id = %reading.machine_id(),
                    prediction = rendered.diagnosis().prediction.as_deref().unwrap_or(""),
                    recommendations = rendered.recommendations().len(),
                    "Diagnosis held"
                );
                self.state = SessionState::Predicted(rendered);
                Ok(ticket)
            }
            Err(err) => {
                tracing::warn!(machine_id = %reading.machine_id(), error = %err, "Prediction failed");
                self.state = SessionState::PredictFailed {
                    message: err.to_string(),
                };
                Err(err.into())
            }
        }
    }

    /// Authorize, submit and await confirmation of the held diagnosis.
    ///
    /// The ledger payload is condensed from the diagnosis this session holds;
    /// the ticket only proves it is still current. On failure the session
    /// moves to `CommitFailed`, keeps the diagnosis, and the returned
    /// [`SessionError::Commit`] carries a fresh ticket.
    pub async fn commit(&mut self, ticket: CommitTicket) -> Result<ConfirmedReceipt, SessionError> {
        if matches!(self.state, SessionState::Committing(_)) {
            return Err(SessionError::CommitInFlight);
        }
        if ticket.generation != self.generation || !self.phase().accepts_commit() {
            tracing::warn!(phase = %self.phase(), "Rejected stale commit ticket");
            return Err(SessionError::StaleTicket);
        }

        let rendered = match mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Predicted(rendered) | SessionState::CommitFailed { rendered, .. } => {
                rendered
            }
            other => {
                self.state = other;
                return Err(SessionError::StaleTicket);
            }
        };
        let payload = CondensedDiagnosis::from_diagnosis(rendered.diagnosis());
        self.state = SessionState::Committing(rendered.clone());
        let guard = CommittingGuard {
            state: &mut self.state,
        };

        match run_commit(&self.writer, self.progress.as_ref(), &payload).await {
            Ok(receipt) => {
                guard.settle(SessionState::Committed {
                    rendered,
                    receipt: receipt.clone(),
                });
                Ok(receipt)
            }
            Err(source) => {
                guard.settle(SessionState::CommitFailed {
                    rendered: rendered.clone(),
                    message: source.to_string(),
                });
                emit(
                    self.progress.as_ref(),
                    CommitProgress::Failed {
                        message: source.to_string(),
                    },
                );
                let retry = self.mint_ticket(&rendered);
                Err(SessionError::Commit {
                    source,
                    retry: Box::new(retry),
                })
            }
        }
    }

    /// Every record currently on the ledger, in index order.
    pub async fn list_records(&self) -> Result<Vec<LedgerRecord>, SessionError> {
        Ok(self.reader.fetch_all().await?)
    }

    /// Discard any held diagnosis and return to `Idle`.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        if matches!(self.state, SessionState::Committing(_)) {
            return Err(SessionError::CommitInFlight);
        }
        self.generation = next_generation();
        self.state = SessionState::Idle;
        Ok(())
    }

    fn mint_ticket(&mut self, rendered: &RenderedDiagnosis) -> CommitTicket {
        self.generation = next_generation();
        CommitTicket::new(self.generation, rendered)
    }
}

async fn run_commit(
    writer: &LedgerWriter,
    progress: Option<&mpsc::UnboundedSender<CommitProgress>>,
    payload: &CondensedDiagnosis,
) -> Result<ConfirmedReceipt, LedgerError> {
    emit(progress, CommitProgress::Requested);
    let signer = writer.authorize().await?;

    emit(
        progress,
        CommitProgress::Connected {
            account: signer.account().to_string(),
        },
    );
    let mut handle = writer.commit(&signer, payload).await?;

    emit(
        progress,
        CommitProgress::Sent {
            tx_hash: handle.hash().clone(),
        },
    );
    let receipt = writer.await_confirmation(&mut handle).await?;

    emit(
        progress,
        CommitProgress::Confirmed {
            tx_hash: receipt.tx_hash.clone(),
        },
    );
    Ok(receipt)
}

fn emit(progress: Option<&mpsc::UnboundedSender<CommitProgress>>, event: CommitProgress) {
    tracing::info!(progress = %event, "Commit progress");
    if let Some(sender) = progress {
        let _ = sender.send(event);
    }
}

/// Holds the session in `Committing` for the duration of a commit. If the
/// commit future is dropped first, the session falls back to `CommitFailed`.
struct CommittingGuard<'a> {
    state: &'a mut SessionState,
}

impl CommittingGuard<'_> {
    fn settle(self, next: SessionState) {
        *self.state = next;
    }
}

impl Drop for CommittingGuard<'_> {
    fn drop(&mut self) {
        if !matches!(self.state, SessionState::Committing(_)) {
            return;
        }
        if let SessionState::Committing(rendered) = mem::replace(self.state, SessionState::Idle) {
            tracing::warn!("{COMMIT_INTERRUPTED}");
            *self.state = SessionState::CommitFailed {
                rendered,
                message: COMMIT_INTERRUPTED.to_string(),
            };
        }
    }
}
