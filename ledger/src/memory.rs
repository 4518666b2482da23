//! In-process ledger.

use std::collections::HashMap;
use std::pin::pin;
use std::sync::{Arc, Weak};
use std::time::Duration;

use sentinel_types::{CondensedDiagnosis, RawRecord, TxHash};
use tokio::sync::{Mutex, Notify};

use crate::backend::{compute_tx_hash, contract_violation, now_secs};
use crate::{LedgerError, LedgerFut, LedgerRead, LedgerWrite, SigningIdentity, TxOutcome};

/// When pending transactions are mined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MiningMode {
    /// Mined during `submit`.
    #[default]
    Instant,
    /// Mined only when [`MemoryLedger::mine_pending`] is called.
    Manual,
    /// Mined by a background task every period.
    Interval(Duration),
}

#[derive(Debug, Default)]
struct State {
    records: Vec<RawRecord>,
    pending: Vec<(TxHash, CondensedDiagnosis)>,
    outcomes: HashMap<TxHash, TxOutcome>,
    nonce: u64,
}

impl State {
    fn mine(&mut self, now: u64) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let mined = pending.len();
        for (hash, payload) in pending {
            let outcome = match contract_violation(payload.machine_id(), payload.recommendation())
            {
                Some(reason) => TxOutcome::Reverted { reason },
                None => {
                    let index = self.records.len() as u64;
                    self.records.push(RawRecord {
                        machine_id: payload.machine_id().to_string(),
                        condition: payload.prediction().to_string(),
                        recommendation: payload.recommendation().to_string(),
                        timestamp_secs: now,
                    });
                    TxOutcome::Mined {
                        index,
                        timestamp_secs: now,
                    }
                }
            };
            self.outcomes.insert(hash, outcome);
        }
        mined
    }
}

/// Append-only ledger held in memory.
///
/// Applies the same contract validation as a real ledger: an empty machine id
/// or an over-long recommendation reverts instead of appending.
#[derive(Debug)]
pub struct MemoryLedger {
    state: Mutex<State>,
    mined: Notify,
    mode: MiningMode,
}

impl MemoryLedger {
    /// `Interval` mining needs a running tokio runtime; without one the ledger
    /// falls back to manual mining.
    #[must_use]
    pub fn new(mode: MiningMode) -> Arc<Self> {
        let ledger = Arc::new(Self {
            state: Mutex::new(State::default()),
            mined: Notify::new(),
            mode,
        });
        if let MiningMode::Interval(period) = mode {
            spawn_miner(Arc::downgrade(&ledger), period);
        }
        ledger
    }

    /// Mine everything in the pending pool. Returns how many transactions
    /// were processed (mined or reverted).
    pub async fn mine_pending(&self) -> usize {
        let mined = self.state.lock().await.mine(now_secs());
        if mined > 0 {
            tracing::debug!(mined, "Memory ledger mined pending transactions");
            self.mined.notify_waiters();
        }
        mined
    }

    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }
}

fn spawn_miner(ledger: Weak<MemoryLedger>, period: Duration) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        tracing::warn!("No tokio runtime for interval mining; transactions mine on demand only");
        return;
    };
    runtime.spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(ledger) = ledger.upgrade() else {
                break;
            };
            ledger.mine_pending().await;
        }
    });
}

impl LedgerWrite for MemoryLedger {
    fn submit<'a>(
        &'a self,
        signer: &'a SigningIdentity,
        payload: &'a CondensedDiagnosis,
    ) -> LedgerFut<'a, TxHash> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.nonce += 1;
            let hash = compute_tx_hash(signer, payload, &state.nonce.to_string());
            state.pending.push((hash.clone(), payload.clone()));
            if self.mode == MiningMode::Instant {
                state.mine(now_secs());
                drop(state);
                self.mined.notify_waiters();
            }
            Ok(hash)
        })
    }

    fn wait<'a>(&'a self, hash: &'a TxHash) -> LedgerFut<'a, TxOutcome> {
        Box::pin(async move {
            loop {
                let mut notified = pin!(self.mined.notified());
                notified.as_mut().enable();
                {
                    let state = self.state.lock().await;
                    if let Some(outcome) = state.outcomes.get(hash) {
                        return Ok(outcome.clone());
                    }
                    if !state.pending.iter().any(|(pending, _)| pending == hash) {
                        return Err(LedgerError::Storage(format!("unknown transaction {hash}")));
                    }
                }
                notified.await;
            }
        })
    }
}

impl LedgerRead for MemoryLedger {
    fn record_count(&self) -> LedgerFut<'_, u64> {
        Box::pin(async move { Ok(self.state.lock().await.records.len() as u64) })
    }

    fn record_at(&self, index: u64) -> LedgerFut<'_, RawRecord> {
        Box::pin(async move {
            let state = self.state.lock().await;
            usize::try_from(index)
                .ok()
                .and_then(|i| state.records.get(i))
                .cloned()
                .ok_or_else(|| LedgerError::Storage(format!("no record at index {index}")))
        })
    }
}
