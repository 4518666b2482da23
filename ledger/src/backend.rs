//! Adapter contract between Sentinel and a ledger.

use sentinel_types::{CondensedDiagnosis, MAX_RECOMMENDATION_CHARS, RawRecord, TxHash};
use sha2::{Digest, Sha256};

use crate::{LedgerFut, SigningIdentity};

/// Final disposition of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    /// Appended at `index` with the ledger-assigned timestamp.
    Mined { index: u64, timestamp_secs: u64 },
    Reverted { reason: String },
}

/// Write side of a ledger.
pub trait LedgerWrite: Send + Sync {
    /// Place a write in the pending pool and return its transaction hash.
    ///
    /// Returns as soon as the transaction is accepted, before it is mined.
    fn submit<'a>(
        &'a self,
        signer: &'a SigningIdentity,
        payload: &'a CondensedDiagnosis,
    ) -> LedgerFut<'a, TxHash>;

    /// Resolve once the transaction is mined or reverted.
    fn wait<'a>(&'a self, hash: &'a TxHash) -> LedgerFut<'a, TxOutcome>;
}

/// Read side of a ledger: a count and random access by index.
pub trait LedgerRead: Send + Sync {
    fn record_count(&self) -> LedgerFut<'_, u64>;

    /// Fields stored at `index`, for `index` in `[0, record_count)`.
    fn record_at(&self, index: u64) -> LedgerFut<'_, RawRecord>;
}

/// Validation every ledger applies before appending. Returns the revert reason.
pub(crate) fn contract_violation(machine_id: &str, recommendation: &str) -> Option<String> {
    if machine_id.trim().is_empty() {
        return Some("machine id is required".to_string());
    }
    if recommendation.chars().count() > MAX_RECOMMENDATION_CHARS {
        return Some(format!(
            "recommendation exceeds {MAX_RECOMMENDATION_CHARS} characters"
        ));
    }
    None
}

pub(crate) fn compute_tx_hash(
    signer: &SigningIdentity,
    payload: &CondensedDiagnosis,
    nonce: &str,
) -> TxHash {
    let mut hasher = Sha256::new();
    for part in [
        signer.account(),
        payload.machine_id(),
        payload.prediction(),
        payload.recommendation(),
        nonce,
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    TxHash::from_bytes(&hasher.finalize())
}

pub(crate) fn now_secs() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}
