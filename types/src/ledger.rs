//! Ledger payloads, records and transaction lifecycle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recommendation::format_optional_recommendation;
use crate::text::truncate_chars;
use crate::Diagnosis;

/// Upper bound on the recommendation text stored per ledger entry, in characters.
pub const MAX_RECOMMENDATION_CHARS: usize = 500;

/// The subset of a [`Diagnosis`] that is written to the ledger.
///
/// The recommendation never exceeds [`MAX_RECOMMENDATION_CHARS`] characters;
/// every constructor truncates on a `char` boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CondensedDiagnosis {
    machine_id: String,
    prediction: String,
    recommendation: String,
}

impl CondensedDiagnosis {
    #[must_use]
    pub fn new(
        machine_id: impl Into<String>,
        prediction: impl Into<String>,
        recommendation: &str,
    ) -> Self {
        Self {
            machine_id: machine_id.into(),
            prediction: prediction.into(),
            recommendation: truncate_chars(recommendation, MAX_RECOMMENDATION_CHARS).to_string(),
        }
    }

    /// Condense a diagnosis.
    ///
    /// The stored advice is the formatted recommendation joined with `\n`.
    /// Absent fields condense to the empty string.
    #[must_use]
    pub fn from_diagnosis(diagnosis: &Diagnosis) -> Self {
        let lines = format_optional_recommendation(diagnosis.recommendation.as_deref());
        Self::new(
            diagnosis.machine_id.clone().unwrap_or_default(),
            diagnosis.prediction.clone().unwrap_or_default(),
            &lines.join("\n"),
        )
    }

    #[must_use]
    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    #[must_use]
    pub fn prediction(&self) -> &str {
        &self.prediction
    }

    #[must_use]
    pub fn recommendation(&self) -> &str {
        &self.recommendation
    }
}

/// The four fields a ledger stores per entry, as returned by an indexed read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub machine_id: String,
    pub condition: String,
    pub recommendation: String,
    /// Seconds since the Unix epoch, assigned by the ledger when mined.
    pub timestamp_secs: u64,
}

/// A materialized ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerRecord {
    pub index: u64,
    pub machine_id: String,
    pub condition: String,
    pub recommendation: String,
    pub committed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("ledger timestamp {0}s is outside the representable range")]
pub struct TimestampOutOfRange(pub u64);

/// Convert a ledger epoch-seconds value to a moment (seconds × 1000 as epoch-millis).
pub fn timestamp_from_secs(secs: u64) -> Result<DateTime<Utc>, TimestampOutOfRange> {
    secs.checked_mul(1000)
        .and_then(|millis| i64::try_from(millis).ok())
        .and_then(DateTime::from_timestamp_millis)
        .ok_or(TimestampOutOfRange(secs))
}

impl LedgerRecord {
    pub fn from_raw(index: u64, raw: RawRecord) -> Result<Self, TimestampOutOfRange> {
        Ok(Self {
            index,
            committed_at: timestamp_from_secs(raw.timestamp_secs)?,
            machine_id: raw.machine_id,
            condition: raw.condition,
            recommendation: raw.recommendation,
        })
    }
}

/// Identifier of a submitted ledger transaction (lowercase hex, `0x`-prefixed).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    #[must_use]
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Build from raw digest bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut out = String::with_capacity(2 + bytes.len() * 2);
        out.push_str("0x");
        for byte in bytes {
            out.push_str(&format!("{byte:02x}"));
        }
        Self(out)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxState {
    Submitted,
    Confirmed,
    Failed,
}

impl TxState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TxState::Submitted => "submitted",
            TxState::Confirmed => "confirmed",
            TxState::Failed => "failed",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, TxState::Confirmed | TxState::Failed)
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal transaction transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: TxState,
    pub to: TxState,
}

/// An in-flight ledger write.
///
/// Starts in [`TxState::Submitted`] and moves exactly once to a terminal
/// state. Rejected transitions leave the handle unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionHandle {
    hash: TxHash,
    state: TxState,
}

impl TransactionHandle {
    #[must_use]
    pub fn submitted(hash: TxHash) -> Self {
        Self {
            hash,
            state: TxState::Submitted,
        }
    }

    #[must_use]
    pub fn hash(&self) -> &TxHash {
        &self.hash
    }

    #[must_use]
    pub const fn state(&self) -> TxState {
        self.state
    }

    pub fn mark_confirmed(&mut self) -> Result<(), InvalidTransition> {
        self.transition(TxState::Confirmed)
    }

    pub fn mark_failed(&mut self) -> Result<(), InvalidTransition> {
        self.transition(TxState::Failed)
    }

    fn transition(&mut self, to: TxState) -> Result<(), InvalidTransition> {
        match (self.state, to) {
            (TxState::Submitted, TxState::Confirmed | TxState::Failed) => {
                self.state = to;
                Ok(())
            }
            (from, to) => Err(InvalidTransition { from, to }),
        }
    }
}

/// Proof that a write became part of the ledger's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmedReceipt {
    pub tx_hash: TxHash,
    pub index: u64,
    pub committed_at: DateTime<Utc>,
}
