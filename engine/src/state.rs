//! Session states and the commit proof token.

use std::fmt;

use sentinel_types::{CondensedDiagnosis, ConfirmedReceipt, Diagnosis, format_optional_recommendation};

/// A diagnosis together with its formatted recommendation.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDiagnosis {
    diagnosis: Diagnosis,
    recommendations: Vec<String>,
}

impl RenderedDiagnosis {
    #[must_use]
    pub fn new(diagnosis: Diagnosis) -> Self {
        let recommendations =
            format_optional_recommendation(diagnosis.recommendation.as_deref());
        Self {
            diagnosis,
            recommendations,
        }
    }

    #[must_use]
    pub fn diagnosis(&self) -> &Diagnosis {
        &self.diagnosis
    }

    #[must_use]
    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }
}

/// Proof that a diagnosis was received and may be committed.
///
/// Minted only when the session enters `Predicted` (or hands a diagnosis back
/// after a failed commit). Consumed by [`crate::Session::commit`]. A ticket
/// minted for an earlier diagnosis is stale and never reaches the ledger.
#[derive(Debug)]
pub struct CommitTicket {
    pub(crate) generation: u64,
    payload: CondensedDiagnosis,
}

impl CommitTicket {
    pub(crate) fn new(generation: u64, rendered: &RenderedDiagnosis) -> Self {
        Self {
            generation,
            payload: CondensedDiagnosis::from_diagnosis(rendered.diagnosis()),
        }
    }

    /// What the ledger write will carry.
    #[must_use]
    pub fn payload(&self) -> &CondensedDiagnosis {
        &self.payload
    }
}

#[derive(Debug)]
pub(crate) enum SessionState {
    Idle,
    Predicting,
    PredictFailed { message: String },
    Predicted(RenderedDiagnosis),
    Committing(RenderedDiagnosis),
    CommitFailed {
        rendered: RenderedDiagnosis,
        message: String,
    },
    Committed {
        rendered: RenderedDiagnosis,
        receipt: ConfirmedReceipt,
    },
}

impl SessionState {
    pub(crate) fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::Predicting => SessionPhase::Predicting,
            SessionState::PredictFailed { .. } => SessionPhase::PredictFailed,
            SessionState::Predicted(_) => SessionPhase::Predicted,
            SessionState::Committing(_) => SessionPhase::Committing,
            SessionState::CommitFailed { .. } => SessionPhase::CommitFailed,
            SessionState::Committed { .. } => SessionPhase::Committed,
        }
    }

    pub(crate) fn rendered(&self) -> Option<&RenderedDiagnosis> {
        match self {
            SessionState::Predicted(rendered)
            | SessionState::Committing(rendered)
            | SessionState::CommitFailed { rendered, .. }
            | SessionState::Committed { rendered, .. } => Some(rendered),
            SessionState::Idle | SessionState::Predicting | SessionState::PredictFailed { .. } => {
                None
            }
        }
    }
}

/// Observable workflow phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    Idle,
    Predicting,
    PredictFailed,
    Predicted,
    Committing,
    CommitFailed,
    Committed,
}

impl SessionPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Predicting => "predicting",
            SessionPhase::PredictFailed => "predict_failed",
            SessionPhase::Predicted => "predicted",
            SessionPhase::Committing => "committing",
            SessionPhase::CommitFailed => "commit_failed",
            SessionPhase::Committed => "committed",
        }
    }

    /// Whether a commit ticket can be redeemed in this phase.
    #[must_use]
    pub const fn accepts_commit(self) -> bool {
        matches!(self, SessionPhase::Predicted | SessionPhase::CommitFailed)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
