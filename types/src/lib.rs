//! Core domain types for Sentinel.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod diagnosis;
mod ledger;
mod proofs;
mod reading;
mod recommendation;
mod text;

pub use diagnosis::{ClassScore, Diagnosis};
pub use ledger::{
    CondensedDiagnosis, ConfirmedReceipt, InvalidTransition, LedgerRecord,
    MAX_RECOMMENDATION_CHARS, RawRecord, TimestampOutOfRange, TransactionHandle, TxHash, TxState,
    timestamp_from_secs,
};
pub use proofs::{EmptyMachineIdError, MachineId};
pub use reading::{MachineType, MachineTypeParseError, Reading};
pub use recommendation::{format_optional_recommendation, format_recommendation};
pub use text::{truncate_chars, truncate_to_fit, truncate_with_ellipsis};
