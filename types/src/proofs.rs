//! Proof types for validated identifiers.
//!
//! These types enforce invariants at construction time. Once you hold a value,
//! you know it satisfies all required constraints.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a monitored machine.
///
/// # Invariants
///
/// - Content is never empty after `trim()`
/// - Whitespace-only strings are rejected
///
/// The original spelling is preserved; surrounding whitespace is not stripped,
/// so the identifier echoed back by the prediction service matches what the
/// operator typed.
///
/// # Serde
///
/// Serializes as a plain JSON string. Deserialization validates non-emptiness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MachineId(String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("machine id must not be empty")]
pub struct EmptyMachineIdError;

impl MachineId {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyMachineIdError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(EmptyMachineIdError)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MachineId {
    type Error = EmptyMachineIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MachineId> for String {
    fn from(value: MachineId) -> Self {
        value.0
    }
}

impl AsRef<str> for MachineId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
