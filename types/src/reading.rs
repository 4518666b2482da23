//! Sensor readings submitted for prediction.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::MachineId;

/// Machine category as understood by the prediction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MachineType {
    #[default]
    #[serde(rename = "High Performance")]
    HighPerformance,
    #[serde(rename = "Low Power")]
    LowPower,
    #[serde(rename = "Medium Duty")]
    MediumDuty,
}

const MACHINE_TYPE_PARSE_VALUES: &[&str] = &[
    "High Performance",
    "Low Power",
    "Medium Duty",
    "H",
    "L",
    "M",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid machine type '{raw}'; expected one of: {expected:?}")]
pub struct MachineTypeParseError {
    raw: String,
    expected: &'static [&'static str],
}

impl MachineTypeParseError {
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl MachineType {
    /// Wire spelling, also used for display.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            MachineType::HighPerformance => "High Performance",
            MachineType::LowPower => "Low Power",
            MachineType::MediumDuty => "Medium Duty",
        }
    }

    /// Parse operator input. Case-insensitive; accepts the wire spelling,
    /// the spelling without the space, or the single-letter code.
    pub fn parse(s: &str) -> Result<Self, MachineTypeParseError> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "highperformance" | "h" => Ok(MachineType::HighPerformance),
            "lowpower" | "l" => Ok(MachineType::LowPower),
            "mediumduty" | "m" => Ok(MachineType::MediumDuty),
            _ => Err(MachineTypeParseError {
                raw: s.trim().to_string(),
                expected: MACHINE_TYPE_PARSE_VALUES,
            }),
        }
    }

    #[must_use]
    pub const fn all() -> &'static [MachineType] {
        &[
            MachineType::HighPerformance,
            MachineType::LowPower,
            MachineType::MediumDuty,
        ]
    }
}

impl fmt::Display for MachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MachineType {
    type Err = MachineTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// One set of sensor measurements for a machine.
///
/// Immutable once built; the prediction client only borrows it. Field names
/// are the prediction endpoint's request schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    machine_id: MachineId,
    /// Kelvin.
    air_temp: f64,
    /// Kelvin.
    process_temp: f64,
    /// Newton-metres.
    torque: f64,
    /// Minutes of tool use.
    tool_wear: f64,
    /// Revolutions per minute.
    rotational_speed: i64,
    machine_type: MachineType,
}

impl Reading {
    #[must_use]
    pub fn new(machine_id: MachineId, machine_type: MachineType) -> Self {
        Self {
            machine_id,
            air_temp: 300.0,
            process_temp: 310.0,
            torque: 40.0,
            tool_wear: 100.0,
            rotational_speed: 1500,
            machine_type,
        }
    }

    #[must_use]
    pub fn with_temperatures(mut self, air_temp: f64, process_temp: f64) -> Self {
        self.air_temp = air_temp;
        self.process_temp = process_temp;
        self
    }

    #[must_use]
    pub fn with_torque(mut self, torque: f64) -> Self {
        self.torque = torque;
        self
    }

    #[must_use]
    pub fn with_tool_wear(mut self, tool_wear: f64) -> Self {
        self.tool_wear = tool_wear;
        self
    }

    #[must_use]
    pub fn with_rotational_speed(mut self, rpm: i64) -> Self {
        self.rotational_speed = rpm;
        self
    }

    #[must_use]
    pub fn machine_id(&self) -> &MachineId {
        &self.machine_id
    }

    #[must_use]
    pub const fn air_temp(&self) -> f64 {
        self.air_temp
    }

    #[must_use]
    pub const fn process_temp(&self) -> f64 {
        self.process_temp
    }

    #[must_use]
    pub const fn torque(&self) -> f64 {
        self.torque
    }

    #[must_use]
    pub const fn tool_wear(&self) -> f64 {
        self.tool_wear
    }

    #[must_use]
    pub const fn rotational_speed(&self) -> i64 {
        self.rotational_speed
    }

    #[must_use]
    pub const fn machine_type(&self) -> MachineType {
        self.machine_type
    }
}
