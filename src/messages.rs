// Shared record types exchanged between overlay and controller

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MAGNITUDE;
use crate::exchange::ExchangeError;

/// Driving action requested by the control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Action {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
    Stop,
}

impl FromStr for Action {
    type Err = ExchangeError;

    /// Accepts the canonical names plus the spellings older tools write
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward" | "move_forward" => Ok(Action::Forward),
            "backward" | "move_backward" | "reverse" => Ok(Action::Backward),
            "turnleft" | "turn_left" | "left" => Ok(Action::TurnLeft),
            "turnright" | "turn_right" | "right" => Ok(Action::TurnRight),
            "stop" | "park" => Ok(Action::Stop),
            _ => Err(ExchangeError::UnknownAction(s.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// Command from overlay -> controller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleCommand {
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<f64>,
    /// Milliseconds from our writers; any non-negative number is accepted
    pub timestamp: f64,
}

impl VehicleCommand {
    /// Intensity to apply, falling back to the default when absent
    pub fn magnitude(&self) -> f64 {
        self.magnitude.unwrap_or(DEFAULT_MAGNITUDE)
    }
}

// Command as it sits in the mailbox, before the action is validated.
// Kept separate so an unknown action is told apart from a corrupt record.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRecord {
    pub action: String,
    #[serde(default)]
    pub magnitude: Option<f64>,
    pub timestamp: f64,
}

impl TryFrom<CommandRecord> for VehicleCommand {
    type Error = ExchangeError;

    fn try_from(record: CommandRecord) -> Result<Self, Self::Error> {
        if !(record.timestamp.is_finite() && record.timestamp >= 0.0) {
            return Err(ExchangeError::InvalidTimestamp(record.timestamp));
        }
        Ok(Self {
            action: record.action.parse()?,
            magnitude: record.magnitude,
            timestamp: record.timestamp,
        })
    }
}

/// Transmission state reported by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Gear {
    #[default]
    #[serde(alias = "P", alias = "park")]
    Park,
    #[serde(alias = "D", alias = "drive")]
    Drive,
    #[serde(alias = "R", alias = "reverse")]
    Reverse,
}

// Telemetry from controller -> overlay
// Default is the "never heard from the simulator" state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VehicleStatus {
    pub position: (f64, f64),
    pub speed: f64,
    pub heading: f64,
    pub gear: Gear,
    pub connected: bool,
    /// Write time; a record whose timestamp stops advancing means the
    /// controller went silent. Zero when the writer does not stamp records.
    #[serde(default)]
    pub timestamp: f64,
}

impl VehicleStatus {
    /// Same vehicle state, ignoring when it was written
    pub fn same_state(&self, other: &VehicleStatus) -> bool {
        VehicleStatus {
            timestamp: other.timestamp,
            ..self.clone()
        } == *other
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pos=({:.1}, {:.1}) speed={:.1} km/h heading={:.0}° gear={:?} {}",
            self.position.0,
            self.position.1,
            self.speed,
            self.heading,
            self.gear,
            if self.connected { "connected" } else { "disconnected" }
        )
    }
}

/// What the simulator's sensors report in one sample
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Kinematics {
    pub position: (f64, f64),
    pub speed_kmh: f64,
    pub heading_deg: f64,
}

/// Wrap a heading in degrees into [0, 360)
pub fn normalize_heading(degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return 0.0;
    }
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round tiny negatives up to exactly 360
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}
