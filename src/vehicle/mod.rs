// Vehicle side of the controller
//
// Provides:
// - Action -> differential-drive wheel signal mapping
// - Vehicle trait over actuators and sensors
// - Built-in kinematic vehicle for running without an external simulator

pub mod drive;
mod sim;

use std::time::Duration;

use crate::messages::Kinematics;

pub use drive::{DriveState, WheelSignals};
pub use sim::KinematicVehicle;

/// Error types for actuator access
#[derive(Debug, thiserror::Error)]
pub enum VehicleError {
    #[error("Rejected wheel signals {signals:?}: {reason}")]
    Rejected { signals: WheelSignals, reason: String },
}

/// Actuators and sensors of the driven vehicle
pub trait Vehicle {
    /// Send wheel speed setpoints to the motors
    fn apply(&mut self, signals: WheelSignals) -> Result<(), VehicleError>;

    /// Advance the vehicle by one control period. External simulators step
    /// themselves, so the default does nothing.
    fn step(&mut self, _dt: Duration) {}

    /// Current sensor sample, or `None` while sensors are unavailable
    fn read(&mut self) -> Option<Kinematics>;
}
