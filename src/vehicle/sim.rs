// Built-in kinematic vehicle
//
// Stands in for the external simulator: wheel speeds ramp toward their
// setpoints at a bounded acceleration, and pose is integrated from the
// resulting differential-drive motion.

use std::time::Duration;

use tracing::info;

use super::drive::WheelSignals;
use super::{Vehicle, VehicleError};
use crate::config::{MAX_WHEEL_ACCEL, TRACK_WIDTH, WHEEL_RADIUS};
use crate::messages::{Kinematics, normalize_heading};

pub struct KinematicVehicle {
    target: WheelSignals,
    wheels: WheelSignals,
    position: (f64, f64),
    heading_deg: f64, // 0 = +x axis, counter-clockwise positive
    sensors_online: bool,
}

impl Default for KinematicVehicle {
    fn default() -> Self {
        Self::new()
    }
}

impl KinematicVehicle {
    pub fn new() -> Self {
        info!(
            "Kinematic vehicle: wheel radius {} m, track {} m",
            WHEEL_RADIUS, TRACK_WIDTH
        );
        Self {
            target: WheelSignals::zero(),
            wheels: WheelSignals::zero(),
            position: (0.0, 0.0),
            heading_deg: 0.0,
            sensors_online: true,
        }
    }

    // Sensor dropout, for exercising the disconnected status path
    #[cfg(test)]
    pub(crate) fn set_sensors_online(&mut self, online: bool) {
        if self.sensors_online != online {
            tracing::warn!("Sensors {}", if online { "restored" } else { "lost" });
        }
        self.sensors_online = online;
    }

    /// Actual (ramped) wheel speeds
    pub fn wheels(&self) -> WheelSignals {
        self.wheels
    }

    fn linear_speed(&self) -> f64 {
        (self.wheels.left + self.wheels.right) / 2.0 * WHEEL_RADIUS
    }

    fn yaw_rate(&self) -> f64 {
        (self.wheels.right - self.wheels.left) * WHEEL_RADIUS / TRACK_WIDTH
    }
}

/// Move `current` toward `target` by at most `max_step`
fn ramp(current: f64, target: f64, max_step: f64) -> f64 {
    let diff = target - current;
    if diff.abs() <= max_step {
        target
    } else {
        current + max_step.copysign(diff)
    }
}

impl Vehicle for KinematicVehicle {
    fn apply(&mut self, signals: WheelSignals) -> Result<(), VehicleError> {
        if !(signals.left.is_finite() && signals.right.is_finite()) {
            return Err(VehicleError::Rejected {
                signals,
                reason: "non-finite wheel speed".to_string(),
            });
        }
        self.target = signals;
        Ok(())
    }

    fn step(&mut self, dt: Duration) {
        let dt = dt.as_secs_f64();
        let max_step = MAX_WHEEL_ACCEL * dt;
        self.wheels.left = ramp(self.wheels.left, self.target.left, max_step);
        self.wheels.right = ramp(self.wheels.right, self.target.right, max_step);

        let heading_rad = self.heading_deg.to_radians();
        let v = self.linear_speed();
        self.position.0 += v * heading_rad.cos() * dt;
        self.position.1 += v * heading_rad.sin() * dt;
        self.heading_deg = normalize_heading(self.heading_deg + self.yaw_rate().to_degrees() * dt);
    }

    fn read(&mut self) -> Option<Kinematics> {
        if !self.sensors_online {
            return None;
        }
        Some(Kinematics {
            position: self.position,
            speed_kmh: self.linear_speed().abs() * 3.6,
            heading_deg: self.heading_deg,
        })
    }
}
